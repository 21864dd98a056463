//! Fixed-order action catalog shared between a policy and the builder.

use std::fmt;

use exprgen_core::{Category, Marker, Registry, Token, Value, SEPARATOR};
use serde::{Deserialize, Serialize};

use crate::error::EpisodeError;

/// One entry of the action space.
///
/// Operators are referenced by name; [`ActionCatalog::token_at`] resolves
/// them against a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Constant(Value),
    Feature(String),
    DeltaTime(i64),
    CsOperator(String),
    TsOperator(String),
    Separator,
}

impl Action {
    /// Operator category and name, if this is an operator action.
    pub fn operator(&self) -> Option<(Category, &str)> {
        match self {
            Action::CsOperator(name) => Some((Category::CrossSection, name)),
            Action::TsOperator(name) => Some((Category::TimeSeries, name)),
            _ => None,
        }
    }

    /// Text label, identical to the rendered token text.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Constant(value) => write!(f, "{value:?}"),
            Action::Feature(key) => write!(f, "${}", key.to_lowercase()),
            Action::DeltaTime(lag) => write!(f, "{lag}"),
            Action::CsOperator(name) | Action::TsOperator(name) => f.write_str(name),
            Action::Separator => fmt::Display::fmt(&Marker::Separator, f),
        }
    }
}

/// Ordered list of every action a policy may pick.
///
/// Layout is fixed: constants, features, delta times, CS operators,
/// TS operators, then a single trailing separator. Policies address
/// actions by position, so the order never changes after construction.
///
/// # Example
///
/// ```
/// use exprgen_mask::ActionCatalog;
///
/// let catalog = ActionCatalog::builder().constants([1.0, 2.0]).build();
/// assert_eq!(catalog.labels(), vec!["1.0", "2.0", "SEP"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCatalog {
    actions: Vec<Action>,
}

impl ActionCatalog {
    /// Create a builder for a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Build a catalog from the five action classes.
    pub fn new(
        constants: Vec<Value>,
        features: Vec<String>,
        delta_times: Vec<i64>,
        cs_operators: Vec<String>,
        ts_operators: Vec<String>,
    ) -> Self {
        let actions = constants
            .into_iter()
            .map(Action::Constant)
            .chain(features.into_iter().map(Action::Feature))
            .chain(delta_times.into_iter().map(Action::DeltaTime))
            .chain(cs_operators.into_iter().map(Action::CsOperator))
            .chain(ts_operators.into_iter().map(Action::TsOperator))
            .chain(std::iter::once(Action::Separator))
            .collect();
        Self { actions }
    }

    /// Build a catalog whose operator actions are every operator in
    /// `registry`, in registration order.
    pub fn from_registry(
        registry: &Registry,
        constants: Vec<Value>,
        features: Vec<String>,
        delta_times: Vec<i64>,
    ) -> Self {
        let names = |category| -> Vec<String> {
            registry
                .names_in(category)
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        Self::new(
            constants,
            features,
            delta_times,
            names(Category::CrossSection),
            names(Category::TimeSeries),
        )
    }

    /// All actions in catalog order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Get the action at `index`.
    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    /// Text labels in catalog order.
    pub fn labels(&self) -> Vec<String> {
        self.actions.iter().map(Action::label).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always false: every catalog ends with a separator.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Turn the action at `index` into a token.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range, or if an operator
    /// action names no operator of that category in `registry`.
    pub fn token_at(&self, index: usize, registry: &Registry) -> Result<Token, EpisodeError> {
        let action = self.get(index).ok_or(EpisodeError::UnmappedAction {
            index,
            len: self.len(),
        })?;

        let token = match action {
            Action::Constant(value) => Token::Constant(*value),
            Action::Feature(key) => Token::feature(key.as_str()),
            Action::DeltaTime(lag) => Token::DeltaTime(*lag),
            Action::CsOperator(name) | Action::TsOperator(name) => {
                let op = registry.lookup(name)?;
                if Some(op.category()) != action.operator().map(|(category, _)| category) {
                    return Err(EpisodeError::CategoryMismatch {
                        name: name.clone(),
                        category: op.category(),
                    });
                }
                Token::Operator(op)
            }
            Action::Separator => SEPARATOR,
        };
        Ok(token)
    }

    /// Find the catalog index of `token`.
    ///
    /// Returns `None` for the begin marker and for tokens the catalog
    /// does not list.
    pub fn index_of(&self, token: &Token) -> Option<usize> {
        self.actions.iter().position(|action| match (action, token) {
            (Action::Constant(a), Token::Constant(b)) => a == b,
            (Action::Feature(a), Token::Feature(b)) => a == b,
            (Action::DeltaTime(a), Token::DeltaTime(b)) => a == b,
            (Action::CsOperator(_) | Action::TsOperator(_), Token::Operator(op)) => {
                action.operator() == Some((op.category(), op.name()))
            }
            (Action::Separator, Token::Marker(Marker::Separator)) => true,
            _ => false,
        })
    }
}

/// Builder for [`ActionCatalog`]. Classes left unset are empty.
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    constants: Vec<Value>,
    features: Vec<String>,
    delta_times: Vec<i64>,
    cs_operators: Vec<String>,
    ts_operators: Vec<String>,
}

impl CatalogBuilder {
    pub fn constants(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.constants = values.into_iter().collect();
        self
    }

    pub fn features<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.features = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn delta_times(mut self, lags: impl IntoIterator<Item = i64>) -> Self {
        self.delta_times = lags.into_iter().collect();
        self
    }

    pub fn cs_operators<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.cs_operators = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn ts_operators<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.ts_operators = names.into_iter().map(Into::into).collect();
        self
    }

    /// Build the catalog.
    pub fn build(self) -> ActionCatalog {
        ActionCatalog::new(
            self.constants,
            self.features,
            self.delta_times,
            self.cs_operators,
            self.ts_operators,
        )
    }
}
