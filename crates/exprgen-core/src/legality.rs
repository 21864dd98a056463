//! Legality records: which token kinds may follow a partial sequence.

use serde::{Deserialize, Serialize};

use crate::operator::Category;
use crate::token::{Marker, Token};

/// Kind of the last operand-stack event in a replayed prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastToken {
    /// Nothing but the begin marker so far.
    #[default]
    Begin,
    /// A constant, a feature, or an operator result.
    Operand,
    /// A delta-time literal awaiting its time-series operator.
    DeltaTime,
}

/// Answer to "which tokens may legally come next".
///
/// Operator bounds are upper limits on [`Operator::operand_arity`];
/// `None` forbids the whole class regardless of arity.
///
/// [`Operator::operand_arity`]: crate::operator::Operator::operand_arity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Legality {
    #[serde(rename = "Constant")]
    pub constant: bool,
    #[serde(rename = "DeltaTime")]
    pub delta_time: bool,
    #[serde(rename = "Feature")]
    pub feature: bool,
    #[serde(rename = "CSOperator")]
    pub cs_operator: Option<usize>,
    #[serde(rename = "TSOperator")]
    pub ts_operator: Option<usize>,
    #[serde(rename = "SEP")]
    pub separator: bool,
}

impl Legality {
    /// Only the begin marker: start with a constant or a feature.
    pub const fn initial() -> Self {
        Self {
            constant: true,
            delta_time: false,
            feature: true,
            cs_operator: None,
            ts_operator: None,
            separator: false,
        }
    }

    /// Exactly one value on the stack: anything operand-like, unary
    /// cross-sectional operators, or stop.
    pub const fn single_value() -> Self {
        Self {
            constant: true,
            delta_time: true,
            feature: true,
            cs_operator: Some(1),
            ts_operator: None,
            separator: true,
        }
    }

    /// After an operand or operator result with `depth` values stacked.
    pub const fn after_operand(depth: usize) -> Self {
        Self {
            constant: true,
            delta_time: true,
            feature: true,
            cs_operator: Some(depth),
            ts_operator: None,
            separator: false,
        }
    }

    /// After a delta time: only a time-series operator.
    ///
    /// The delta time itself is one of the `depth` stacked values and is
    /// consumed as the lag, so `depth - 1` operands remain.
    pub const fn after_delta_time(depth: usize) -> Self {
        Self {
            constant: false,
            delta_time: false,
            feature: false,
            cs_operator: None,
            ts_operator: Some(depth.saturating_sub(1)),
            separator: false,
        }
    }

    /// Nothing is legal (terminated or full sequence).
    pub const fn closed() -> Self {
        Self {
            constant: false,
            delta_time: false,
            feature: false,
            cs_operator: None,
            ts_operator: None,
            separator: false,
        }
    }

    /// Record for a replayed prefix with `depth` stacked values.
    ///
    /// A single stacked value always permits stopping, whatever came last.
    pub fn from_state(depth: usize, last: LastToken) -> Self {
        if depth == 1 {
            return Self::single_value();
        }
        match last {
            LastToken::Begin => Self::initial(),
            LastToken::Operand => Self::after_operand(depth),
            LastToken::DeltaTime => Self::after_delta_time(depth),
        }
    }

    /// Arity bound for an operator category.
    pub fn operator_bound(&self, category: Category) -> Option<usize> {
        match category {
            Category::CrossSection => self.cs_operator,
            Category::TimeSeries => self.ts_operator,
        }
    }

    /// Check an operator with `operand_arity` of `category` against its bound.
    pub fn allows_operator(&self, category: Category, operand_arity: usize) -> bool {
        self.operator_bound(category)
            .is_some_and(|max| operand_arity <= max)
    }

    /// Check whether `token` is permitted by this record.
    pub fn permits(&self, token: &Token) -> bool {
        match token {
            Token::Constant(_) => self.constant,
            Token::DeltaTime(_) => self.delta_time,
            Token::Feature(_) => self.feature,
            Token::Operator(op) => self.allows_operator(op.category(), op.operand_arity()),
            Token::Marker(Marker::Separator) => self.separator,
            Token::Marker(Marker::Begin) => false,
        }
    }

    /// Check whether any token at all is permitted.
    pub fn any(&self) -> bool {
        self.constant
            || self.delta_time
            || self.feature
            || self.cs_operator.is_some()
            || self.ts_operator.is_some()
            || self.separator
    }
}
