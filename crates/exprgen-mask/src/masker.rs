//! Mask generation from legality records.

use std::collections::HashMap;

use exprgen_core::{Bindings, BuildError, Legality, Registry, SequenceBuilder};

use crate::catalog::{Action, ActionCatalog};
use crate::mask::ActionMask;

/// Arity source for operator actions.
///
/// The arity reported here is the one compared against a legality
/// bound, i.e. the operand arity for TS operators.
pub trait ArityLookup {
    /// Arity of operator `name`, or `None` if unknown.
    fn arity_of(&self, name: &str) -> Option<usize>;
}

impl ArityLookup for HashMap<String, usize> {
    fn arity_of(&self, name: &str) -> Option<usize> {
        self.get(name).copied()
    }
}

impl ArityLookup for Registry {
    fn arity_of(&self, name: &str) -> Option<usize> {
        self.get(name).map(|op| op.operand_arity())
    }
}

/// Generates action masks for a fixed catalog.
#[derive(Debug, Clone)]
pub struct Masker {
    catalog: ActionCatalog,
}

impl Masker {
    pub fn new(catalog: ActionCatalog) -> Self {
        Self { catalog }
    }

    /// Get the action catalog.
    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Build the mask for `legality`.
    ///
    /// A literal action is allowed iff its class flag is set. An operator
    /// action is allowed iff its class has a bound and its arity does not
    /// exceed it; operators `arities` does not know are never allowed.
    pub fn mask(&self, legality: &Legality, arities: &impl ArityLookup) -> ActionMask {
        self.catalog
            .actions()
            .iter()
            .map(|action| match action {
                Action::Constant(_) => legality.constant,
                Action::Feature(_) => legality.feature,
                Action::DeltaTime(_) => legality.delta_time,
                Action::Separator => legality.separator,
                Action::CsOperator(name) | Action::TsOperator(name) => action
                    .operator()
                    .and_then(|(category, _)| legality.operator_bound(category))
                    .zip(arities.arity_of(name))
                    .is_some_and(|(bound, arity)| arity <= bound),
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// Build the mask for the builder's next token.
    ///
    /// # Errors
    ///
    /// Value-mode legality fails on unbound features or NaN results.
    pub fn mask_for(
        &self,
        builder: &SequenceBuilder<'_>,
        bindings: Option<&Bindings>,
    ) -> Result<ActionMask, BuildError> {
        let legality = builder.next_legality(bindings)?;
        Ok(self.mask(&legality, builder.registry()))
    }
}
