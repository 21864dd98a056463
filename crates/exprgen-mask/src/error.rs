//! Error type for catalog decoding and episode steps.

use exprgen_core::{BuildError, Category, RegistryError};
use thiserror::Error;

/// Errors that can occur while driving an episode.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EpisodeError {
    /// The chosen index lies outside the action catalog.
    #[error("action index {index} is outside the catalog ({len} actions)")]
    UnmappedAction {
        /// Chosen index.
        index: usize,
        /// Catalog length.
        len: usize,
    },

    /// An operator action refers to an operator of another category.
    #[error("operator `{name}` is registered as {category}")]
    CategoryMismatch {
        /// Operator name.
        name: String,
        /// Category it is registered under.
        category: Category,
    },

    /// Operator lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The builder refused the token.
    #[error(transparent)]
    Build(#[from] BuildError),
}
