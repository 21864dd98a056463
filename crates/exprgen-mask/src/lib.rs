//! Action catalogs and legality masks for exprgen builders.
//!
//! A search or reinforcement-learning policy picks actions by index from
//! a fixed [`ActionCatalog`]. This crate turns the builder's
//! [`Legality`](exprgen_core::Legality) record into an [`ActionMask`] over
//! that catalog, and drives a whole construction [`Episode`] from chosen
//! indices.
//!
//! # Example
//!
//! ```
//! use exprgen_core::{Legality, Registry};
//! use exprgen_mask::{ActionCatalog, Masker};
//!
//! let registry = Registry::arithmetic();
//! let catalog = ActionCatalog::from_registry(&registry, vec![1.0], vec![], vec![]);
//! let masker = Masker::new(catalog);
//!
//! // Two values stacked: constants and the binary operators are legal
//! let mask = masker.mask(&Legality::after_operand(2), &registry);
//! assert_eq!(mask.len(), masker.catalog().len());
//! assert!(mask.is_allowed(1)); // +
//! assert!(!mask.is_allowed(mask.len() - 1)); // SEP
//! ```

pub mod catalog;
pub mod episode;
pub mod error;
pub mod mask;
pub mod masker;

pub use catalog::{Action, ActionCatalog, CatalogBuilder};
pub use episode::{Episode, Step};
pub use error::EpisodeError;
pub use mask::ActionMask;
pub use masker::{ArityLookup, Masker};

pub use exprgen_core;
