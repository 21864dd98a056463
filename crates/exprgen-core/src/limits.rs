//! Construction limits.

use serde::{Deserialize, Serialize};

/// Limits for sequence construction.
///
/// `max_length` counts every token, including the begin marker and the
/// separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of tokens in a sequence.
    pub max_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_length: 20 }
    }
}

impl Limits {
    /// Create limits with custom values.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Permissive limits for testing.
    pub fn permissive() -> Self {
        Self { max_length: 256 }
    }

    /// Short expressions only.
    pub fn strict() -> Self {
        Self { max_length: 8 }
    }
}
