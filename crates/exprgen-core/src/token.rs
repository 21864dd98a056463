//! Token vocabulary for expression sequences.
//!
//! This module defines the closed set of token kinds a policy can emit.
//! Every token renders to canonical text; feature tokens additionally
//! resolve against a binding map at evaluation time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::operator::Operator;

/// Numeric value flowing through evaluation.
pub type Value = f64;

/// Runtime values for feature tokens, keyed by feature key.
pub type Bindings = HashMap<String, Value>;

/// Structural markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    /// Starts every sequence: BEG
    #[serde(rename = "BEG")]
    Begin,
    /// Terminates a complete sequence: SEP
    #[serde(rename = "SEP")]
    Separator,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Begin => f.write_str("BEG"),
            Marker::Separator => f.write_str("SEP"),
        }
    }
}

/// Expression token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Operands ===
    /// Literal operand.
    Constant(Value),
    /// Time offset; only legal right before a time-series operator.
    DeltaTime(i64),
    /// Operand resolved against the bindings at evaluation time.
    Feature(String),

    // === Operators ===
    /// Reference to a registered operator.
    Operator(Arc<Operator>),

    // === Structural ===
    Marker(Marker),
}

/// The begin marker every sequence starts with.
pub const BEGIN: Token = Token::Marker(Marker::Begin);

/// The separator that terminates a sequence.
pub const SEPARATOR: Token = Token::Marker(Marker::Separator);

impl Token {
    pub fn feature(key: impl Into<String>) -> Self {
        Token::Feature(key.into())
    }

    pub fn operator(operator: &Arc<Operator>) -> Self {
        Token::Operator(Arc::clone(operator))
    }

    /// The operator, if this is an operator token.
    pub fn as_operator(&self) -> Option<&Arc<Operator>> {
        match self {
            Token::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Check if this is an operator token.
    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Operator(_))
    }

    /// Check if this is an operand (constant, delta time or feature).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Token::Constant(_) | Token::DeltaTime(_) | Token::Feature(_)
        )
    }

    /// Resolve an operand to its value.
    ///
    /// Returns `Ok(None)` for operators and markers, which have no value
    /// of their own.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnboundFeature`] if a feature key is missing
    /// from `bindings`.
    pub fn resolve(&self, bindings: &Bindings) -> Result<Option<Value>, EvalError> {
        match self {
            Token::Constant(value) => Ok(Some(*value)),
            Token::DeltaTime(lag) => Ok(Some(*lag as Value)),
            Token::Feature(key) => bindings
                .get(key)
                .copied()
                .map(Some)
                .ok_or_else(|| EvalError::UnboundFeature(key.clone())),
            Token::Operator(_) | Token::Marker(_) => Ok(None),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Debug formatting keeps the fractional part: 1.0, not 1
            Token::Constant(value) => write!(f, "{value:?}"),
            Token::DeltaTime(lag) => write!(f, "{lag}"),
            Token::Feature(key) => write!(f, "${}", key.to_lowercase()),
            Token::Operator(op) => f.write_str(op.name()),
            Token::Marker(marker) => fmt::Display::fmt(marker, f),
        }
    }
}
