//! Error types for expression construction, evaluation and registration.

use thiserror::Error;

use crate::legality::Legality;

/// Errors raised while populating or querying an operator registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An operator with this name is already registered.
    #[error("operator `{0}` is already registered")]
    DuplicateOperator(String),

    /// No operator with this name is registered.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    /// Operators must consume at least one operand.
    #[error("operator `{0}` must have an arity of at least 1")]
    ZeroArity(String),
}

/// Errors that can occur while appending tokens to a sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    /// Token not permitted by the current legality record.
    #[error("token `{token}` is not legal here")]
    IllegalToken {
        /// Rendered text of the rejected token.
        token: String,
        /// The record the token was checked against.
        legality: Legality,
    },

    /// The sequence already holds `max_length` tokens.
    #[error("sequence is full ({0} tokens)")]
    SequenceFull(usize),

    /// A separator has already been accepted.
    #[error("sequence is already terminated")]
    Terminated,

    /// Operator token refers to an operator outside the builder's registry.
    #[error("operator `{0}` is not registered with this builder")]
    UnknownOperator(String),

    /// Value-mode legality failed while replaying the sequence.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Errors that can occur while rendering or evaluating an expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// An operator found fewer operands on the stack than its arity.
    #[error("stack underflow at token {position}: needs {needed}, has {available}")]
    StackUnderflow {
        /// Index of the offending token in the sequence.
        position: usize,
        /// Operands the operator consumes.
        needed: usize,
        /// Operands available on the stack.
        available: usize,
    },

    /// A feature token has no value in the supplied bindings.
    #[error("feature `{0}` is not bound")]
    UnboundFeature(String),

    /// An operator transform produced NaN.
    #[error("operator `{operator}` produced NaN")]
    NotANumber {
        /// Name of the operator.
        operator: String,
    },

    /// An operator or marker was asked for an operand value.
    #[error("token `{0}` has no operand value")]
    NotAnOperand(String),

    /// The expression does not reduce to a single value.
    #[error("expression reduces to {depth} values, expected exactly 1")]
    Incomplete {
        /// Final stack depth.
        depth: usize,
    },
}

/// Errors that can occur when validating or building a Karva expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KarvaError {
    /// Expression length differs from head + tail.
    #[error("karva expression has {actual} genes, expected {expected}")]
    InvalidLength {
        /// `head_length + tail_length`.
        expected: usize,
        /// Actual number of genes.
        actual: usize,
    },

    /// An operator appears in the tail.
    #[error("operator at index {index} lies in the tail")]
    NonTerminalInTail {
        /// Index of the operator gene.
        index: usize,
    },

    /// Sequence markers have no meaning inside a Karva expression.
    #[error("sequence marker at index {index}")]
    MarkerInExpression {
        /// Index of the marker gene.
        index: usize,
    },

    /// Tree construction ran past the last gene.
    #[error("expression ended while building a subtree at index {position}")]
    Truncated {
        /// Cursor position that had no gene.
        position: usize,
    },

    /// The head must hold at least the root gene.
    #[error("head length must be at least 1")]
    ZeroHeadLength,

    /// The registry holds no operators to derive a tail length from.
    #[error("registry has no operators")]
    EmptyRegistry,

    /// Operator gene refers to an operator outside the registry.
    #[error("operator `{0}` is not registered")]
    UnknownOperator(String),

    /// Evaluating the built tree failed.
    #[error(transparent)]
    Eval(#[from] EvalError),
}
