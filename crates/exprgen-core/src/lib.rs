//! exprgen: incremental symbolic expression construction.
//!
//! Builds small symbolic expressions one token at a time, the way a
//! search or reinforcement-learning policy emits them, and answers at
//! every partial state exactly which next tokens are legal.
//!
//! # Overview
//!
//! Two representations are supported:
//!
//! - **Postfix (RPN) sequences** built incrementally by
//!   [`SequenceBuilder`], with a [`Legality`] record per prefix
//! - **Karva expressions**: fixed head/tail gene lists validated once and
//!   turned into an [`ExprTree`]
//!
//! Both render to text and evaluate against a feature [`Bindings`] map.
//! Operators come from an explicit [`Registry`] passed to every builder.
//!
//! # Example
//!
//! ```
//! use exprgen_core::{Bindings, Registry, RenderStyle, SequenceBuilder, Token, SEPARATOR};
//!
//! let registry = Registry::arithmetic();
//! let plus = registry.lookup("+").unwrap();
//!
//! // Build: 3 $close +
//! let mut builder = SequenceBuilder::new(&registry);
//! builder.add_token(Token::Constant(3.0), None).unwrap();
//! builder.add_token(Token::feature("close"), None).unwrap();
//! builder.add_token(Token::operator(&plus), None).unwrap();
//! builder.add_token(SEPARATOR, None).unwrap();
//!
//! assert_eq!(builder.render(RenderStyle::Functional).unwrap(), "+(3.0, $close)");
//!
//! let bindings: Bindings = [("close".to_string(), 4.0)].into();
//! assert_eq!(builder.evaluate(&bindings).unwrap(), 7.0);
//! ```
//!
//! # Policy Integration
//!
//! [`SequenceBuilder::next_legality`] reports which token classes, and
//! which operator arities, may come next. A policy masks its action
//! space with it so every finished sequence is well-formed:
//!
//! ```
//! use exprgen_core::{Registry, SequenceBuilder, Token};
//!
//! let registry = Registry::arithmetic();
//! let mut builder = SequenceBuilder::new(&registry);
//! builder.add_token(Token::Constant(1.0), None).unwrap();
//! builder.add_token(Token::Constant(2.0), None).unwrap();
//!
//! // Two values stacked: binary operators are fine, stopping is not
//! let legality = builder.next_legality(None).unwrap();
//! assert_eq!(legality.cs_operator, Some(2));
//! assert!(!legality.separator);
//! ```

pub mod builder;
pub mod error;
pub mod eval;
pub mod karva;
pub mod legality;
pub mod limits;
pub mod operator;
pub mod token;

pub use builder::{Sequence, SequenceBuilder};
pub use error::{BuildError, EvalError, KarvaError, RegistryError};
pub use eval::{evaluate, render, RenderStyle};
pub use karva::{ExprTree, KarvaExpression};
pub use legality::{LastToken, Legality};
pub use limits::Limits;
pub use operator::{Category, Kernel, LagBuffer, Memory, Operator, Registry};
pub use token::{Bindings, Marker, Token, Value, BEGIN, SEPARATOR};
