//! Stack-machine replay of postfix token sequences.
//!
//! Legality checking, evaluation and rendering all walk a sequence the
//! same way: operands push, operators pop `arity` values and push one.
//! They differ only in what sits on the stack, so [`replay`] is written
//! once over a [`Payload`]:
//!
//! - `()` tracks depths only (formal legality),
//! - [`Value`] applies the operator transforms (value legality and
//!   evaluation),
//! - [`Text`] builds the rendered expression.

use crate::error::EvalError;
use crate::legality::{LastToken, Legality};
use crate::operator::Operator;
use crate::token::{Bindings, Marker, Token, Value};

/// Binary operators rendered infix under [`RenderStyle::Infix`].
pub const INFIX_OPERATORS: [&str; 4] = ["+", "-", "*", "/"];

/// How operator applications are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    /// `name(a, b)` for every operator.
    #[default]
    Functional,
    /// `(a + b)` for [`INFIX_OPERATORS`], `name(a, b)` otherwise.
    Infix,
}

impl RenderStyle {
    /// Render one operator application from already rendered arguments.
    pub fn apply(self, name: &str, args: &[String]) -> String {
        match (self, args) {
            (RenderStyle::Infix, [a, b]) if INFIX_OPERATORS.contains(&name) => {
                format!("({a} {name} {b})")
            }
            _ => format!("{name}({})", args.join(", ")),
        }
    }
}

/// What a replay keeps on its stack.
pub trait Payload: Sized {
    /// Evaluation context shared by every step.
    type Context: ?Sized;

    /// Payload for an operand token (constant, delta time or feature).
    fn operand(token: &Token, ctx: &Self::Context) -> Result<Self, EvalError>;

    /// Payload for an operator applied to `args`, in call order.
    fn apply(op: &Operator, args: Vec<Self>, ctx: &Self::Context) -> Result<Self, EvalError>;
}

impl Payload for () {
    type Context = ();

    fn operand(_token: &Token, _ctx: &()) -> Result<Self, EvalError> {
        Ok(())
    }

    fn apply(_op: &Operator, _args: Vec<Self>, _ctx: &()) -> Result<Self, EvalError> {
        Ok(())
    }
}

impl Payload for Value {
    type Context = Bindings;

    fn operand(token: &Token, bindings: &Bindings) -> Result<Self, EvalError> {
        token
            .resolve(bindings)?
            .ok_or_else(|| EvalError::NotAnOperand(token.to_string()))
    }

    fn apply(op: &Operator, args: Vec<Self>, _bindings: &Bindings) -> Result<Self, EvalError> {
        let value = op.apply(&args);
        if value.is_nan() {
            return Err(EvalError::NotANumber {
                operator: op.name().to_string(),
            });
        }
        Ok(value)
    }
}

/// Rendered expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Payload for Text {
    type Context = RenderStyle;

    fn operand(token: &Token, _style: &RenderStyle) -> Result<Self, EvalError> {
        Ok(Text(token.to_string()))
    }

    fn apply(op: &Operator, args: Vec<Self>, style: &RenderStyle) -> Result<Self, EvalError> {
        let args: Vec<String> = args.into_iter().map(|Text(s)| s).collect();
        Ok(Text(style.apply(op.name(), &args)))
    }
}

/// Result of replaying a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay<P> {
    /// Operand stack after the last token.
    pub stack: Vec<P>,
    /// Kind of the last stack event.
    pub last: LastToken,
    /// Whether a separator was reached.
    pub terminated: bool,
}

impl<P> Replay<P> {
    /// State before the first token.
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            last: LastToken::Begin,
            terminated: false,
        }
    }

    /// Number of stacked values.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Legality record for the next token.
    pub fn legality(&self) -> Legality {
        if self.terminated {
            Legality::closed()
        } else {
            Legality::from_state(self.depth(), self.last)
        }
    }

    /// Take the single remaining value.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Incomplete`] unless exactly one value is stacked.
    pub fn into_single(mut self) -> Result<P, EvalError> {
        let depth = self.stack.len();
        match (self.stack.pop(), depth) {
            (Some(value), 1) => Ok(value),
            _ => Err(EvalError::Incomplete { depth }),
        }
    }
}

impl<P: Payload> Replay<P> {
    /// Advance by one token found at `position`. Ignored once terminated.
    ///
    /// A failed step may have consumed operands; discard the replay.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::StackUnderflow`] if an operator finds too few
    /// operands, plus any error the payload raises.
    pub fn feed(
        &mut self,
        position: usize,
        token: &Token,
        ctx: &P::Context,
    ) -> Result<(), EvalError> {
        if self.terminated {
            return Ok(());
        }
        match token {
            Token::Marker(Marker::Begin) => {}
            Token::Marker(Marker::Separator) => self.terminated = true,
            Token::Constant(_) | Token::Feature(_) => {
                self.stack.push(P::operand(token, ctx)?);
                self.last = LastToken::Operand;
            }
            Token::DeltaTime(_) => {
                self.stack.push(P::operand(token, ctx)?);
                self.last = LastToken::DeltaTime;
            }
            Token::Operator(op) => {
                let arity = op.arity();
                let available = self.stack.len();
                if available < arity {
                    return Err(EvalError::StackUnderflow {
                        position,
                        needed: arity,
                        available,
                    });
                }
                let args = self.stack.split_off(available - arity);
                self.stack.push(P::apply(op, args, ctx)?);
                self.last = LastToken::Operand;
            }
        }
        Ok(())
    }
}

impl<P> Default for Replay<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Replay `tokens` from the start, stopping at the first separator.
///
/// # Errors
///
/// Returns [`EvalError::StackUnderflow`] if an operator finds too few
/// operands, plus any error the payload raises.
pub fn replay<P: Payload>(tokens: &[Token], ctx: &P::Context) -> Result<Replay<P>, EvalError> {
    let mut state = Replay {
        stack: Vec::with_capacity(tokens.len()),
        ..Replay::new()
    };
    for (position, token) in tokens.iter().enumerate() {
        state.feed(position, token, ctx)?;
        if state.terminated {
            break;
        }
    }
    Ok(state)
}

/// Evaluate a postfix sequence against `bindings`.
///
/// Stateful operators advance their memory on every call, so evaluating
/// the same sequence twice with the same operator instances may give
/// different results.
///
/// # Errors
///
/// Returns an error if:
/// - An operator finds too few operands
/// - A feature is missing from `bindings`
/// - An operator produces NaN
/// - The sequence does not reduce to exactly one value
pub fn evaluate(tokens: &[Token], bindings: &Bindings) -> Result<Value, EvalError> {
    replay::<Value>(tokens, bindings)?.into_single()
}

/// Render a postfix sequence as nested applications.
///
/// # Errors
///
/// Returns an error if an operator finds too few operands or the
/// sequence does not reduce to exactly one value.
pub fn render(tokens: &[Token], style: RenderStyle) -> Result<String, EvalError> {
    replay::<Text>(tokens, &style)?
        .into_single()
        .map(|Text(s)| s)
}

/// Check structural well-formedness: no underflow, final depth 1.
pub fn is_well_formed(tokens: &[Token]) -> bool {
    replay::<()>(tokens, &()).is_ok_and(|r| r.depth() == 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::operator::{Category, Kernel, LagBuffer, Registry};
    use crate::token::{BEGIN, SEPARATOR};

    fn arithmetic() -> Registry {
        Registry::arithmetic()
    }

    fn op(registry: &Registry, name: &str) -> Token {
        Token::operator(&registry.lookup(name).unwrap())
    }

    fn bindings(pairs: &[(&str, Value)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_simple_add() {
        let r = arithmetic();
        let tokens = vec![BEGIN, Token::Constant(3.0), Token::feature("x"), op(&r, "+")];

        assert_eq!(evaluate(&tokens, &bindings(&[("x", 4.0)])), Ok(7.0));
        assert_eq!(render(&tokens, RenderStyle::Functional).unwrap(), "+(3.0, $x)");
        assert_eq!(render(&tokens, RenderStyle::Infix).unwrap(), "(3.0 + $x)");
    }

    #[test]
    fn test_argument_order_preserved() {
        let r = arithmetic();
        // 10 2 - => 10 - 2
        let tokens = vec![BEGIN, Token::Constant(10.0), Token::Constant(2.0), op(&r, "-")];
        assert_eq!(evaluate(&tokens, &Bindings::new()), Ok(8.0));
        assert_eq!(render(&tokens, RenderStyle::Functional).unwrap(), "-(10.0, 2.0)");
    }

    #[test]
    fn test_nested() {
        let r = arithmetic();
        // x neg 2 + => neg(x) + 2
        let tokens = vec![
            BEGIN,
            Token::feature("x"),
            op(&r, "neg"),
            Token::Constant(2.0),
            op(&r, "+"),
        ];
        assert_eq!(evaluate(&tokens, &bindings(&[("x", 3.0)])), Ok(-1.0));
        assert_eq!(
            render(&tokens, RenderStyle::Functional).unwrap(),
            "+(neg($x), 2.0)"
        );
        assert_eq!(render(&tokens, RenderStyle::Infix).unwrap(), "(neg($x) + 2.0)");
    }

    #[test]
    fn test_ternary_rendering() {
        let mut r = Registry::new();
        let pick = r
            .register_fn("?", Category::CrossSection, 3, |a| if a[0] > a[1] { a[0] } else { a[2] })
            .unwrap();
        let tokens = vec![
            BEGIN,
            Token::feature("x"),
            Token::feature("y"),
            Token::feature("z"),
            Token::operator(&pick),
        ];
        assert_eq!(render(&tokens, RenderStyle::Infix).unwrap(), "?($x, $y, $z)");
        assert_eq!(
            evaluate(&tokens, &bindings(&[("x", 5.0), ("y", 3.0), ("z", 10.0)])),
            Ok(5.0)
        );
    }

    #[test]
    fn test_stack_underflow() {
        let r = arithmetic();
        let tokens = vec![BEGIN, Token::Constant(1.0), op(&r, "+")];
        let expected = EvalError::StackUnderflow {
            position: 2,
            needed: 2,
            available: 1,
        };
        assert_eq!(evaluate(&tokens, &Bindings::new()), Err(expected.clone()));
        assert_eq!(render(&tokens, RenderStyle::Functional), Err(expected));
        assert!(!is_well_formed(&tokens));
    }

    #[test]
    fn test_incomplete() {
        let tokens = vec![BEGIN, Token::Constant(1.0), Token::Constant(2.0)];
        assert_eq!(
            evaluate(&tokens, &Bindings::new()),
            Err(EvalError::Incomplete { depth: 2 })
        );
        assert_eq!(
            render(&[BEGIN], RenderStyle::Functional),
            Err(EvalError::Incomplete { depth: 0 })
        );
    }

    #[test]
    fn test_unbound_feature() {
        let tokens = vec![BEGIN, Token::feature("close")];
        assert_eq!(
            evaluate(&tokens, &Bindings::new()),
            Err(EvalError::UnboundFeature("close".into()))
        );
        // Rendering needs no bindings
        assert_eq!(render(&tokens, RenderStyle::Functional).unwrap(), "$close");
    }

    #[test]
    fn test_nan_surfaces_as_error() {
        let r = arithmetic();
        let tokens = vec![BEGIN, Token::Constant(0.0), Token::Constant(0.0), op(&r, "/")];
        assert_eq!(
            evaluate(&tokens, &Bindings::new()),
            Err(EvalError::NotANumber {
                operator: "/".into()
            })
        );
    }

    #[test]
    fn test_infinity_is_a_value() {
        let r = arithmetic();
        let tokens = vec![BEGIN, Token::Constant(1.0), Token::Constant(0.0), op(&r, "/")];
        assert_eq!(evaluate(&tokens, &Bindings::new()), Ok(Value::INFINITY));
    }

    #[test]
    fn test_replay_stops_at_separator() {
        let tokens = vec![BEGIN, Token::Constant(1.0), SEPARATOR, Token::Constant(2.0)];
        let state = replay::<()>(&tokens, &()).unwrap();
        assert!(state.terminated);
        assert_eq!(state.depth(), 1);
        assert_eq!(state.legality(), Legality::closed());
        assert_eq!(evaluate(&tokens, &Bindings::new()), Ok(1.0));
    }

    #[test]
    fn test_replay_tracks_last_token() {
        let mut r = arithmetic();
        let lag = r
            .register("ref", Category::TimeSeries, 2, Kernel::stateful(LagBuffer::new(1, 0.0)))
            .unwrap();
        let mut tokens = vec![BEGIN, Token::Constant(1.0), Token::DeltaTime(1)];

        let state = replay::<()>(&tokens, &()).unwrap();
        assert_eq!(state.last, LastToken::DeltaTime);
        assert_eq!(state.legality(), Legality::after_delta_time(2));

        tokens.push(Token::Operator(Arc::clone(&lag)));
        let state = replay::<()>(&tokens, &()).unwrap();
        assert_eq!(state.last, LastToken::Operand);
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn test_feed_matches_replay() {
        let r = arithmetic();
        let tokens = vec![
            BEGIN,
            Token::feature("x"),
            Token::Constant(2.0),
            op(&r, "*"),
            SEPARATOR,
        ];
        let ctx = bindings(&[("x", 1.5)]);

        let mut state = Replay::<Value>::new();
        for (position, token) in tokens.iter().enumerate() {
            state.feed(position, token, &ctx).unwrap();
        }
        assert_eq!(state, replay::<Value>(&tokens, &ctx).unwrap());
        assert_eq!(state.into_single(), Ok(3.0));
    }

    #[test]
    fn test_non_operand_has_no_value() {
        let r = arithmetic();
        let ctx = Bindings::new();
        assert_eq!(
            <Value as Payload>::operand(&SEPARATOR, &ctx),
            Err(EvalError::NotAnOperand("SEP".into()))
        );
        assert_eq!(
            <Value as Payload>::operand(&op(&r, "+"), &ctx),
            Err(EvalError::NotAnOperand("+".into()))
        );
    }

    #[test]
    fn test_formal_and_value_agree_on_depth() {
        let r = arithmetic();
        let tokens = vec![
            BEGIN,
            Token::Constant(1.0),
            Token::feature("x"),
            Token::Constant(2.0),
            op(&r, "*"),
        ];
        let formal = replay::<()>(&tokens, &()).unwrap();
        let valued = replay::<Value>(&tokens, &bindings(&[("x", 3.0)])).unwrap();
        assert_eq!(formal.depth(), valued.depth());
        assert_eq!(formal.legality(), valued.legality());
        assert_eq!(valued.stack, vec![1.0, 6.0]);
    }
}
