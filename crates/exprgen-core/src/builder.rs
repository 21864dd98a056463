//! Incremental builder for postfix expression sequences.
//!
//! The builder consumes tokens one-by-one, rejecting any token the
//! current legality record forbids. It provides `next_legality()` for
//! action masking by a search or learning policy.

use crate::error::{BuildError, EvalError};
use crate::eval::{self, RenderStyle, Replay};
use crate::legality::Legality;
use crate::limits::Limits;
use crate::operator::Registry;
use crate::token::{Bindings, Token, Value, BEGIN, SEPARATOR};

/// A postfix token sequence.
///
/// Sequences produced by [`SequenceBuilder`] are legal at every prefix.
/// [`Sequence::from_tokens`] accepts arbitrary token lists; rendering and
/// evaluation then report malformed input as errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    tokens: Vec<Token>,
}

impl Default for Sequence {
    fn default() -> Self {
        Self { tokens: vec![BEGIN] }
    }
}

impl Sequence {
    /// Wrap an externally constructed token list without checking it.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Legality of the next token.
    ///
    /// Without bindings only stack depths are simulated. With bindings
    /// every operator transform runs, which advances the memory of
    /// stateful operators.
    pub fn legality(&self, bindings: Option<&Bindings>) -> Result<Legality, EvalError> {
        let legality = match bindings {
            Some(bindings) => eval::replay::<Value>(&self.tokens, bindings)?.legality(),
            None => eval::replay::<()>(&self.tokens, &())?.legality(),
        };
        Ok(legality)
    }

    /// Replay with values: legality and intermediate values in one pass.
    pub fn replay(&self, bindings: &Bindings) -> Result<Replay<Value>, EvalError> {
        eval::replay(&self.tokens, bindings)
    }

    /// Check that the sequence reduces to exactly one value.
    pub fn is_well_formed(&self) -> bool {
        eval::is_well_formed(&self.tokens)
    }

    /// Evaluate against `bindings`. See [`eval::evaluate`].
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        eval::evaluate(&self.tokens, bindings)
    }

    /// Render as nested applications. See [`eval::render`].
    pub fn render(&self, style: RenderStyle) -> Result<String, EvalError> {
        eval::render(&self.tokens, style)
    }
}

/// Incremental, legality-checked sequence construction.
///
/// One builder per construction episode; it is not meant to be shared
/// between threads.
#[derive(Debug)]
pub struct SequenceBuilder<'r> {
    registry: &'r Registry,
    limits: Limits,
    sequence: Sequence,
    /// Rendered text of every non-marker token, kept in step with `sequence`.
    rendered: Vec<String>,
}

impl<'r> SequenceBuilder<'r> {
    /// Create a new builder with default limits.
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_limits(registry, Limits::default())
    }

    /// Create a new builder with custom limits.
    pub fn with_limits(registry: &'r Registry, limits: Limits) -> Self {
        Self {
            registry,
            limits,
            sequence: Sequence::default(),
            rendered: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn tokens(&self) -> &[Token] {
        self.sequence.tokens()
    }

    /// Rendered text of the operand and operator tokens, in order.
    pub fn rendered(&self) -> &[String] {
        &self.rendered
    }

    /// Number of tokens, including markers.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Check whether only the begin marker is present.
    pub fn is_empty(&self) -> bool {
        self.sequence.len() <= 1
    }

    /// Check whether a separator has been accepted.
    pub fn is_terminated(&self) -> bool {
        self.sequence.tokens().last() == Some(&SEPARATOR)
    }

    /// Check whether the length cap has been reached.
    pub fn is_full(&self) -> bool {
        self.sequence.len() >= self.limits.max_length
    }

    /// Check whether the sequence currently reduces to a single value.
    ///
    /// This is the condition under which a separator is legal; it also
    /// holds after the separator has been accepted.
    pub fn is_complete(&self) -> bool {
        self.sequence.is_well_formed()
    }

    /// Returns the legality record for the next token.
    ///
    /// This is the interface for masking a policy's choices. Pass
    /// bindings for value-mode legality (see [`Sequence::legality`]).
    /// A full or terminated sequence permits nothing.
    ///
    /// # Errors
    ///
    /// Value-mode replay fails on unbound features or NaN results.
    pub fn next_legality(&self, bindings: Option<&Bindings>) -> Result<Legality, BuildError> {
        if self.is_full() {
            return Ok(Legality::closed());
        }
        let legality = self.sequence.legality(bindings)?;
        tracing::trace!(len = self.len(), ?legality, "computed legality");
        Ok(legality)
    }

    /// Feed a single token to the builder.
    ///
    /// With bindings the prefix is replayed in value mode to compute
    /// legality. On error the sequence is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The sequence already holds `max_length` tokens
    /// - A separator has already been accepted
    /// - An operator token is not from this builder's registry
    /// - The token is not permitted by the current legality record
    /// - Value-mode replay fails
    pub fn add_token(
        &mut self,
        candidate: Token,
        bindings: Option<&Bindings>,
    ) -> Result<(), BuildError> {
        self.check_appendable(&candidate)?;
        let legality = self.sequence.legality(bindings)?;
        self.check_permitted(&candidate, legality)?;
        self.push(candidate);
        Ok(())
    }

    /// Feed a token and return the value replay of the extended sequence.
    ///
    /// The legality check and the evaluation share one value-mode pass,
    /// so stateful operators run once per call. After a separator,
    /// [`Replay::into_single`] gives the evaluation result.
    ///
    /// # Errors
    ///
    /// Same as [`add_token`](Self::add_token), plus any failure while
    /// applying the candidate itself (e.g. an unbound feature). The
    /// sequence is unchanged on error.
    pub fn add_token_with_values(
        &mut self,
        candidate: Token,
        bindings: &Bindings,
    ) -> Result<Replay<Value>, BuildError> {
        self.check_appendable(&candidate)?;
        let mut replay = self.sequence.replay(bindings)?;
        self.check_permitted(&candidate, replay.legality())?;
        replay.feed(self.sequence.len(), &candidate, bindings)?;
        self.push(candidate);
        Ok(replay)
    }

    fn check_appendable(&self, candidate: &Token) -> Result<(), BuildError> {
        if self.is_full() {
            return Err(BuildError::SequenceFull(self.limits.max_length));
        }
        if self.is_terminated() {
            return Err(BuildError::Terminated);
        }
        if let Some(op) = candidate.as_operator() {
            if !self.registry.contains(op) {
                return Err(BuildError::UnknownOperator(op.name().to_string()));
            }
        }
        Ok(())
    }

    fn check_permitted(&self, candidate: &Token, legality: Legality) -> Result<(), BuildError> {
        if legality.permits(candidate) {
            return Ok(());
        }
        tracing::debug!(token = %candidate, ?legality, "rejected token");
        Err(BuildError::IllegalToken {
            token: candidate.to_string(),
            legality,
        })
    }

    fn push(&mut self, candidate: Token) {
        tracing::debug!(token = %candidate, len = self.len() + 1, "accepted token");
        if !matches!(candidate, Token::Marker(_)) {
            self.rendered.push(candidate.to_string());
        }
        self.sequence.tokens.push(candidate);
    }

    /// Start over from the begin marker, keeping registry and limits.
    pub fn reset(&mut self) {
        self.sequence = Sequence::default();
        self.rendered.clear();
    }

    /// Evaluate the sequence. See [`eval::evaluate`].
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        self.sequence.evaluate(bindings)
    }

    /// Render the sequence. See [`eval::render`].
    pub fn render(&self, style: RenderStyle) -> Result<String, EvalError> {
        self.sequence.render(style)
    }

    /// Finalize and return the sequence.
    pub fn finish(self) -> Sequence {
        self.sequence
    }
}
