//! Construction episode driven by catalog indices.

use exprgen_core::{
    Bindings, EvalError, Legality, Limits, Registry, Sequence, SequenceBuilder, Value, SEPARATOR,
};

use crate::catalog::ActionCatalog;
use crate::error::EpisodeError;
use crate::mask::ActionMask;
use crate::masker::Masker;

/// Outcome of one accepted action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The episode has ended: separator accepted or length cap reached.
    pub done: bool,
    /// Evaluation result, present once `done` is set.
    pub outcome: Option<Result<Value, EvalError>>,
    /// Formal legality record for the next action.
    pub legality: Legality,
}

/// Drives one sequence builder from a policy's chosen catalog indices.
///
/// The episode owns the builder state, generates masks and decodes
/// indices back to tokens. Turning outcomes into rewards is left to the
/// caller.
///
/// # Example
///
/// ```
/// use exprgen_core::{Bindings, Registry};
/// use exprgen_mask::{ActionCatalog, Episode};
///
/// let registry = Registry::arithmetic();
/// let catalog = ActionCatalog::from_registry(&registry, vec![2.0], vec!["x".into()], vec![]);
/// let mut episode = Episode::new(&registry, catalog);
/// let bindings: Bindings = [("x".to_string(), 3.0)].into();
///
/// let mut step = None;
/// while !episode.is_done() {
///     let mask = episode.next_mask(None).unwrap();
///     // A real policy samples here; take the last allowed action.
///     let index = *mask.allowed_indices().last().unwrap();
///     step = Some(episode.step(index, Some(&bindings)).unwrap());
/// }
///
/// let step = step.unwrap();
/// assert!(step.done);
/// assert!(step.outcome.is_some());
/// ```
#[derive(Debug)]
pub struct Episode<'r> {
    builder: SequenceBuilder<'r>,
    masker: Masker,
}

impl<'r> Episode<'r> {
    /// Create an episode with default limits.
    pub fn new(registry: &'r Registry, catalog: ActionCatalog) -> Self {
        Self::with_limits(registry, catalog, Limits::default())
    }

    /// Create an episode with custom limits.
    pub fn with_limits(registry: &'r Registry, catalog: ActionCatalog, limits: Limits) -> Self {
        Self {
            builder: SequenceBuilder::with_limits(registry, limits),
            masker: Masker::new(catalog),
        }
    }

    /// Check whether the episode has ended.
    ///
    /// Ends when a separator is accepted or the length cap is reached.
    pub fn is_done(&self) -> bool {
        self.builder.is_terminated() || self.builder.is_full()
    }

    /// Generate the mask for the next action.
    ///
    /// Apply this to the policy's logits before sampling.
    ///
    /// # Errors
    ///
    /// Value-mode legality fails on unbound features or NaN results.
    pub fn next_mask(&self, bindings: Option<&Bindings>) -> Result<ActionMask, EpisodeError> {
        Ok(self.masker.mask_for(&self.builder, bindings)?)
    }

    /// Apply the action at catalog `index`.
    ///
    /// `bindings` select value-mode legality for the acceptance check.
    /// Once the episode ends the sequence is evaluated against them (an
    /// empty map when `None`) and the result reported in
    /// [`Step::outcome`]. With bindings, the final step takes its outcome
    /// from the same replay that checked the token, so stateful operators
    /// run once per step.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The index doesn't map to a catalog action
    /// - The action names an operator missing from the registry
    /// - The builder refuses the token
    ///
    /// The sequence is unchanged on error.
    pub fn step(
        &mut self,
        index: usize,
        bindings: Option<&Bindings>,
    ) -> Result<Step, EpisodeError> {
        let token = self
            .masker
            .catalog()
            .token_at(index, self.builder.registry())?;
        let ending =
            token == SEPARATOR || self.builder.len() + 1 >= self.builder.limits().max_length;

        let replay = match bindings {
            Some(bindings) if ending => Some(self.builder.add_token_with_values(token, bindings)?),
            _ => {
                self.builder.add_token(token, bindings)?;
                None
            }
        };

        if !self.is_done() {
            return Ok(Step {
                done: false,
                outcome: None,
                legality: self.builder.next_legality(None)?,
            });
        }

        let outcome = match replay {
            Some(replay) => replay.into_single(),
            None => self.builder.evaluate(&Bindings::new()),
        };
        tracing::debug!(
            len = self.builder.len(),
            terminated = self.builder.is_terminated(),
            ?outcome,
            "episode finished"
        );
        Ok(Step {
            done: true,
            outcome: Some(outcome),
            legality: Legality::closed(),
        })
    }

    /// Start a new episode with the same catalog and registry.
    ///
    /// Stateful operator memory is left alone; see
    /// [`Registry::reset_state`].
    pub fn reset(&mut self) {
        self.builder.reset();
    }

    /// Get a reference to the internal builder.
    pub fn builder(&self) -> &SequenceBuilder<'r> {
        &self.builder
    }

    /// Get the action catalog.
    pub fn catalog(&self) -> &ActionCatalog {
        self.masker.catalog()
    }

    /// Finish the episode and return the built sequence.
    pub fn finish(self) -> Sequence {
        self.builder.finish()
    }
}
