//! Ordered fallback chains.

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use trellis_context::ExecutionContext;
use trellis_core::{Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

/// A primary primitive plus an ordered list of alternatives.
///
/// The primary runs first; on failure each alternative is tried in order
/// with the same input. Success at any stage short-circuits the remainder.
/// If everything fails the *last* failure is surfaced, annotated with how
/// many alternatives were attempted. Cancellation stops the chain - it is
/// not a failure to fall back from.
pub struct Fallback<I, O> {
  name: String,
  primary: SharedPrimitive<I, O>,
  alternatives: Vec<SharedPrimitive<I, O>>,
}

impl<I, O> Fallback<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  pub fn new(primary: SharedPrimitive<I, O>, alternatives: Vec<SharedPrimitive<I, O>>) -> Self {
    Self {
      name: format!("fallback({})", primary.name()),
      primary,
      alternatives,
    }
  }

  /// Append another alternative to the end of the chain.
  pub fn or_else(mut self, alternative: SharedPrimitive<I, O>) -> Self {
    self.alternatives.push(alternative);
    self
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Fallback<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "fallback_execute",
    skip(self, input, ctx),
    fields(
      primitive = %self.name,
      alternatives = self.alternatives.len(),
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    let mut last_failure: Option<PrimitiveError> = None;

    let chain = std::iter::once(&self.primary).chain(self.alternatives.iter());
    for (stage, candidate) in chain.enumerate() {
      if ctx.is_cancelled() {
        return Err(PrimitiveError::Cancelled);
      }

      match candidate.execute(input.clone(), ctx).await {
        Ok(value) => {
          if stage > 0 {
            info!(
              primitive = %self.name,
              served_by = candidate.name(),
              stage,
              "fallback_recovered"
            );
          }
          return Ok(value);
        }
        Err(PrimitiveError::Cancelled) => return Err(PrimitiveError::Cancelled),
        Err(e) => {
          warn!(
            primitive = %self.name,
            stage,
            candidate = candidate.name(),
            error = %e,
            "fallback_stage_failed"
          );
          last_failure = Some(e);
        }
      }
    }

    let Some(last) = last_failure else {
      return Err(PrimitiveError::execution(&self.name, "no primitives configured"));
    };
    Err(PrimitiveError::FallbackExhausted {
      primitive: self.name.clone(),
      attempted: self.alternatives.len(),
      source: Box::new(last),
    })
  }
}
