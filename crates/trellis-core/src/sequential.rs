//! Sequential composition - chain output to input.

use async_trait::async_trait;
use tracing::{debug, instrument};
use trellis_context::ExecutionContext;

use crate::error::{PrimitiveError, PrimitiveResult};
use crate::primitive::{Primitive, SharedPrimitive};

/// Runs primitives in order, each step's output feeding the next input.
///
/// The same context is threaded through every step, so state written by an
/// earlier step is visible to later ones. On a step failure execution stops
/// immediately and the failure propagates wrapped with the failing step's
/// index and name; no subsequent step runs.
pub struct Sequential<T> {
  name: String,
  steps: Vec<SharedPrimitive<T, T>>,
}

impl<T> Sequential<T>
where
  T: Send + 'static,
{
  pub fn new(name: impl Into<String>, steps: Vec<SharedPrimitive<T, T>>) -> Self {
    Self {
      name: name.into(),
      steps,
    }
  }

  /// Append a step to the chain.
  pub fn step(mut self, step: SharedPrimitive<T, T>) -> Self {
    self.steps.push(step);
    self
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

#[async_trait]
impl<T> Primitive<T, T> for Sequential<T>
where
  T: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "sequential_execute",
    skip(self, input, ctx),
    fields(
      operator = %self.name,
      steps = self.steps.len(),
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: T, ctx: &ExecutionContext) -> PrimitiveResult<T> {
    let mut value = input;

    for (index, step) in self.steps.iter().enumerate() {
      if ctx.is_cancelled() {
        return Err(PrimitiveError::Cancelled);
      }

      debug!(step = index, step_name = step.name(), "step_started");

      value = match step.execute(value, ctx).await {
        Ok(next) => next,
        Err(PrimitiveError::Cancelled) => return Err(PrimitiveError::Cancelled),
        Err(e) => {
          return Err(PrimitiveError::Step {
            operator: self.name.clone(),
            index,
            name: step.name().to_string(),
            source: Box::new(e),
          });
        }
      };
    }

    Ok(value)
  }
}
