//! Time-boxed execution.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{instrument, warn};
use trellis_context::ExecutionContext;
use trellis_core::{Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

/// Wraps one inner primitive with a duration bound.
///
/// The inner primitive runs on a deadline scope derived from the caller's
/// context and is raced against the bound. If the deadline fires first the
/// scope's token is cancelled - a best-effort signal; the contract only
/// guarantees the wrapper returns promptly with a timeout failure, not that
/// the inner work stops immediately. No retry or fallback logic lives here.
pub struct Timeout<I, O> {
  name: String,
  limit: Duration,
  inner: SharedPrimitive<I, O>,
}

impl<I, O> Timeout<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  pub fn new(inner: SharedPrimitive<I, O>, limit: Duration) -> Self {
    Self {
      name: format!("timeout({})", inner.name()),
      limit,
      inner,
    }
  }

  pub fn limit(&self) -> Duration {
    self.limit
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Timeout<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "timeout_execute",
    skip(self, input, ctx),
    fields(
      primitive = %self.name,
      limit_ms = self.limit.as_millis() as u64,
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    if ctx.is_cancelled() {
      return Err(PrimitiveError::Cancelled);
    }

    let scope = ctx.deadline_scope(self.limit);
    let scope_cancel = scope.cancel_token().clone();
    let started = Instant::now();

    // Biased so the bound wins deterministically when it and the inner
    // execution become ready in the same tick
    tokio::select! {
      biased;
      _ = ctx.cancelled() => {
        scope_cancel.cancel();
        Err(PrimitiveError::Cancelled)
      }
      _ = tokio::time::sleep(self.limit) => {
        // Signal the subtree; it may not stop immediately, we return anyway
        scope_cancel.cancel();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        warn!(primitive = %self.name, elapsed_ms, "timeout_exceeded");
        Err(PrimitiveError::TimeoutExceeded {
          primitive: self.name.clone(),
          elapsed_ms,
          limit_ms: self.limit.as_millis() as u64,
        })
      }
      outcome = self.inner.execute(input, &scope) => {
        match outcome {
          // The scope deadline can fire inside the subtree a tick before our
          // own timer; that is still this wrapper's timeout, not an upstream
          // cancellation
          Err(e) if e.is_cancelled() && scope.is_cancelled() && !ctx.is_cancelled() => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            warn!(primitive = %self.name, elapsed_ms, "timeout_exceeded");
            Err(PrimitiveError::TimeoutExceeded {
              primitive: self.name.clone(),
              elapsed_ms,
              limit_ms: self.limit.as_millis() as u64,
            })
          }
          other => other,
        }
      }
    }
  }
}
