//! Retry with backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use trellis_context::ExecutionContext;
use trellis_core::{Outcome, Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

use crate::backoff::RetryPolicy;

/// Classifies which failures are worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&PrimitiveError) -> bool + Send + Sync>;

/// Record of a single attempt, emitted for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
  /// Attempt number, monotonically increasing from 1.
  pub attempt: u32,
  /// Delay waited before this attempt.
  pub delay: Duration,
  pub outcome: Outcome,
}

/// Wraps one inner primitive with an attempt budget and a backoff policy.
///
/// Attempt 1 runs immediately. A retryable failure with attempts remaining
/// waits the policy's delay (abandoned on cancellation) and attempts again.
/// A non-retryable failure propagates verbatim; exhaustion surfaces the
/// *last* failure wrapped in `RetryExhausted` so callers see the most
/// recent diagnostic. Cancellation is never retried.
pub struct Retry<I, O> {
  name: String,
  inner: SharedPrimitive<I, O>,
  policy: RetryPolicy,
  retryable: Option<RetryPredicate>,
}

impl<I, O> Retry<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  pub fn new(inner: SharedPrimitive<I, O>, policy: RetryPolicy) -> Self {
    Self {
      name: format!("retry({})", inner.name()),
      inner,
      policy,
      retryable: None,
    }
  }

  /// Restrict retries to failures matching the predicate (default: all
  /// failures except cancellation are retryable).
  pub fn retry_if(
    mut self,
    predicate: impl Fn(&PrimitiveError) -> bool + Send + Sync + 'static,
  ) -> Self {
    self.retryable = Some(Arc::new(predicate));
    self
  }

  pub fn policy(&self) -> &RetryPolicy {
    &self.policy
  }

  fn is_retryable(&self, error: &PrimitiveError) -> bool {
    match &self.retryable {
      Some(predicate) => predicate(error),
      None => true,
    }
  }

  fn record(&self, attempt: RetryAttempt) {
    debug!(
      primitive = %self.name,
      attempt = attempt.attempt,
      delay_ms = attempt.delay.as_millis() as u64,
      outcome = %attempt.outcome,
      "retry_attempt"
    );
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Retry<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "retry_execute",
    skip(self, input, ctx),
    fields(
      primitive = %self.name,
      max_attempts = self.policy.max_attempts,
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    let max_attempts = self.policy.max_attempts.max(1);
    let mut attempt = 1u32;
    let mut delay = Duration::ZERO;

    loop {
      if ctx.is_cancelled() {
        return Err(PrimitiveError::Cancelled);
      }

      let outcome = self.inner.execute(input.clone(), ctx).await;
      self.record(RetryAttempt {
        attempt,
        delay,
        outcome: Outcome::from_result(&outcome),
      });

      let error = match outcome {
        Ok(value) => return Ok(value),
        Err(PrimitiveError::Cancelled) => return Err(PrimitiveError::Cancelled),
        Err(e) => e,
      };

      if !self.is_retryable(&error) {
        debug!(primitive = %self.name, attempt, error = %error, "failure_not_retryable");
        return Err(error);
      }

      if attempt >= max_attempts {
        warn!(primitive = %self.name, attempts = attempt, error = %error, "retry_exhausted");
        return Err(PrimitiveError::RetryExhausted {
          primitive: self.name.clone(),
          attempts: attempt,
          source: Box::new(error),
        });
      }

      delay = self.policy.delay_after(attempt);
      warn!(
        primitive = %self.name,
        attempt,
        next_delay_ms = delay.as_millis() as u64,
        error = %error,
        "retry_attempt_failed"
      );

      tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = ctx.cancelled() => return Err(PrimitiveError::Cancelled),
      }

      attempt += 1;
    }
  }
}
