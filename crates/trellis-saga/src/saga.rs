use async_trait::async_trait;
use tracing::{error, info, instrument};
use trellis_context::ExecutionContext;
use trellis_core::{Outcome, Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

use crate::audit::{SagaAction, SagaAudit};

/// One forward primitive paired with its compensating primitive.
///
/// The forward result passes through untouched on success. On failure the
/// compensation runs with the original input on a detached context, so a
/// cancellation that interrupted the forward half cannot also interrupt the
/// cleanup. A compensation failure is logged and recorded but never replaces
/// the forward error returned to the caller.
pub struct Saga<I, O> {
  name: String,
  forward: SharedPrimitive<I, O>,
  compensation: SharedPrimitive<I, ()>,
  audit: Option<SagaAudit>,
}

impl<I, O> Saga<I, O>
where
  I: Clone + Send + Sync + 'static,
  O: Send + 'static,
{
  pub fn new(forward: SharedPrimitive<I, O>, compensation: SharedPrimitive<I, ()>) -> Self {
    Self {
      name: format!("saga({})", forward.name()),
      forward,
      compensation,
      audit: None,
    }
  }

  /// Attach a shared audit trail.
  pub fn with_audit(mut self, audit: SagaAudit) -> Self {
    self.audit = Some(audit);
    self
  }

  fn record(&self, step: &str, action: SagaAction, outcome: Outcome) {
    if let Some(audit) = &self.audit {
      audit.record(&self.name, step, action, outcome);
    }
  }

  async fn compensate(&self, input: I, ctx: &ExecutionContext) {
    // Detached so in-flight cancellation cannot interrupt the cleanup
    let detached = ctx.detached();
    let step = self.forward.name().to_string();
    match self.compensation.execute(input, &detached).await {
      Ok(()) => {
        info!(saga = %self.name, step = %step, "compensation_applied");
        self.record(&step, SagaAction::Compensation, Outcome::Success);
      }
      Err(cause) => {
        let failure = PrimitiveError::CompensationFailed {
          saga: self.name.clone(),
          step: step.clone(),
          source: Box::new(cause),
        };
        error!(saga = %self.name, step = %step, error = %failure, "compensation_failed");
        self.record(&step, SagaAction::Compensation, Outcome::from_error(&failure));
      }
    }
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Saga<I, O>
where
  I: Clone + Send + Sync + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "saga_execute",
    skip(self, input, ctx),
    fields(
      saga = %self.name,
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    if ctx.is_cancelled() {
      return Err(PrimitiveError::Cancelled);
    }

    let step = self.forward.name().to_string();
    match self.forward.execute(input.clone(), ctx).await {
      Ok(output) => {
        self.record(&step, SagaAction::Forward, Outcome::Success);
        Ok(output)
      }
      Err(err) => {
        self.record(&step, SagaAction::Forward, Outcome::from_error(&err));
        self.compensate(input, ctx).await;
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;
  use trellis_core::from_fn;

  #[tokio::test]
  async fn test_success_skips_compensation() {
    let ctx = ExecutionContext::new();
    let undone = Arc::new(AtomicU32::new(0));
    let undone_probe = undone.clone();

    let saga = Saga::new(
      from_fn("reserve", |qty: u32| async move { Ok(qty * 2) }),
      from_fn("release", move |_qty: u32| {
        let undone = undone_probe.clone();
        async move {
          undone.fetch_add(1, Ordering::SeqCst);
          Ok(())
        }
      }),
    );

    assert_eq!(saga.execute(3, &ctx).await.unwrap(), 6);
    assert_eq!(undone.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failure_compensates_and_returns_forward_error() {
    let ctx = ExecutionContext::new();
    let audit = SagaAudit::new();
    let undone = Arc::new(AtomicU32::new(0));
    let undone_probe = undone.clone();

    let saga = Saga::new(
      from_fn("reserve", |_qty: u32| async move {
        Err::<u32, _>(PrimitiveError::execution("reserve", "stock exhausted"))
      }),
      from_fn("release", move |qty: u32| {
        let undone = undone_probe.clone();
        async move {
          undone.fetch_add(qty, Ordering::SeqCst);
          Ok(())
        }
      }),
    )
    .with_audit(audit.clone());

    let err = saga.execute(4, &ctx).await.unwrap_err();
    assert!(matches!(err, PrimitiveError::Execution { .. }));
    // Compensation received the original input
    assert_eq!(undone.load(Ordering::SeqCst), 4);

    let entries = audit.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, SagaAction::Forward);
    assert_eq!(entries[0].outcome, Outcome::Failure);
    assert_eq!(entries[1].action, SagaAction::Compensation);
    assert_eq!(entries[1].outcome, Outcome::Success);
  }

  #[tokio::test]
  async fn test_compensation_failure_never_masks_forward_error() {
    let ctx = ExecutionContext::new();
    let audit = SagaAudit::new();

    let saga = Saga::new(
      from_fn("charge", |_amount: u32| async move {
        Err::<u32, _>(PrimitiveError::execution("charge", "card declined"))
      }),
      from_fn("refund", |_amount: u32| async move {
        Err(PrimitiveError::execution("refund", "gateway offline"))
      }),
    )
    .with_audit(audit.clone());

    let err = saga.execute(100, &ctx).await.unwrap_err();
    assert_eq!(
      err.to_string(),
      "execution failed in 'charge': card declined"
    );

    let entries = audit.entries();
    assert_eq!(entries[1].action, SagaAction::Compensation);
    assert_eq!(entries[1].outcome, Outcome::Failure);
  }

  #[tokio::test]
  async fn test_compensation_runs_despite_cancellation() {
    let ctx = ExecutionContext::new();
    let undone = Arc::new(AtomicU32::new(0));
    let undone_probe = undone.clone();

    let cancel_on_entry = ctx.clone();
    let saga = Saga::new(
      from_fn("hold", move |_n: u32| {
        let ctx = cancel_on_entry.clone();
        async move {
          ctx.cancel();
          Err::<u32, _>(PrimitiveError::Cancelled)
        }
      }),
      from_fn("unhold", move |_n: u32| {
        let undone = undone_probe.clone();
        async move {
          undone.fetch_add(1, Ordering::SeqCst);
          Ok(())
        }
      }),
    );

    let err = saga.execute(1, &ctx).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(undone.load(Ordering::SeqCst), 1);
  }
}
