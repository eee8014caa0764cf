use async_trait::async_trait;
use tracing::{error, info, instrument, warn};
use trellis_context::ExecutionContext;
use trellis_core::{Outcome, Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

use crate::audit::{SagaAction, SagaAudit};

/// One link in a [`SagaChain`]: a forward primitive and the compensation
/// that undoes it. Compensation receives the same input its forward half
/// was given, mirroring the single-pair [`Saga`](crate::Saga) contract.
pub struct SagaStep<T> {
  forward: SharedPrimitive<T, T>,
  compensation: SharedPrimitive<T, ()>,
}

impl<T: Send + 'static> SagaStep<T> {
  pub fn new(forward: SharedPrimitive<T, T>, compensation: SharedPrimitive<T, ()>) -> Self {
    Self {
      forward,
      compensation,
    }
  }

  pub fn name(&self) -> &str {
    self.forward.name()
  }
}

/// Runs saga steps in order, threading each output into the next step.
///
/// When step `k` fails, the chain unwinds steps `k-1..0` in reverse order,
/// handing each compensation the input its forward half received. The
/// failed step is not compensated; its forward half is responsible for its
/// own partial state. Unwinding runs on a detached context and continues
/// past individual compensation failures, which are logged and audited but
/// never surfaced in place of the triggering error.
pub struct SagaChain<T> {
  name: String,
  steps: Vec<SagaStep<T>>,
  audit: Option<SagaAudit>,
}

impl<T> SagaChain<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      steps: Vec::new(),
      audit: None,
    }
  }

  pub fn step(
    mut self,
    forward: SharedPrimitive<T, T>,
    compensation: SharedPrimitive<T, ()>,
  ) -> Self {
    self.steps.push(SagaStep::new(forward, compensation));
    self
  }

  /// Attach a shared audit trail.
  pub fn with_audit(mut self, audit: SagaAudit) -> Self {
    self.audit = Some(audit);
    self
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  fn record(&self, step: &str, action: SagaAction, outcome: Outcome) {
    if let Some(audit) = &self.audit {
      audit.record(&self.name, step, action, outcome);
    }
  }

  /// Unwind completed steps in reverse, newest first.
  async fn unwind(&self, completed: Vec<(usize, T)>, ctx: &ExecutionContext) {
    let detached = ctx.detached();
    for (index, step_input) in completed.into_iter().rev() {
      let step = &self.steps[index];
      match step.compensation.execute(step_input, &detached).await {
        Ok(()) => {
          info!(saga = %self.name, step = %step.name(), index, "compensation_applied");
          self.record(step.name(), SagaAction::Compensation, Outcome::Success);
        }
        Err(cause) => {
          let failure = PrimitiveError::CompensationFailed {
            saga: self.name.clone(),
            step: step.name().to_string(),
            source: Box::new(cause),
          };
          error!(saga = %self.name, step = %step.name(), index, error = %failure, "compensation_failed");
          self.record(
            step.name(),
            SagaAction::Compensation,
            Outcome::from_error(&failure),
          );
        }
      }
    }
  }
}

#[async_trait]
impl<T> Primitive<T, T> for SagaChain<T>
where
  T: Clone + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "saga_chain_execute",
    skip(self, input, ctx),
    fields(
      saga = %self.name,
      steps = self.steps.len(),
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: T, ctx: &ExecutionContext) -> PrimitiveResult<T> {
    let mut current = input;
    let mut completed: Vec<(usize, T)> = Vec::with_capacity(self.steps.len());

    for (index, step) in self.steps.iter().enumerate() {
      if ctx.is_cancelled() {
        warn!(saga = %self.name, index, "saga_cancelled");
        self.unwind(completed, ctx).await;
        return Err(PrimitiveError::Cancelled);
      }

      let step_input = current.clone();
      match step.forward.execute(current, ctx).await {
        Ok(output) => {
          self.record(step.name(), SagaAction::Forward, Outcome::Success);
          completed.push((index, step_input));
          current = output;
        }
        Err(err) => {
          self.record(step.name(), SagaAction::Forward, Outcome::from_error(&err));
          self.unwind(completed, ctx).await;
          if err.is_cancelled() {
            return Err(PrimitiveError::Cancelled);
          }
          return Err(PrimitiveError::Step {
            operator: self.name.clone(),
            index,
            name: step.name().to_string(),
            source: Box::new(err),
          });
        }
      }
    }

    Ok(current)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use trellis_core::from_fn;

  type Trail = Arc<Mutex<Vec<String>>>;

  fn recording_step(trail: Trail, label: &str, fail: bool) -> (SharedPrimitive<i64, i64>, SharedPrimitive<i64, ()>) {
    let forward_label = label.to_string();
    let forward_trail = trail.clone();
    let forward = from_fn(label, move |n: i64| {
      let trail = forward_trail.clone();
      let label = forward_label.clone();
      async move {
        if fail {
          return Err(PrimitiveError::execution(&label, "boom"));
        }
        trail.lock().unwrap().push(format!("do:{label}"));
        Ok(n + 1)
      }
    });

    let undo_label = label.to_string();
    let compensation = from_fn(format!("undo-{label}"), move |n: i64| {
      let trail = trail.clone();
      let label = undo_label.clone();
      async move {
        trail.lock().unwrap().push(format!("undo:{label}:{n}"));
        Ok(())
      }
    });

    (forward, compensation)
  }

  #[tokio::test]
  async fn test_all_steps_succeed_without_unwinding() {
    let ctx = ExecutionContext::new();
    let trail: Trail = Arc::default();
    let (f1, c1) = recording_step(trail.clone(), "a", false);
    let (f2, c2) = recording_step(trail.clone(), "b", false);

    let chain = SagaChain::new("order").step(f1, c1).step(f2, c2);
    assert_eq!(chain.execute(0, &ctx).await.unwrap(), 2);
    assert_eq!(*trail.lock().unwrap(), vec!["do:a", "do:b"]);
  }

  #[tokio::test]
  async fn test_failure_unwinds_completed_steps_in_reverse() {
    let ctx = ExecutionContext::new();
    let audit = SagaAudit::new();
    let trail: Trail = Arc::default();
    let (f1, c1) = recording_step(trail.clone(), "reserve", false);
    let (f2, c2) = recording_step(trail.clone(), "charge", false);
    let (f3, c3) = recording_step(trail.clone(), "ship", true);

    let chain = SagaChain::new("order")
      .step(f1, c1)
      .step(f2, c2)
      .step(f3, c3)
      .with_audit(audit.clone());

    let err = chain.execute(0, &ctx).await.unwrap_err();
    assert!(matches!(err, PrimitiveError::Step { index: 2, .. }));

    // Compensations receive each step's own input, newest first; the
    // failed step itself is never compensated
    assert_eq!(
      *trail.lock().unwrap(),
      vec!["do:reserve", "do:charge", "undo:charge:1", "undo:reserve:0"]
    );

    let actions: Vec<_> = audit
      .entries()
      .iter()
      .map(|e| (e.step.clone(), e.action, e.outcome))
      .collect();
    assert_eq!(
      actions,
      vec![
        ("reserve".to_string(), SagaAction::Forward, Outcome::Success),
        ("charge".to_string(), SagaAction::Forward, Outcome::Success),
        ("ship".to_string(), SagaAction::Forward, Outcome::Failure),
        ("charge".to_string(), SagaAction::Compensation, Outcome::Success),
        ("reserve".to_string(), SagaAction::Compensation, Outcome::Success),
      ]
    );
  }

  #[tokio::test]
  async fn test_unwinding_continues_past_a_failed_compensation() {
    let ctx = ExecutionContext::new();
    let trail: Trail = Arc::default();
    let (f1, c1) = recording_step(trail.clone(), "first", false);

    let broken_undo = from_fn("undo-second", |_n: i64| async move {
      Err(PrimitiveError::execution("undo-second", "cannot undo"))
    });
    let second = from_fn("second", |n: i64| async move { Ok(n + 1) });
    let (f3, c3) = recording_step(trail.clone(), "third", true);

    let chain = SagaChain::new("order")
      .step(f1, c1)
      .step(second, broken_undo)
      .step(f3, c3);

    let err = chain.execute(0, &ctx).await.unwrap_err();
    assert!(matches!(err, PrimitiveError::Step { index: 2, .. }));
    // The broken second compensation did not stop the first from running
    assert_eq!(
      *trail.lock().unwrap(),
      vec!["do:first", "undo:first:0"]
    );
  }

  #[tokio::test]
  async fn test_empty_chain_is_identity() {
    let ctx = ExecutionContext::new();
    let chain: SagaChain<i64> = SagaChain::new("noop");
    assert!(chain.is_empty());
    assert_eq!(chain.execute(7, &ctx).await.unwrap(), 7);
  }
}
