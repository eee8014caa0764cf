//! Parallel composition - fan the same input out, fan all outcomes in.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use trellis_context::ExecutionContext;

use crate::error::{PrimitiveError, PrimitiveResult};
use crate::primitive::{Primitive, SharedPrimitive};

/// Dispatches every branch concurrently with the same input, waits for all
/// of them to reach a terminal state, and returns the per-branch outcomes
/// index-aligned with the branch order.
///
/// A branch failure does not cancel its siblings: all outcomes (successes
/// and failures) are surfaced so the caller can implement partial-failure
/// handling explicitly. Callers wanting fail-fast compose a primitive on
/// top that inspects the outcome sequence and raises.
///
/// Each branch runs on an isolated child context; branch-local state is
/// discarded after fan-in, so anything a branch must report travels in its
/// output.
pub struct Parallel<I, O> {
  name: String,
  branches: Vec<SharedPrimitive<I, O>>,
  max_concurrency: Option<usize>,
}

impl<I, O> Parallel<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  pub fn new(name: impl Into<String>, branches: Vec<SharedPrimitive<I, O>>) -> Self {
    Self {
      name: name.into(),
      branches,
      max_concurrency: None,
    }
  }

  /// Bound the number of branches in flight at once.
  ///
  /// Branches are dispatched in chunks of at most `limit`; the result
  /// sequence stays index-aligned. The default is unbounded fan-out.
  pub fn with_max_concurrency(mut self, limit: usize) -> Self {
    self.max_concurrency = Some(limit.max(1));
    self
  }

  pub fn len(&self) -> usize {
    self.branches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.branches.is_empty()
  }
}

#[async_trait]
impl<I, O> Primitive<I, Vec<PrimitiveResult<O>>> for Parallel<I, O>
where
  I: Clone + Send + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "parallel_execute",
    skip(self, input, ctx),
    fields(
      operator = %self.name,
      branches = self.branches.len(),
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(
    &self,
    input: I,
    ctx: &ExecutionContext,
  ) -> PrimitiveResult<Vec<PrimitiveResult<O>>> {
    let chunk_size = self.max_concurrency.unwrap_or(self.branches.len()).max(1);
    let mut outcomes = Vec::with_capacity(self.branches.len());

    for batch in self.branches.chunks(chunk_size) {
      if ctx.is_cancelled() {
        return Err(PrimitiveError::Cancelled);
      }

      let mut handles = Vec::with_capacity(batch.len());
      for branch in batch {
        let branch = branch.clone();
        let branch_input = input.clone();
        let branch_ctx = ctx.child();
        handles.push(tokio::spawn(async move {
          branch.execute(branch_input, &branch_ctx).await
        }));
      }

      // Wait for the whole batch, abandoning fan-in on upstream cancellation
      let joined = tokio::select! {
        joined = futures::future::join_all(handles) => joined,
        _ = ctx.cancelled() => {
          warn!(operator = %self.name, "parallel_cancelled_during_fan_in");
          return Err(PrimitiveError::Cancelled);
        }
      };

      for join_result in joined {
        outcomes.push(match join_result {
          Ok(outcome) => outcome,
          Err(e) => Err(PrimitiveError::execution(
            &self.name,
            format!("branch task join error: {e}"),
          )),
        });
      }
    }

    debug!(
      operator = %self.name,
      failures = outcomes.iter().filter(|r| r.is_err()).count(),
      "fan_in_complete"
    );

    Ok(outcomes)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  use super::*;
  use crate::primitive::from_fn;

  /// Branch that sleeps `delay_ms` then returns its tag.
  fn slow_branch(tag: i64, delay_ms: u64) -> SharedPrimitive<i64, i64> {
    from_fn(format!("branch-{tag}"), move |_: i64| async move {
      tokio::time::sleep(Duration::from_millis(delay_ms)).await;
      Ok(tag)
    })
  }

  #[tokio::test]
  async fn test_results_are_index_aligned_regardless_of_latency() {
    let ctx = ExecutionContext::new();
    // Later branches finish first
    let fan = Parallel::new(
      "fan",
      vec![slow_branch(0, 40), slow_branch(1, 20), slow_branch(2, 0)],
    );

    let outcomes = fan.execute(0, &ctx).await.unwrap();
    assert_eq!(outcomes.len(), 3);
    for (index, outcome) in outcomes.iter().enumerate() {
      assert_eq!(*outcome.as_ref().unwrap(), index as i64);
    }
  }

  #[tokio::test]
  async fn test_branch_failure_does_not_cancel_siblings() {
    let ctx = ExecutionContext::new();
    let survivors = Arc::new(AtomicU32::new(0));

    let surviving = {
      let survivors = survivors.clone();
      from_fn("survivor", move |n: i64| {
        let survivors = survivors.clone();
        async move {
          tokio::time::sleep(Duration::from_millis(10)).await;
          survivors.fetch_add(1, Ordering::SeqCst);
          Ok(n)
        }
      })
    };

    let fan = Parallel::new(
      "fan",
      vec![
        from_fn("boom", |_: i64| async move {
          Err::<i64, _>(PrimitiveError::execution("boom", "branch failed"))
        }),
        surviving,
      ],
    );

    let outcomes = fan.execute(5, &ctx).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_err());
    assert_eq!(*outcomes[1].as_ref().unwrap(), 5);
    assert_eq!(survivors.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrency_bound_preserves_alignment() {
    let ctx = ExecutionContext::new();
    let fan = Parallel::new(
      "bounded",
      vec![slow_branch(0, 10), slow_branch(1, 0), slow_branch(2, 5)],
    )
    .with_max_concurrency(1);

    let outcomes = fan.execute(0, &ctx).await.unwrap();
    let values: Vec<i64> = outcomes.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, vec![0, 1, 2]);
  }

  #[tokio::test]
  async fn test_cancelled_context_returns_cancelled() {
    let ctx = ExecutionContext::new();
    ctx.cancel();

    let fan = Parallel::new("fan", vec![slow_branch(0, 0)]);
    let err = fan.execute(0, &ctx).await.unwrap_err();
    assert!(matches!(err, PrimitiveError::Cancelled));
  }

  #[tokio::test]
  async fn test_branch_state_writes_stay_local() {
    let ctx = ExecutionContext::new();
    let writer = from_fn("writer", |n: i64| async move { Ok(n) });

    // from_fn leaves cannot reach the context, so exercise isolation at the
    // operator level instead: a custom branch writing through its child.
    struct StateWriter;

    #[async_trait]
    impl Primitive<i64, i64> for StateWriter {
      fn name(&self) -> &str {
        "state-writer"
      }
      async fn execute(&self, input: i64, ctx: &ExecutionContext) -> PrimitiveResult<i64> {
        ctx.set_state("branch-only", serde_json::json!(input));
        Ok(input)
      }
    }

    let fan = Parallel::new("fan", vec![Arc::new(StateWriter) as SharedPrimitive<i64, i64>, writer]);
    fan.execute(3, &ctx).await.unwrap();
    assert!(ctx.state_value("branch-only").is_none());
  }
}
