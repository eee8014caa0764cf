use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use trellis_context::ExecutionContext;
use trellis_core::{Outcome, Primitive, PrimitiveResult, SharedPrimitive};

use crate::event::{TelemetryEvent, TelemetrySpan};
use crate::sink::TelemetrySink;

/// Emits a started/completed event pair around an inner primitive.
///
/// Transparent by contract: the inner result (success or failure) passes
/// through byte-for-byte, and `name()` reports the inner primitive's name so
/// wrapping does not change error attribution.
pub struct Observed<I, O> {
  inner: SharedPrimitive<I, O>,
  sink: Arc<dyn TelemetrySink>,
  tags: HashMap<String, String>,
}

impl<I, O> Observed<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  pub fn new(inner: SharedPrimitive<I, O>, sink: Arc<dyn TelemetrySink>) -> Self {
    Self {
      inner,
      sink,
      tags: HashMap::new(),
    }
  }

  /// Attach a static attribute to every completed span.
  pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.tags.insert(key.into(), value.into());
    self
  }

  fn attributes(&self, ctx: &ExecutionContext) -> HashMap<String, String> {
    let mut attributes = self.tags.clone();
    if let Some(workflow_id) = ctx.workflow_id() {
      attributes.insert("workflow_id".to_string(), workflow_id.to_string());
    }
    if let Some(session_id) = ctx.session_id() {
      attributes.insert("session_id".to_string(), session_id.to_string());
    }
    attributes
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Observed<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    self.inner.name()
  }

  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    self.sink.emit(TelemetryEvent::Started {
      primitive: self.inner.name().to_string(),
      correlation_id: ctx.correlation_id().to_string(),
    });

    let started = Instant::now();
    let result = self.inner.execute(input, ctx).await;

    self.sink.emit(TelemetryEvent::Completed {
      span: TelemetrySpan {
        primitive: self.inner.name().to_string(),
        outcome: Outcome::from_result(&result),
        duration_ms: started.elapsed().as_millis() as u64,
        correlation_id: ctx.correlation_id().to_string(),
        attributes: self.attributes(ctx),
      },
    });

    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sink::ChannelSink;
  use trellis_core::{PrimitiveError, from_fn};

  #[tokio::test]
  async fn test_success_passes_through_with_span() {
    let ctx = ExecutionContext::new().with_workflow_id("wf-9");
    let (sink, mut rx) = ChannelSink::pair();
    let observed = Observed::new(
      from_fn("double", |n: i64| async move { Ok(n * 2) }),
      Arc::new(sink),
    );

    assert_eq!(observed.execute(5, &ctx).await.unwrap(), 10);
    assert_eq!(observed.name(), "double");

    assert!(matches!(rx.try_recv().unwrap(), TelemetryEvent::Started { .. }));
    match rx.try_recv().unwrap() {
      TelemetryEvent::Completed { span } => {
        assert_eq!(span.primitive, "double");
        assert_eq!(span.outcome, Outcome::Success);
        assert_eq!(span.correlation_id, ctx.correlation_id());
        assert_eq!(span.attributes.get("workflow_id").unwrap(), "wf-9");
      }
      other => panic!("expected completed event, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_failure_is_classified_but_unaltered() {
    let ctx = ExecutionContext::new();
    let (sink, mut rx) = ChannelSink::pair();
    let observed = Observed::new(
      from_fn("boom", |_: i64| async move {
        Err::<i64, _>(PrimitiveError::execution("boom", "nope"))
      }),
      Arc::new(sink),
    )
    .with_tag("tier", "gold");

    let err = observed.execute(1, &ctx).await.unwrap_err();
    assert!(matches!(err, PrimitiveError::Execution { .. }));

    rx.try_recv().unwrap(); // started
    match rx.try_recv().unwrap() {
      TelemetryEvent::Completed { span } => {
        assert_eq!(span.outcome, Outcome::Failure);
        assert_eq!(span.attributes.get("tier").unwrap(), "gold");
      }
      other => panic!("expected completed event, got {other:?}"),
    }
  }
}
