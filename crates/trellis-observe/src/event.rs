use std::collections::HashMap;

use serde::Serialize;
use trellis_core::Outcome;

/// What a completed execution looked like from the outside.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySpan {
  pub primitive: String,
  pub outcome: Outcome,
  pub duration_ms: u64,
  pub correlation_id: String,
  /// Context identifiers and any wrapper-supplied tags.
  pub attributes: HashMap<String, String>,
}

/// Lifecycle events emitted by [`Observed`](crate::Observed).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
  Started {
    primitive: String,
    correlation_id: String,
  },
  Completed {
    span: TelemetrySpan,
  },
}

impl TelemetryEvent {
  pub fn primitive(&self) -> &str {
    match self {
      Self::Started { primitive, .. } => primitive,
      Self::Completed { span } => &span.primitive,
    }
  }
}
