//! Outcome classification for telemetry and attempt records.

use serde::{Deserialize, Serialize};

use crate::error::{PrimitiveError, PrimitiveResult};

/// Terminal classification of a primitive execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Success,
  Failure,
  Timeout,
  Cancelled,
}

impl Outcome {
  /// Classify a finished execution.
  pub fn from_result<O>(result: &PrimitiveResult<O>) -> Self {
    match result {
      Ok(_) => Self::Success,
      Err(e) => Self::from_error(e),
    }
  }

  /// Classify a failure by its root cause.
  pub fn from_error(error: &PrimitiveError) -> Self {
    match error.root_cause() {
      PrimitiveError::TimeoutExceeded { .. } => Self::Timeout,
      PrimitiveError::Cancelled => Self::Cancelled,
      _ => Self::Failure,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::Failure => "failure",
      Self::Timeout => "timeout",
      Self::Cancelled => "cancelled",
    }
  }
}

impl std::fmt::Display for Outcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
