//! Error types shared by every primitive.

use thiserror::Error;

/// Result alias used across the workspace.
pub type PrimitiveResult<O> = Result<O, PrimitiveError>;

/// Errors that can occur during primitive execution.
///
/// Composition operators never swallow failures; the wrapping variants
/// (`Step`, `RetryExhausted`, `FallbackExhausted`) always carry the inner
/// failure as their source. `Cancelled` is a distinct terminal outcome, not
/// a caller-level failure, and is never wrapped.
#[derive(Debug, Error)]
pub enum PrimitiveError {
  /// Bad input handed to a primitive.
  #[error("validation failed in '{primitive}': {message}")]
  Validation { primitive: String, message: String },

  /// The primitive raised a domain error.
  #[error("execution failed in '{primitive}': {message}")]
  Execution { primitive: String, message: String },

  /// A time-boxed execution exceeded its bound.
  #[error("'{primitive}' timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
  TimeoutExceeded {
    primitive: String,
    elapsed_ms: u64,
    limit_ms: u64,
  },

  /// Upstream cancellation or an expired deadline stopped the execution.
  #[error("execution cancelled")]
  Cancelled,

  /// A router computed a key with no registered primitive.
  #[error("no route '{key}' in '{primitive}' (available: {})", .available.join(", "))]
  RouteNotFound {
    primitive: String,
    key: String,
    available: Vec<String>,
  },

  /// Retry gave up; wraps the failure from the final attempt.
  #[error("'{primitive}' gave up after {attempts} attempts: {source}")]
  RetryExhausted {
    primitive: String,
    attempts: u32,
    #[source]
    source: Box<PrimitiveError>,
  },

  /// Every alternative failed; wraps the failure from the last one.
  #[error("'{primitive}' failed after trying {attempted} fallbacks: {source}")]
  FallbackExhausted {
    primitive: String,
    attempted: usize,
    #[source]
    source: Box<PrimitiveError>,
  },

  /// A compensation action itself failed. Logged as a distinct event and
  /// never propagated in place of the triggering failure.
  #[error("compensation failed in saga '{saga}' step '{step}': {source}")]
  CompensationFailed {
    saga: String,
    step: String,
    #[source]
    source: Box<PrimitiveError>,
  },

  /// A composition step failed; attaches the originating step's identity.
  #[error("step {index} ('{name}') of '{operator}' failed: {source}")]
  Step {
    operator: String,
    index: usize,
    name: String,
    #[source]
    source: Box<PrimitiveError>,
  },
}

impl PrimitiveError {
  /// Shorthand for a `Validation` failure.
  pub fn validation(primitive: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Validation {
      primitive: primitive.into(),
      message: message.into(),
    }
  }

  /// Shorthand for an `Execution` failure.
  pub fn execution(primitive: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Execution {
      primitive: primitive.into(),
      message: message.into(),
    }
  }

  /// Unwrap the wrapping variants down to the originating failure.
  pub fn root_cause(&self) -> &PrimitiveError {
    match self {
      Self::RetryExhausted { source, .. }
      | Self::FallbackExhausted { source, .. }
      | Self::CompensationFailed { source, .. }
      | Self::Step { source, .. } => source.root_cause(),
      other => other,
    }
  }

  /// Whether the root cause is a cancellation.
  pub fn is_cancelled(&self) -> bool {
    matches!(self.root_cause(), Self::Cancelled)
  }

  /// Whether the root cause is a timeout.
  pub fn is_timeout(&self) -> bool {
    matches!(self.root_cause(), Self::TimeoutExceeded { .. })
  }
}
