use tokio::sync::mpsc;
use tracing::{info, warn};
use trellis_core::Outcome;

use crate::event::TelemetryEvent;

/// Trait for receiving telemetry events.
///
/// The observing wrapper calls `emit` for each event - implementations
/// decide what to do with them (persist, broadcast, log, ignore, etc.).
pub trait TelemetrySink: Send + Sync {
  /// Called for each lifecycle event.
  fn emit(&self, event: TelemetryEvent);
}

/// A no-op sink that discards all events.
///
/// Useful for tests or when telemetry is not needed.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
  fn emit(&self, _event: TelemetryEvent) {
    // Intentionally empty
  }
}

/// A sink that sends events to an unbounded channel.
///
/// Use this when you need to consume events asynchronously (e.g., persist
/// to a database, feed a metrics pipeline, assert on them in tests).
#[derive(Debug, Clone)]
pub struct ChannelSink {
  // NOTE: We use an unbounded channel here to avoid blocking execution if the
  // consumer is slow. The event volume is low (two per observed primitive), so
  // memory growth is unlikely in practice. If this becomes a concern, alternatives:
  // - Use bounded channel and accept backpressure (execution waits for slow consumer)
  // - Use try_send and drop events if buffer is full
  sender: mpsc::UnboundedSender<TelemetryEvent>,
}

impl ChannelSink {
  /// Create a sink over an existing sender half.
  pub fn new(sender: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
    Self { sender }
  }

  /// Create a sink together with the receiving half.
  pub fn pair() -> (Self, mpsc::UnboundedReceiver<TelemetryEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self::new(tx), rx)
  }
}

impl TelemetrySink for ChannelSink {
  fn emit(&self, event: TelemetryEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// A sink that forwards events to the active `tracing` subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
  fn emit(&self, event: TelemetryEvent) {
    match event {
      TelemetryEvent::Started {
        primitive,
        correlation_id,
      } => {
        info!(primitive = %primitive, correlation_id = %correlation_id, "primitive_started");
      }
      TelemetryEvent::Completed { span } => match span.outcome {
        Outcome::Success => {
          info!(
            primitive = %span.primitive,
            correlation_id = %span.correlation_id,
            outcome = %span.outcome,
            duration_ms = span.duration_ms,
            "primitive_completed"
          );
        }
        _ => {
          warn!(
            primitive = %span.primitive,
            correlation_id = %span.correlation_id,
            outcome = %span.outcome,
            duration_ms = span.duration_ms,
            "primitive_completed"
          );
        }
      },
    }
  }
}
