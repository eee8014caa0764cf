//! Trellis Observe
//!
//! The [`Observed`] wrapper emits a [`TelemetryEvent`] pair (started and
//! completed) around an inner primitive without altering its behaviour.
//! Events go to a [`TelemetrySink`]; [`TracingSink`] forwards them to the
//! `tracing` subscriber, [`ChannelSink`] hands them to an in-process
//! consumer, and [`NoopSink`] drops them.

mod event;
mod observed;
mod sink;

pub use event::{TelemetryEvent, TelemetrySpan};
pub use observed::Observed;
pub use sink::{ChannelSink, NoopSink, TelemetrySink, TracingSink};
