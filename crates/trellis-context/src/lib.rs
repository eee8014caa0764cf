//! Trellis Context
//!
//! The execution context threaded through every primitive call. It carries
//! correlation identifiers for telemetry grouping, a metadata bag for
//! routing decisions and cross-cutting tags, a state bag for passing side
//! information between steps, and the cancellation/deadline pair that
//! expresses upstream cancellation to nested compositions.

mod context;

pub use context::ExecutionContext;
