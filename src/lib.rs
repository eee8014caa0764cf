//! Trellis
//!
//! Composable async execution primitives. Every building block implements
//! the same [`Primitive`] contract, so resilience wrappers and composition
//! operators nest freely:
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trellis::{ExecutionContext, Retry, RetryPolicy, Timeout, from_fn};
//!
//! let fetch = from_fn("fetch-profile", |user_id: String| async move {
//!   // ... call the upstream service ...
//!   Ok(format!("profile:{user_id}"))
//! });
//!
//! let resilient = Retry::new(
//!   Arc::new(Timeout::new(fetch, Duration::from_millis(250))),
//!   RetryPolicy::exponential(3, Duration::from_millis(50)),
//! );
//!
//! let ctx = ExecutionContext::new();
//! let profile = resilient.execute("u-42".to_string(), &ctx).await?;
//! ```
//!
//! The crates compose as layers: `trellis-context` carries identity,
//! cancellation, and deadlines; `trellis-core` defines the contract, the
//! error taxonomy, and the [`Sequential`]/[`Parallel`] operators;
//! `trellis-resilience`, `trellis-cache`, and `trellis-saga` wrap single
//! primitives with recovery behaviour; `trellis-observe` watches any of
//! them without changing what they do.

pub use trellis_cache::{Cache, CacheEntry, CacheStore, InMemoryCacheStore, KeyFn};
pub use trellis_context::ExecutionContext;
pub use trellis_core::{
  FnPrimitive, Outcome, Parallel, Primitive, PrimitiveError, PrimitiveResult, Sequential,
  SharedPrimitive, from_fn,
};
pub use trellis_observe::{
  ChannelSink, NoopSink, Observed, TelemetryEvent, TelemetrySink, TelemetrySpan, TracingSink,
};
pub use trellis_resilience::{
  Backoff, Fallback, Retry, RetryAttempt, RetryPolicy, RetryPredicate, RouteFn, Router, Timeout,
};
pub use trellis_saga::{Saga, SagaAction, SagaAudit, SagaAuditEntry, SagaChain, SagaStep};
