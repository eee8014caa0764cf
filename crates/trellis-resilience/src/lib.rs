//! Trellis Resilience
//!
//! Wrappers that make a single inner primitive resilient: [`Timeout`]
//! bounds execution time, [`Retry`] re-attempts with a backoff policy,
//! [`Fallback`] walks an ordered list of alternatives, and [`Router`]
//! selects a primitive by a content-derived key. Each wrapper composes
//! freely with the others and with the operators in `trellis-core`.

mod backoff;
mod fallback;
mod retry;
mod router;
mod timeout;

pub use backoff::{Backoff, RetryPolicy};
pub use fallback::Fallback;
pub use retry::{Retry, RetryAttempt, RetryPredicate};
pub use router::{RouteFn, Router};
pub use timeout::Timeout;
