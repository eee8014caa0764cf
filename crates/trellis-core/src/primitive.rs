//! The primitive contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use trellis_context::ExecutionContext;

use crate::error::PrimitiveResult;

/// The single contract every building block implements.
///
/// A primitive accepts a typed input plus the shared execution context and
/// produces a typed output or a typed failure. Primitives are stateless with
/// respect to a single call; components that own long-lived state (a cache's
/// store, a saga's audit log) hold it behind shared handles.
///
/// Implementations must check [`ExecutionContext::is_cancelled`] at their
/// suspension points and return [`PrimitiveError::Cancelled`] instead of
/// starting new work once cancelled.
///
/// [`PrimitiveError::Cancelled`]: crate::PrimitiveError::Cancelled
#[async_trait]
pub trait Primitive<I, O>: Send + Sync
where
  I: Send + 'static,
  O: Send + 'static,
{
  /// Identity used in errors and telemetry.
  fn name(&self) -> &str;

  /// Execute with the given input and context.
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O>;
}

/// Shared handle to a primitive; the composition operators hold these.
pub type SharedPrimitive<I, O> = Arc<dyn Primitive<I, O>>;

/// Adapts an async closure into a [`Primitive`].
///
/// The conventional way to build leaves (and test doubles):
///
/// ```ignore
/// let double = from_fn("double", |n: i64| async move { Ok(n * 2) });
/// ```
pub struct FnPrimitive<F> {
  name: String,
  f: F,
}

impl<F> FnPrimitive<F> {
  pub fn new(name: impl Into<String>, f: F) -> Self {
    Self {
      name: name.into(),
      f,
    }
  }
}

#[async_trait]
impl<I, O, F, Fut> Primitive<I, O> for FnPrimitive<F>
where
  I: Send + 'static,
  O: Send + 'static,
  F: Fn(I) -> Fut + Send + Sync,
  Fut: Future<Output = PrimitiveResult<O>> + Send,
{
  fn name(&self) -> &str {
    &self.name
  }

  async fn execute(&self, input: I, _ctx: &ExecutionContext) -> PrimitiveResult<O> {
    (self.f)(input).await
  }
}

/// Build a shared primitive from an async closure.
pub fn from_fn<I, O, F, Fut>(name: impl Into<String>, f: F) -> SharedPrimitive<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
  F: Fn(I) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = PrimitiveResult<O>> + Send + 'static,
{
  Arc::new(FnPrimitive::new(name, f))
}
