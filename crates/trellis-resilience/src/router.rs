//! Content-based routing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use trellis_context::ExecutionContext;
use trellis_core::{Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

/// Derives a route key from the input and context.
pub type RouteFn<I> = Arc<dyn Fn(&I, &ExecutionContext) -> String + Send + Sync>;

/// Selects one of several primitives by a content-derived key.
///
/// If the computed key has no registered primitive and a default key is
/// configured, the default is substituted; otherwise the call fails with
/// `RouteNotFound` naming the attempted key and the available keys. The
/// selected primitive executes with the original input.
pub struct Router<I, O> {
  name: String,
  route_fn: RouteFn<I>,
  routes: HashMap<String, SharedPrimitive<I, O>>,
  default_route: Option<String>,
}

impl<I, O> Router<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  pub fn new(
    name: impl Into<String>,
    route_fn: impl Fn(&I, &ExecutionContext) -> String + Send + Sync + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      route_fn: Arc::new(route_fn),
      routes: HashMap::new(),
      default_route: None,
    }
  }

  /// Register a primitive under a route key.
  pub fn route(mut self, key: impl Into<String>, primitive: SharedPrimitive<I, O>) -> Self {
    self.routes.insert(key.into(), primitive);
    self
  }

  /// Key to substitute when the computed key has no registered primitive.
  pub fn default_route(mut self, key: impl Into<String>) -> Self {
    self.default_route = Some(key.into());
    self
  }

  fn available_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.routes.keys().cloned().collect();
    keys.sort();
    keys
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Router<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "router_execute",
    skip(self, input, ctx),
    fields(
      primitive = %self.name,
      routes = self.routes.len(),
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    if ctx.is_cancelled() {
      return Err(PrimitiveError::Cancelled);
    }

    let requested = (self.route_fn)(&input, ctx);

    let (selected, target) = match self.routes.get(&requested) {
      Some(target) => (requested.clone(), target),
      None => {
        let fallback = self
          .default_route
          .as_ref()
          .and_then(|key| self.routes.get(key).map(|target| (key.clone(), target)));
        match fallback {
          Some(pair) => pair,
          None => {
            return Err(PrimitiveError::RouteNotFound {
              primitive: self.name.clone(),
              key: requested,
              available: self.available_keys(),
            });
          }
        }
      }
    };

    info!(
      primitive = %self.name,
      requested = %requested,
      selected = %selected,
      available = ?self.available_keys(),
      "route_selected"
    );

    target.execute(input, ctx).await
  }
}
