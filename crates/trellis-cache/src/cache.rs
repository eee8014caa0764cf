//! The cache primitive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};
use trellis_context::ExecutionContext;
use trellis_core::{Primitive, PrimitiveError, PrimitiveResult, SharedPrimitive};

use crate::store::{CacheEntry, CacheStore, InMemoryCacheStore};

/// Derives the cache key from the input and context.
pub type KeyFn<I> = Arc<dyn Fn(&I, &ExecutionContext) -> String + Send + Sync>;

/// Wraps one inner primitive with a key-derivation function and a TTL.
///
/// A fresh entry for the derived key is returned without invoking the inner
/// primitive; a miss (including an expired entry, which is lazily evicted)
/// invokes it and stores the value on success. Failures are never cached.
///
/// Concurrent misses on the same key do not block each other - there is no
/// single-flight guarantee; duplicate inner invocations are permitted and a
/// later write simply overwrites an earlier one.
pub struct Cache<I, O> {
  name: String,
  inner: SharedPrimitive<I, O>,
  key_fn: KeyFn<I>,
  ttl: Duration,
  store: Arc<dyn CacheStore<O>>,
}

impl<I, O> Cache<I, O>
where
  I: Send + 'static,
  O: Clone + Send + Sync + 'static,
{
  /// Cache over the default in-memory store.
  pub fn new(
    inner: SharedPrimitive<I, O>,
    ttl: Duration,
    key_fn: impl Fn(&I, &ExecutionContext) -> String + Send + Sync + 'static,
  ) -> Self {
    Self::with_store(inner, ttl, key_fn, Arc::new(InMemoryCacheStore::new()))
  }

  /// Cache over a caller-supplied store.
  pub fn with_store(
    inner: SharedPrimitive<I, O>,
    ttl: Duration,
    key_fn: impl Fn(&I, &ExecutionContext) -> String + Send + Sync + 'static,
    store: Arc<dyn CacheStore<O>>,
  ) -> Self {
    Self {
      name: format!("cache({})", inner.name()),
      inner,
      key_fn: Arc::new(key_fn),
      ttl: ttl.max(Duration::from_nanos(1)),
      store,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// The backing store handle.
  pub fn store(&self) -> Arc<dyn CacheStore<O>> {
    self.store.clone()
  }
}

#[async_trait]
impl<I, O> Primitive<I, O> for Cache<I, O>
where
  I: Send + 'static,
  O: Clone + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    &self.name
  }

  #[instrument(
    name = "cache_execute",
    skip(self, input, ctx),
    fields(
      primitive = %self.name,
      correlation_id = %ctx.correlation_id(),
    )
  )]
  async fn execute(&self, input: I, ctx: &ExecutionContext) -> PrimitiveResult<O> {
    if ctx.is_cancelled() {
      return Err(PrimitiveError::Cancelled);
    }

    let key = (self.key_fn)(&input, ctx);

    if let Some(entry) = self.store.get(&key).await {
      if entry.is_expired(self.ttl) {
        debug!(primitive = %self.name, key = %key, "cache_entry_expired");
        self.store.remove(&key).await;
      } else {
        debug!(primitive = %self.name, key = %key, "cache_hit");
        return Ok(entry.value);
      }
    }

    debug!(primitive = %self.name, key = %key, "cache_miss");
    let value = self.inner.execute(input, ctx).await?;
    self.store.put(&key, CacheEntry::new(value.clone())).await;
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;
  use trellis_core::from_fn;

  fn counting_inner(counter: Arc<AtomicU32>) -> SharedPrimitive<String, String> {
    from_fn("lookup", move |key: String| {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("value-for-{key}"))
      }
    })
  }

  fn key_by_input(input: &String, _ctx: &ExecutionContext) -> String {
    input.clone()
  }

  #[tokio::test]
  async fn test_hit_within_ttl_skips_inner() {
    let ctx = ExecutionContext::new();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = Cache::new(
      counting_inner(calls.clone()),
      Duration::from_secs(60),
      key_by_input,
    );

    let first = cache.execute("user-1".to_string(), &ctx).await.unwrap();
    let second = cache.execute("user-1".to_string(), &ctx).await.unwrap();

    assert_eq!(first, "value-for-user-1");
    assert_eq!(second, "value-for-user-1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_invokes_inner_again() {
    let ctx = ExecutionContext::new();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = Cache::new(
      counting_inner(calls.clone()),
      Duration::from_millis(40),
      key_by_input,
    );

    cache.execute("k".to_string(), &ctx).await.unwrap(); // t=0: miss, stores
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.execute("k".to_string(), &ctx).await.unwrap(); // in window: hit
    tokio::time::sleep(Duration::from_millis(50)).await;
    cache.execute("k".to_string(), &ctx).await.unwrap(); // past TTL: miss again

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_distinct_keys_do_not_share_entries() {
    let ctx = ExecutionContext::new();
    let calls = Arc::new(AtomicU32::new(0));
    let cache = Cache::new(
      counting_inner(calls.clone()),
      Duration::from_secs(60),
      key_by_input,
    );

    cache.execute("a".to_string(), &ctx).await.unwrap();
    cache.execute("b".to_string(), &ctx).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failures_are_never_cached() {
    let ctx = ExecutionContext::new();
    let calls = Arc::new(AtomicU32::new(0));

    let flaky = {
      let calls = calls.clone();
      from_fn("flaky", move |key: String| {
        let calls = calls.clone();
        async move {
          let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
          if call == 1 {
            Err(PrimitiveError::execution("flaky", "first call fails"))
          } else {
            Ok(format!("value-for-{key}"))
          }
        }
      })
    };
    let cache = Cache::new(flaky, Duration::from_secs(60), key_by_input);

    assert!(cache.execute("k".to_string(), &ctx).await.is_err());
    // The failure was not stored; the next call re-invokes and succeeds
    assert_eq!(
      cache.execute("k".to_string(), &ctx).await.unwrap(),
      "value-for-k"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_key_fn_can_use_context_metadata() {
    let ctx = ExecutionContext::new();
    ctx.set_metadata("tenant", serde_json::json!("acme"));
    let calls = Arc::new(AtomicU32::new(0));

    let cache = Cache::new(
      counting_inner(calls.clone()),
      Duration::from_secs(60),
      |input: &String, ctx: &ExecutionContext| {
        let tenant = ctx
          .metadata_value("tenant")
          .and_then(|v| v.as_str().map(str::to_string))
          .unwrap_or_default();
        format!("{tenant}:{input}")
      },
    );

    cache.execute("q".to_string(), &ctx).await.unwrap();

    // Same input, different tenant: a different key, so a second inner call
    let other = ExecutionContext::new();
    other.set_metadata("tenant", serde_json::json!("globex"));
    cache.execute("q".to_string(), &other).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
