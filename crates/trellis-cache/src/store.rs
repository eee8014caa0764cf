//! Cache storage trait and the in-memory default.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// A stored value plus the moment it was written.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
  pub fn new(value: V) -> Self {
    Self {
      value,
      stored_at: Instant::now(),
    }
  }

  /// An entry is logically absent once its age reaches the TTL, even if it
  /// has not been physically evicted yet.
  pub fn is_expired(&self, ttl: Duration) -> bool {
    self.stored_at.elapsed() >= ttl
  }
}

/// Storage seam for the cache primitive.
///
/// Implement this to back a cache with something other than the in-memory
/// default. All operations on a single key must be safe under concurrent
/// access; a store-wide lock is acceptable.
#[async_trait]
pub trait CacheStore<V>: Send + Sync {
  /// Get the entry for a key, if present.
  async fn get(&self, key: &str) -> Option<CacheEntry<V>>;

  /// Store an entry, overwriting any existing one.
  async fn put(&self, key: &str, entry: CacheEntry<V>);

  /// Remove an entry.
  async fn remove(&self, key: &str);

  /// Drop every entry.
  async fn clear(&self);

  /// Number of stored entries, expired ones included.
  async fn len(&self) -> usize;

  async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}

struct Slot<V> {
  entry: CacheEntry<V>,
  last_used: u64,
}

/// In-memory store guarded by a single lock.
///
/// Bounded by `capacity`: when an insert would exceed it, the
/// least-recently-used entry is evicted (linear scan - capacities here are
/// small enough that an ordered index is not worth the bookkeeping).
pub struct InMemoryCacheStore<V> {
  slots: RwLock<HashMap<String, Slot<V>>>,
  capacity: usize,
  tick: AtomicU64,
}

impl<V> InMemoryCacheStore<V> {
  pub const DEFAULT_CAPACITY: usize = 1024;

  pub fn new() -> Self {
    Self::with_capacity(Self::DEFAULT_CAPACITY)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      slots: RwLock::new(HashMap::new()),
      capacity: capacity.max(1),
      tick: AtomicU64::new(0),
    }
  }
}

impl<V> Default for InMemoryCacheStore<V> {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl<V> CacheStore<V> for InMemoryCacheStore<V>
where
  V: Clone + Send + Sync + 'static,
{
  async fn get(&self, key: &str) -> Option<CacheEntry<V>> {
    let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
    let slot = slots.get_mut(key)?;
    slot.last_used = self.tick.fetch_add(1, Ordering::Relaxed);
    Some(slot.entry.clone())
  }

  async fn put(&self, key: &str, entry: CacheEntry<V>) {
    let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());

    if !slots.contains_key(key) && slots.len() >= self.capacity {
      let oldest = slots
        .iter()
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(k, _)| k.clone());
      if let Some(oldest) = oldest {
        slots.remove(&oldest);
      }
    }

    slots.insert(
      key.to_string(),
      Slot {
        entry,
        last_used: self.tick.fetch_add(1, Ordering::Relaxed),
      },
    );
  }

  async fn remove(&self, key: &str) {
    let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
    slots.remove(key);
  }

  async fn clear(&self) {
    let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
    slots.clear();
  }

  async fn len(&self) -> usize {
    let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
    slots.len()
  }
}
