//! Trellis Cache
//!
//! The [`Cache`] primitive wraps an inner primitive with a key-derivation
//! function and a time-to-live. The backing store is injectable through the
//! [`CacheStore`] trait; [`InMemoryCacheStore`] is the default and is lost
//! on process exit.

mod cache;
mod store;

pub use cache::{Cache, KeyFn};
pub use store::{CacheEntry, CacheStore, InMemoryCacheStore};
