//! Response-cache stores.
//!
//! The dispatcher consumes a two-operation surface: [`get`](CacheStore::get)
//! and [`set`](CacheStore::set) with a per-entry TTL. A miss and a backend
//! failure look the same (`None`); the endpoint simply runs its handler.
//! Stores must be thread-safe; the core serializes nothing.

use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pluggable cache backend.
///
/// Implement this to swap the in-memory store for Redis, Memcached, etc.
pub trait CacheStore: Send + Sync + 'static {
    /// Fetch a cached value. `None` on miss, expiry, or backend failure.
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>>;

    /// Store a value with its time-to-live.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Bytes,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// In-memory cache store backed by `DashMap`.
///
/// Each entry stores `(value, inserted_at, ttl)` and is lazily evicted on
/// access.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<DashMap<String, (Bytes, Instant, Duration)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        self.inner
            .retain(|_, (_, inserted, ttl)| inserted.elapsed() < *ttl);
    }

    /// Number of live entries (expired ones included until evicted).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl CacheStore for InMemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(entry) = self.inner.get(key) {
                let (value, inserted, ttl) = entry.value();
                if inserted.elapsed() < *ttl {
                    return Some(value.clone());
                }
                // Expired; drop the read guard before removing
                drop(entry);
                self.inner.remove(key);
            }
            None
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: Bytes,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.inner
                .insert(key.to_string(), (value, Instant::now(), ttl));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get() {
        let store = InMemoryStore::new();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await;
        assert_eq!(store.get("k").await, Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn expired_entries_miss_and_evict() {
        let store = InMemoryStore::new();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.get("k").await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn per_entry_ttl() {
        let store = InMemoryStore::new();
        store
            .set("short", Bytes::from_static(b"a"), Duration::from_millis(1))
            .await;
        store
            .set("long", Bytes::from_static(b"b"), Duration::from_secs(60))
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.evict_expired();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await, Some(Bytes::from_static(b"b")));
    }
}
