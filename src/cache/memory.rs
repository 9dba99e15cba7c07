//! Volatile in-process cache backend.
//!
//! Entries live in an unbounded [`LruCache`]; the lifecycle manager, not
//! the store, decides when to evict. The recency list and the entry map
//! are the same structure, so a key is never tracked twice and the
//! eviction order always covers exactly the stored keys.
//!
//! # Eviction order
//!
//! True LRU: both `get` hits and `set` (insert or overwrite) move a key to
//! the most-recent position, and `delete_oldest` removes the
//! least-recently-used key.

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::error::CacheError;

use super::store::{CacheStats, CacheStore};

struct Inner {
    entries: LruCache<String, Bytes>,

    /// Sum of `entries` value lengths, kept in step with every mutation
    total_bytes: u64,
}

/// In-memory LRU cache store.
///
/// # Thread Safety
///
/// A single `RwLock` guards the entries together with the byte total.
/// `get` takes the write lock because a hit reorders the recency list.
pub struct VolatileStore {
    inner: RwLock<Inner>,
}

impl VolatileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
        }
    }

    /// Check whether a key is cached without touching its recency.
    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.entries.contains(key)
    }

    /// Keys from least to most recently used.
    pub async fn keys_by_age(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }
}

impl Default for VolatileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for VolatileStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut inner = self.inner.write().await;
        Ok(inner.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        let added = value.len() as u64;

        if let Some(old) = inner.entries.put(key.to_string(), value) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.len() as u64);
        }
        inner.total_bytes += added;

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let inner = self.inner.read().await;
        Ok(CacheStats {
            count: inner.entries.len() as u64,
            total_bytes: inner.total_bytes,
        })
    }

    async fn delete_oldest(&self) -> Result<Option<u64>, CacheError> {
        let mut inner = self.inner.write().await;
        match inner.entries.pop_lru() {
            Some((_, value)) => {
                let size = value.len() as u64;
                inner.total_bytes = inner.total_bytes.saturating_sub(size);
                Ok(Some(size))
            }
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
