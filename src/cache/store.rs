use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;

/// Snapshot of a cache's contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached images
    pub count: u64,

    /// Sum of the cached value sizes in bytes
    pub total_bytes: u64,
}

/// Storage contract shared by every cache backend.
///
/// The pipeline only ever talks to a `dyn CacheStore`, so backends can be
/// swapped at startup without touching request handling.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a cached value.
    ///
    /// Backends with recency ordering treat a hit as a use.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Insert or wholesale-replace a value.
    async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError>;

    /// Count and total byte size of all entries.
    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Remove exactly one entry, the next eviction candidate.
    ///
    /// Returns the size of the removed value, or `None` if the store was empty.
    async fn delete_oldest(&self) -> Result<Option<u64>, CacheError>;

    /// Short backend name for logging.
    fn name(&self) -> &'static str;
}

/// Format a byte count using 1000-based units and one decimal place.
///
/// ```
/// use pixproxy::cache::human_bytes;
///
/// assert_eq!(human_bytes(999), "999 B");
/// assert_eq!(human_bytes(1_500_000), "1.5 MB");
/// ```
pub fn human_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    const PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
