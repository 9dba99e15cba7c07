//! Background cache maintenance.
//!
//! Two independent loops run against the shared [`CacheStore`]:
//!
//! 1. **Size enforcement** (default: every second) evicts one entry per
//!    tick while the store is at or over its byte budget
//! 2. **Stats reporting** (default: every 10 seconds) logs entry count and
//!    total size
//!
//! Both loops stop when the shutdown token is cancelled.
//!
//! # Example
//!
//! ```ignore
//! let lifecycle = CacheLifecycle::new(store, 8000 * 1024 * 1024);
//! let shutdown = CancellationToken::new();
//! let handles = lifecycle.spawn(shutdown.clone());
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::{human_bytes, CacheStore};

/// Default interval between budget checks.
pub const DEFAULT_ENFORCE_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval between stats log lines.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Result of a single enforcement tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforceOutcome {
    /// Store is under budget, nothing was removed
    WithinBudget,

    /// One entry of the given size was evicted
    Evicted(u64),

    /// Store reported being over budget but had nothing to remove
    Empty,

    /// Store could not be queried or trimmed
    Failed,
}

/// Keeps a cache store within a byte budget and reports its size.
pub struct CacheLifecycle {
    store: Arc<dyn CacheStore>,
    budget_bytes: u64,
    enforce_interval: Duration,
    stats_interval: Duration,
}

impl CacheLifecycle {
    /// Create a manager with default intervals.
    pub fn new(store: Arc<dyn CacheStore>, budget_bytes: u64) -> Self {
        Self {
            store,
            budget_bytes,
            enforce_interval: DEFAULT_ENFORCE_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }

    /// Set the interval between budget checks. Zero disables enforcement.
    pub fn with_enforce_interval(mut self, interval: Duration) -> Self {
        self.enforce_interval = interval;
        self
    }

    /// Set the interval between stats reports. Zero disables reporting.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// The byte budget this manager enforces.
    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// Run one enforcement step.
    ///
    /// Evicts at most one entry, even if the store remains over budget
    /// afterwards; the next tick continues trimming.
    pub async fn enforce_once(&self) -> EnforceOutcome {
        let stats = match self.store.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "Failed to read cache stats");
                return EnforceOutcome::Failed;
            }
        };

        if stats.total_bytes < self.budget_bytes {
            return EnforceOutcome::WithinBudget;
        }

        info!(
            total = %human_bytes(stats.total_bytes),
            budget = %human_bytes(self.budget_bytes),
            "Cache exceeds max size, deleting oldest item"
        );

        match self.store.delete_oldest().await {
            Ok(Some(size)) => {
                debug!(size, "Evicted cache entry");
                EnforceOutcome::Evicted(size)
            }
            Ok(None) => EnforceOutcome::Empty,
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "Failed to evict cache entry");
                EnforceOutcome::Failed
            }
        }
    }

    /// Log the current cache size once.
    pub async fn report_stats(&self) {
        match self.store.stats().await {
            Ok(stats) => info!(
                "Cache stats: {} images, {}",
                stats.count,
                human_bytes(stats.total_bytes)
            ),
            Err(e) => warn!(backend = self.store.name(), error = %e, "Failed to read cache stats"),
        }
    }

    /// Spawn the enforcement and stats loops.
    ///
    /// A loop whose interval is zero is not spawned.
    pub fn spawn(self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let this = Arc::new(self);
        let mut handles = Vec::with_capacity(2);

        if this.enforce_interval.is_zero() {
            warn!(
                backend = this.store.name(),
                "Cache size enforcement disabled, the cache may grow without bound"
            );
        } else {
            let enforcer = Arc::clone(&this);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                enforcer.run_enforcement(token).await;
            }));
        }

        if !this.stats_interval.is_zero() {
            let reporter = Arc::clone(&this);
            handles.push(tokio::spawn(async move {
                reporter.run_stats_reporter(shutdown).await;
            }));
        }

        handles
    }

    /// Run the enforcement loop until shutdown is signalled.
    ///
    /// Returns immediately when the interval is zero.
    pub async fn run_enforcement(&self, shutdown: CancellationToken) {
        if self.enforce_interval.is_zero() {
            return;
        }

        info!(
            backend = self.store.name(),
            budget = %human_bytes(self.budget_bytes),
            interval_ms = self.enforce_interval.as_millis() as u64,
            "Cache size enforcement starting"
        );

        let mut interval = tokio::time::interval(self.enforce_interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Cache size enforcement shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.enforce_once().await;
                }
            }
        }
    }

    /// Run the stats loop until shutdown is signalled.
    ///
    /// Returns immediately when the interval is zero.
    pub async fn run_stats_reporter(&self, shutdown: CancellationToken) {
        if self.stats_interval.is_zero() {
            return;
        }

        let mut interval = tokio::time::interval(self.stats_interval);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Cache stats reporter shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.report_stats().await;
                }
            }
        }
    }
}
