//! Cache subsystem.
//!
//! Transformed images are memoized under their cache key so identical
//! requests are computed once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           TransformService              │
//! └────────────────────┬────────────────────┘
//!                      │ get / set
//!                      ▼
//! ┌─────────────────────────────────────────┐      stats / delete_oldest
//! │        CacheStore (dyn trait)           │◄──────────────────────────┐
//! └────────────────────┬────────────────────┘                           │
//!          ┌───────────┴───────────┐                      ┌─────────────┴─────┐
//!          ▼                       ▼                      │  CacheLifecycle   │
//! ┌─────────────────┐    ┌─────────────────────┐          │ (budget + stats)  │
//! │  VolatileStore  │    │  PersistentStore    │          └───────────────────┘
//! │  (in-memory LRU)│    │ (SQLite or MySQL)   │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`CacheStore`]: backend-agnostic `get / set / stats / delete_oldest` contract
//! - [`VolatileStore`]: in-process LRU, lost on restart
//! - [`PersistentStore`]: pooled SQLite or MySQL table, survives restarts
//! - [`CacheLifecycle`]: background byte-budget enforcement and stats logging
//!
//! # Example
//!
//! ```
//! use pixproxy::cache::{CacheStore, VolatileStore};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = VolatileStore::new();
//!
//!     store.set("http://x/a.png-100-0-jpg", Bytes::from_static(b"...")).await.unwrap();
//!     let hit = store.get("http://x/a.png-100-0-jpg").await.unwrap();
//!     assert!(hit.is_some());
//! }
//! ```

mod lifecycle;
mod memory;
mod sql;
mod store;

pub use lifecycle::{
    CacheLifecycle, EnforceOutcome, DEFAULT_ENFORCE_INTERVAL, DEFAULT_STATS_INTERVAL,
};
pub use memory::VolatileStore;
pub use sql::{PersistentStore, SqlTarget, DB_RETRY_DELAY, DEFAULT_MAX_CONNECTIONS};
pub use store::{human_bytes, CacheStats, CacheStore};
