//! # pixproxy
//!
//! An on-demand image transformation proxy.
//!
//! Clients request `GET /img?u=<source>&f=<format>&w=..&h=..&q=..`; the proxy
//! fetches the source image, optionally resizes it, re-encodes it in the
//! requested format, and memoizes the result under a cache key derived from
//! the request parameters. Identical requests are served from cache.
//!
//! ## Features
//!
//! - **Formats**: JPEG, PNG, GIF, WebP (lossless) and AVIF output
//! - **Aspect-preserving resize**: either dimension may be left at 0
//! - **Pluggable caching**: in-memory LRU or pooled SQLite/MySQL, behind one trait
//! - **Byte budget**: a background task evicts the oldest entries while the
//!   cache is over its configured size
//! - **Fail-open cache**: cache errors degrade to misses, never to failed requests
//!
//! ## Architecture
//!
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types for every layer
//! - [`mod@format`] - Output formats and content-type sniffing
//! - [`io`] - Source image fetching
//! - [`cache`] - Cache stores and the lifecycle manager
//! - [`transform`] - Parameter parsing, cache keys and the transform pipeline
//! - [`server`] - Axum-based HTTP server and routes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pixproxy::{create_router, HttpFetcher, RouterConfig, TransformService, VolatileStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = HttpFetcher::new().unwrap();
//!     let service = TransformService::new(fetcher, Arc::new(VolatileStore::new()));
//!     let router = create_router(service, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod server;
pub mod transform;

// Re-export commonly used types
pub use cache::{
    human_bytes, CacheLifecycle, CacheStats, CacheStore, EnforceOutcome, PersistentStore,
    SqlTarget, VolatileStore,
};
pub use config::{CacheBackend, Config, DbType};
pub use error::{CacheError, FetchError, ProxyError, TransformError};
pub use format::{sniff_content_type, OutputFormat};
pub use io::{HttpFetcher, SourceFetcher};
pub use server::{create_router, AppState, HealthResponse, RouterConfig};
pub use transform::{
    ImageEngine, JobDescriptor, TransformEngine, TransformResponse, TransformService,
};
