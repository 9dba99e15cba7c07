//! Transform Service for orchestrating image requests.
//!
//! The TransformService is the main entry point for image requests. It orchestrates:
//! - Parameter parsing and format resolution
//! - Cache lookups
//! - Source fetching
//! - Decoding, resizing and re-encoding
//! - Result caching
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        TransformService                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                       process()                            │  │
//! │  │  1. Resolve format    4. Fetch source                      │  │
//! │  │  2. Derive key        5. Decode / resize / encode          │  │
//! │  │  3. Check cache       6. Cache & return                    │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │           │                    │                    │            │
//! │           ▼                    ▼                    ▼            │
//! │    ┌────────────┐      ┌───────────────┐    ┌─────────────────┐  │
//! │    │ CacheStore │      │ SourceFetcher │    │ TransformEngine │  │
//! │    └────────────┘      └───────────────┘    └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure policy
//!
//! Cache failures never fail a request: a read error is treated as a miss
//! and a write error still serves the freshly encoded bytes. Nothing is
//! retried.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::error::{CacheError, ProxyError};
use crate::format::{sniff_content_type, OutputFormat};
use crate::io::SourceFetcher;

use super::engine::{ImageEngine, TransformEngine};
use super::job::JobDescriptor;

// =============================================================================
// Transform Response
// =============================================================================

/// Response from the transform service.
#[derive(Debug, Clone)]
pub struct TransformResponse {
    /// The encoded image bytes
    pub data: Bytes,

    /// MIME type sniffed from `data`
    pub content_type: &'static str,

    /// Whether the bytes were served from cache
    pub cache_hit: bool,
}

// =============================================================================
// Transform Service
// =============================================================================

/// Service for transforming and caching images.
///
/// # Type Parameters
///
/// * `F` - The source fetcher (e.g. [`crate::io::HttpFetcher`])
///
/// # Example
///
/// ```ignore
/// use pixproxy::cache::VolatileStore;
/// use pixproxy::io::HttpFetcher;
/// use pixproxy::transform::{JobDescriptor, TransformService};
///
/// let service = TransformService::new(HttpFetcher::new()?, Arc::new(VolatileStore::new()));
///
/// let job = JobDescriptor::from_query(&params)?;
/// let response = service.process(&job).await?;
///
/// println!("{} bytes, cache hit: {}", response.data.len(), response.cache_hit);
/// ```
pub struct TransformService<F: SourceFetcher> {
    /// Fetcher for original images
    fetcher: Arc<F>,

    /// Shared cache backend
    store: Arc<dyn CacheStore>,

    /// Decode/resize/encode implementation
    engine: Arc<dyn TransformEngine>,
}

impl<F: SourceFetcher> TransformService<F> {
    /// Create a service using the bundled [`ImageEngine`].
    pub fn new(fetcher: F, store: Arc<dyn CacheStore>) -> Self {
        Self::with_engine(fetcher, store, Arc::new(ImageEngine::new()))
    }

    /// Create a service with a custom transformation engine.
    pub fn with_engine(
        fetcher: F,
        store: Arc<dyn CacheStore>,
        engine: Arc<dyn TransformEngine>,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            store,
            engine,
        }
    }

    /// Parse raw query parameters and process the resulting job.
    pub async fn handle_query(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<TransformResponse, ProxyError> {
        let job = JobDescriptor::from_query(params)?;
        self.process(&job).await
    }

    /// Serve a job, using the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The requested format is not supported (no fetch is attempted)
    /// - The source URL is invalid, unreachable or answers non-2xx
    /// - The source cannot be decoded or the output cannot be encoded
    pub async fn process(&self, job: &JobDescriptor) -> Result<TransformResponse, ProxyError> {
        let format = job.output_format()?;
        let key = job.cache_key();

        match self.store.get(&key).await {
            Ok(Some(data)) => {
                debug!(key = %key, size = data.len(), "Cache hit");
                return Ok(TransformResponse {
                    content_type: sniff_content_type(&data),
                    data,
                    cache_hit: true,
                });
            }
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => log_cache_error("read", &key, &e),
        }

        let source = self.fetcher.fetch(&job.source_url).await?;
        debug!(
            url = %job.source_url,
            size = source.len(),
            source_type = sniff_content_type(&source),
            "Fetched source image"
        );

        let data = self.transform(source, job, format).await?;

        if let Err(e) = self.store.set(&key, data.clone()).await {
            log_cache_error("write", &key, &e);
        }

        Ok(TransformResponse {
            content_type: sniff_content_type(&data),
            data,
            cache_hit: false,
        })
    }

    /// Run the engine on the blocking pool.
    async fn transform(
        &self,
        source: Bytes,
        job: &JobDescriptor,
        format: OutputFormat,
    ) -> Result<Bytes, ProxyError> {
        let engine = Arc::clone(&self.engine);
        let options = job.encode_options();
        let (width, height) = (job.width, job.height);

        let result = tokio::task::spawn_blocking(move || {
            engine.transform(&source, width, height, format, &options)
        })
        .await
        .map_err(|e| ProxyError::Internal(format!("transform task failed: {}", e)))?;

        Ok(result?)
    }

    /// Get cache statistics from the backing store.
    pub async fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.store.stats().await
    }

    /// Get a reference to the underlying cache store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Get a reference to the underlying fetcher.
    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }
}

fn log_cache_error(operation: &'static str, key: &str, err: &CacheError) {
    warn!(operation, key = %key, error = %err, "Cache {} failed, continuing without cache", operation);
}

// =============================================================================
// Tests
// =============================================================================
