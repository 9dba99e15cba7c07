//! Cache integration tests.
//!
//! Tests verify:
//! - SQLite-backed caching through the HTTP surface, including restarts
//!   and concurrent requests on a pooled store
//! - Byte budget enforcement by the lifecycle manager
//! - Eviction order for both backends
//! - Fail-open behaviour when the cache backend is broken

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use pixproxy::cache::{
    CacheLifecycle, CacheStats, CacheStore, EnforceOutcome, PersistentStore, VolatileStore,
};
use pixproxy::error::CacheError;
use pixproxy::transform::TransformService;
use pixproxy::{create_router, RouterConfig};

use super::test_utils::{body_bytes, create_test_png, get, header, MockFetcher};

const SOURCE_URL: &str = "http://x/img.png";

fn router_with_store(fetcher: MockFetcher, store: Arc<dyn CacheStore>) -> axum::Router {
    let service = TransformService::new(fetcher, store);
    create_router(service, RouterConfig::default().with_tracing(false))
}

// =============================================================================
// SQLite Backend
// =============================================================================

#[tokio::test]
async fn test_sqlite_backend_serves_cache_hits() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PersistentStore::open(dir.path().join("cache.db")).await.unwrap());
    let fetcher = MockFetcher::new().with_source(SOURCE_URL, create_test_png(64, 32));
    let router = router_with_store(fetcher.clone(), store.clone());

    let uri = "/img?u=http://x/img.png&f=png&w=32";

    let first = get(&router, uri).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "x-cache-hit"), "false");
    let first_body = body_bytes(first).await;

    let second = get(&router, uri).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "x-cache-hit"), "true");
    assert_eq!(header(&second, "content-type"), "image/png");
    assert_eq!(body_bytes(second).await, first_body);

    assert_eq!(fetcher.request_count(), 1);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_bytes, first_body.len() as u64);
}

#[tokio::test]
async fn test_sqlite_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let uri = "/img?u=http://x/img.png&f=webp&w=16";

    {
        let store = Arc::new(PersistentStore::open(&path).await.unwrap());
        let fetcher = MockFetcher::new().with_source(SOURCE_URL, create_test_png(64, 32));
        let router = router_with_store(fetcher, store);

        let response = get(&router, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // A fresh process: new store on the same file, fetcher without sources
    let store = Arc::new(PersistentStore::open(&path).await.unwrap());
    let fetcher = MockFetcher::new();
    let router = router_with_store(fetcher.clone(), store);

    let response = get(&router, uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache-hit"), "true");
    assert_eq!(header(&response, "content-type"), "image/webp");
    assert_eq!(fetcher.request_count(), 0);
}

#[tokio::test]
async fn test_sqlite_evicts_in_insertion_order() {
    let store = PersistentStore::open_in_memory().await.unwrap();

    store.set("a", Bytes::from_static(b"1")).await.unwrap();
    store.set("b", Bytes::from_static(b"22")).await.unwrap();
    store.set("c", Bytes::from_static(b"333")).await.unwrap();

    // Reads do not affect order
    store.get("a").await.unwrap();

    assert_eq!(store.delete_oldest().await.unwrap(), Some(1));
    assert_eq!(store.get("a").await.unwrap(), None);

    // Overwriting moves an entry to the back
    store.set("b", Bytes::from_static(b"4444")).await.unwrap();
    assert_eq!(store.delete_oldest().await.unwrap(), Some(3));
    assert_eq!(store.get("c").await.unwrap(), None);
    assert_eq!(
        store.get("b").await.unwrap(),
        Some(Bytes::from_static(b"4444"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_pool_serves_concurrent_requests() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        PersistentStore::open_sqlite(dir.path().join("cache.db"), 4)
            .await
            .unwrap(),
    );
    let fetcher = MockFetcher::new().with_source(SOURCE_URL, create_test_png(64, 64));
    let router = router_with_store(fetcher, store.clone());

    // Warm one entry so readers hit while the others are written
    let warm = "/img?u=http://x/img.png&f=png&w=8";
    assert_eq!(get(&router, warm).await.status(), StatusCode::OK);

    let mut tasks = Vec::new();
    for w in 9..25 {
        let writer = router.clone();
        tasks.push(tokio::spawn(async move {
            let uri = format!("/img?u=http://x/img.png&f=png&w={}", w);
            get(&writer, &uri).await.status()
        }));

        let reader = router.clone();
        tasks.push(tokio::spawn(async move {
            let response = get(&reader, warm).await;
            assert_eq!(header(&response, "x-cache-hit"), "true");
            response.status()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(store.stats().await.unwrap().count, 17);
    assert_eq!(store.name(), "sqlite");
}

// =============================================================================
// Lifecycle Manager
// =============================================================================

#[tokio::test]
async fn test_enforce_evicts_one_entry_per_tick() {
    let store = Arc::new(VolatileStore::new());
    for key in ["a", "b", "c", "d"] {
        store.set(key, Bytes::from(vec![0u8; 100])).await.unwrap();
    }

    let lifecycle = CacheLifecycle::new(store.clone(), 150);

    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::Evicted(100));
    assert_eq!(store.stats().await.unwrap().total_bytes, 300);

    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::Evicted(100));
    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::Evicted(100));
    assert_eq!(store.stats().await.unwrap().total_bytes, 100);

    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::WithinBudget);
    assert_eq!(store.stats().await.unwrap().count, 1);
}

#[tokio::test]
async fn test_enforce_respects_recent_use() {
    let store = Arc::new(VolatileStore::new());
    for key in ["a", "b", "c"] {
        store.set(key, Bytes::from(vec![0u8; 10])).await.unwrap();
    }

    // Touch the oldest so "b" becomes the eviction candidate
    store.get("a").await.unwrap();

    let lifecycle = CacheLifecycle::new(store.clone(), 25);
    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::Evicted(10));

    assert!(store.contains("a").await);
    assert!(!store.contains("b").await);
    assert!(store.contains("c").await);
}

#[tokio::test]
async fn test_spawned_lifecycle_trims_to_budget() {
    let store = Arc::new(PersistentStore::open_in_memory().await.unwrap());
    for i in 0..5 {
        store
            .set(&format!("key-{}", i), Bytes::from(vec![0u8; 1000]))
            .await
            .unwrap();
    }

    let shutdown = CancellationToken::new();
    let handles = CacheLifecycle::new(store.clone(), 2500)
        .with_enforce_interval(Duration::from_millis(5))
        .with_stats_interval(Duration::ZERO)
        .spawn(shutdown.clone());

    let mut stats = CacheStats::default();
    for _ in 0..200 {
        stats = store.stats().await.unwrap();
        if stats.total_bytes < 2500 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(stats.count, 2);
    assert_eq!(stats.total_bytes, 2000);
    assert_eq!(store.get("key-0").await.unwrap(), None);
    assert!(store.get("key-4").await.unwrap().is_some());
}

#[tokio::test]
async fn test_lifecycle_with_router_traffic() {
    let store = Arc::new(VolatileStore::new());
    let fetcher = MockFetcher::new().with_source(SOURCE_URL, create_test_png(64, 64));
    let router = router_with_store(fetcher, store.clone());

    for w in [8, 16, 24] {
        let uri = format!("/img?u=http://x/img.png&f=png&w={}", w);
        assert_eq!(get(&router, &uri).await.status(), StatusCode::OK);
    }

    let before = store.stats().await.unwrap();
    assert_eq!(before.count, 3);

    // Budget of one byte: every tick removes exactly one entry
    let lifecycle = CacheLifecycle::new(store.clone(), 1);
    assert!(matches!(
        lifecycle.enforce_once().await,
        EnforceOutcome::Evicted(_)
    ));
    assert_eq!(store.stats().await.unwrap().count, 2);

    // The least recently used rendition went first
    let keys = store.keys_by_age().await;
    assert_eq!(keys.len(), 2);
    assert!(keys[0].contains("-16-"));
    assert!(keys[1].contains("-24-"));
}

// =============================================================================
// Fail-open
// =============================================================================

/// A store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Backend("database is locked".into()))
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<(), CacheError> {
        Err(CacheError::Backend("disk full".into()))
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Err(CacheError::Backend("database is locked".into()))
    }

    async fn delete_oldest(&self) -> Result<Option<u64>, CacheError> {
        Err(CacheError::Backend("database is locked".into()))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn test_broken_cache_still_serves() {
    let fetcher = MockFetcher::new().with_source(SOURCE_URL, create_test_png(32, 32));
    let router = router_with_store(fetcher.clone(), Arc::new(BrokenStore));

    let uri = "/img?u=http://x/img.png&f=jpg&w=16";

    for _ in 0..2 {
        let response = get(&router, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-cache-hit"), "false");
        assert_eq!(header(&response, "content-type"), "image/jpeg");
    }

    // Every request is a miss
    assert_eq!(fetcher.request_count(), 2);
}

#[tokio::test]
async fn test_lifecycle_survives_broken_store() {
    let lifecycle = CacheLifecycle::new(Arc::new(BrokenStore), 100);
    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::Failed);
    assert_eq!(lifecycle.enforce_once().await, EnforceOutcome::Failed);
}
