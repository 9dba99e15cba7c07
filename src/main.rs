//! pixproxy - An on-demand image transformation proxy.
//!
//! This binary starts the HTTP server, the cache lifecycle tasks and wires
//! all components together.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixproxy::{
    cache::{human_bytes, CacheLifecycle, CacheStore, PersistentStore, VolatileStore},
    config::{CacheBackend, Config},
    error::CacheError,
    io::HttpFetcher,
    server::{create_router, RouterConfig},
    transform::TransformService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("pixproxy v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Cache backend: {}", config.cache);
    if config.cache == CacheBackend::Sql {
        info!("  Database: {} ({} connections)", config.db_type, config.db_conns);
    }
    info!("  Cache budget: {}", human_bytes(config.budget_bytes()));
    info!("  Fetch timeout: {}s", config.fetch_timeout_secs);
    info!("  Source limit: {}", human_bytes(config.max_source_bytes()));

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open cache store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpFetcher::with_timeout(config.fetch_timeout()) {
        Ok(fetcher) => fetcher.with_max_body_bytes(config.max_source_bytes()),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();

    let lifecycle = CacheLifecycle::new(Arc::clone(&store), config.budget_bytes())
        .with_enforce_interval(config.enforce_interval())
        .with_stats_interval(config.stats_interval());
    let background = lifecycle.spawn(shutdown.clone());

    let service = TransformService::new(fetcher, store);
    let router_config = RouterConfig::default()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);
    let router = create_router(service, router_config);

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            shutdown.cancel();
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!(
        "  Try: curl 'http://{}/img?u=<image url>&f=webp&w=200'",
        addr
    );

    let server_shutdown = shutdown.clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await;

    shutdown.cancel();
    for handle in background {
        let _ = handle.await;
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Construct the cache store selected by the configuration.
async fn open_store(config: &Config) -> Result<Arc<dyn CacheStore>, CacheError> {
    match config.cache {
        CacheBackend::Memory => Ok(Arc::new(VolatileStore::new())),
        CacheBackend::Sql => {
            let target = config.sql_target().map_err(CacheError::Backend)?;
            let store =
                PersistentStore::connect_waiting(&target, config.db_conns, config.db_wait).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pixproxy=debug,tower_http=debug"
    } else {
        "pixproxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
