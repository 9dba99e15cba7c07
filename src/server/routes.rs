//! Router configuration for the image proxy.
//!
//! This module defines the HTTP routes and applies middleware for CORS and
//! request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health   - Health check
//! /img      - Image transform endpoint (GET, OPTIONS)
//! ```
//!
//! Every response, including errors, carries:
//!
//! ```text
//! Access-Control-Allow-Origin: *
//! Access-Control-Allow-Methods: POST, GET, OPTIONS, PUT, DELETE
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pixproxy::server::{create_router, RouterConfig};
//! use pixproxy::transform::TransformService;
//!
//! let service = TransformService::new(fetcher, store);
//! let router = create_router(service, RouterConfig::default().with_cache_max_age(600));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{routing::get, Router};
use http::header::{ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN};
use http::HeaderValue;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, image_handler, preflight_handler, AppState};
use crate::io::SourceFetcher;
use crate::transform::TransformService;

/// Methods advertised in `Access-Control-Allow-Methods`.
pub const CORS_ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE";

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    /// By default:
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    fn default() -> Self {
        Self {
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `transform_service` - The service handling image requests
/// * `config` - Router configuration
pub fn create_router<F>(transform_service: TransformService<F>, config: RouterConfig) -> Router
where
    F: SourceFetcher + 'static,
{
    let app_state = AppState::with_cache_max_age(transform_service, config.cache_max_age);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/img", get(image_handler::<F>).options(preflight_handler))
        .with_state(app_state)
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

// =============================================================================
// Tests
// =============================================================================
