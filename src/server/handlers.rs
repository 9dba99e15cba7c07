//! HTTP request handlers for the image proxy.
//!
//! # Endpoints
//!
//! - `GET /img` - Transform (or serve from cache) an image
//! - `GET /health` - Health check endpoint

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{FetchError, ProxyError, TransformError};
use crate::io::SourceFetcher;
use crate::transform::TransformService;

/// Header reporting whether the response came from cache.
pub const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-cache-hit");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the transform service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<F: SourceFetcher> {
    /// The transform service for processing image requests
    pub transform_service: Arc<TransformService<F>>,

    /// Cache-Control max-age in seconds for successful responses
    pub cache_max_age: u32,
}

impl<F: SourceFetcher> AppState<F> {
    /// Create a new application state with the default max-age (1 hour).
    pub fn new(transform_service: TransformService<F>) -> Self {
        Self::with_cache_max_age(transform_service, 3600)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(transform_service: TransformService<F>, cache_max_age: u32) -> Self {
        Self {
            transform_service: Arc::new(transform_service),
            cache_max_age,
        }
    }
}

impl<F: SourceFetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            transform_service: Arc::clone(&self.transform_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl ProxyError {
    /// HTTP status and short error type for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ProxyError::InvalidParameter { .. } => (StatusCode::BAD_REQUEST, "invalid_parameter"),
            ProxyError::UnsupportedFormat { .. } => (StatusCode::BAD_REQUEST, "unsupported_format"),
            ProxyError::Fetch(FetchError::InvalidUrl { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_url")
            }
            ProxyError::Fetch(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ProxyError::Transform(TransformError::OutputTooLarge { .. }) => {
                (StatusCode::BAD_REQUEST, "output_too_large")
            }
            ProxyError::Transform(_) => (StatusCode::INTERNAL_SERVER_ERROR, "transform_error"),
            ProxyError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Convert ProxyError to a plain-text HTTP response.
///
/// Errors are logged by severity:
/// - 4xx errors at WARN level (client errors)
/// - 5xx errors at ERROR level (server errors), with the full cause
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        (status, message).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image requests.
///
/// # Endpoint
///
/// `GET /img`
///
/// # Query Parameters
///
/// - `u`: Source image URL (required)
/// - `f`: Output format: `jpg`, `jpeg`, `png`, `gif`, `webp`, `avif` (required)
/// - `w`, `h`: Target width/height, 0 or empty for no resize on that axis
/// - `q`: Quality, 0, negative or empty for the encoder default
/// - `c`: Compression effort 0-9
/// - `l`: `1` for lossless output
/// - `s`: `1` to strip metadata
///
/// # Response
///
/// - `200 OK`: Transformed image with sniffed `Content-Type`
/// - `400 Bad Request`: Malformed parameter, invalid URL, unsupported format
///   or an output size over the pixel limit
/// - `502 Bad Gateway`: Source unreachable, answered non-2xx or exceeded
///   the source size limit
/// - `500 Internal Server Error`: Decode or encode failure
///
/// # Headers
///
/// - `Content-Type`: sniffed from the served bytes
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache-Hit: true|false`
pub async fn image_handler<F: SourceFetcher + 'static>(
    State(state): State<AppState<F>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ProxyError> {
    let response = state.transform_service.handle_query(&params).await?;

    debug!(
        cache_hit = response.cache_hit,
        size = response.data.len(),
        content_type = response.content_type,
        "Serving image"
    );

    let headers = [
        (header::CONTENT_TYPE, response.content_type.to_string()),
        (
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.cache_max_age),
        ),
        (CACHE_HIT_HEADER, response.cache_hit.to_string()),
    ];

    Ok((StatusCode::OK, headers, Body::from(response.data)).into_response())
}

/// Answer CORS preflight requests for `/img`.
///
/// The CORS headers themselves are added to every response by the router.
pub async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
