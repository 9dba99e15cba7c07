//! Test utilities for integration tests.
//!
//! This module provides a mock source fetcher with request tracking, a
//! counting engine wrapper, image fixtures and router helpers.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::RwLock;
use tower::ServiceExt;

use pixproxy::error::{FetchError, TransformError};
use pixproxy::format::OutputFormat;
use pixproxy::io::SourceFetcher;
use pixproxy::transform::{EncodeOptions, ImageEngine, TransformEngine};

// =============================================================================
// Mock Fetcher with Request Tracking
// =============================================================================

/// A mock fetcher serving images from memory.
///
/// Unknown URLs answer with an upstream 404. Clones share their tracking
/// state, so a clone can be handed to the service while the test keeps one
/// for assertions.
#[derive(Clone, Default)]
pub struct MockFetcher {
    sources: Arc<HashMap<String, Bytes>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image served at `url`.
    pub fn with_source(mut self, url: impl Into<String>, data: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.sources).insert(url.into(), Bytes::from(data));
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(url.to_string());

        self.sources
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

// =============================================================================
// Counting Engine
// =============================================================================

/// Wraps [`ImageEngine`] and counts how often each stage runs.
#[derive(Default)]
pub struct CountingEngine {
    inner: ImageEngine,
    decodes: AtomicUsize,
    resizes: AtomicUsize,
    encodes: AtomicUsize,
}

impl CountingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    pub fn resizes(&self) -> usize {
        self.resizes.load(Ordering::SeqCst)
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

impl TransformEngine for CountingEngine {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, TransformError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(data)
    }

    fn resize(
        &self,
        image: DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, TransformError> {
        self.resizes.fetch_add(1, Ordering::SeqCst);
        self.inner.resize(image, width, height)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Bytes, TransformError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(image, format, options)
    }
}

// =============================================================================
// Image Fixtures
// =============================================================================

/// Create a gradient image encoded as `format`.
pub fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
            255,
        ])
    });

    let mut buf = Vec::new();
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("failed to encode fixture");
    buf
}

/// Create a gradient PNG.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    create_test_image(width, height, ImageFormat::Png)
}

/// Decode an image and return its dimensions.
pub fn image_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).expect("response is not a decodable image");
    (img.width(), img.height())
}

// =============================================================================
// Router Helpers
// =============================================================================

/// Send a GET request through the router.
pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(router, "GET", uri).await
}

/// Send a request with the given method through the router.
pub async fn send(router: &Router, method: &str, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    router.clone().oneshot(request).await.unwrap()
}

/// Collect a response body.
pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Read a header as a string, panicking if it is missing.
pub fn header<'a>(response: &'a Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}
