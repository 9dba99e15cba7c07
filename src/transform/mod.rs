//! Transformation pipeline.
//!
//! This module turns an inbound request into transformed image bytes,
//! consulting the cache before doing any work.
//!
//! # Request lifecycle
//!
//! ```text
//! Received ─► Parsed ─► KeyDerived ─┬─► CacheHit ───────────────────────────────► Served
//!                                   └─► CacheMiss ─► Fetched ─► Transformed ─► Stored ─► Served
//!
//! Errored is reachable from every non-terminal state.
//! ```
//!
//! # Components
//!
//! - [`JobDescriptor`]: validated request parameters and cache key derivation
//! - [`TransformEngine`]: decode / resize / encode capability
//! - [`ImageEngine`]: engine backed by the `image` crate
//! - [`TransformService`]: orchestrates the full pipeline
//! - [`TransformResponse`]: bytes, sniffed content type and cache status

mod engine;
mod job;
mod service;

pub use engine::{
    check_resize_limits, clamp_quality, target_dimensions, EncodeOptions, ImageEngine,
    TransformEngine, DEFAULT_AVIF_QUALITY, DEFAULT_AVIF_SPEED, DEFAULT_GIF_SPEED,
    DEFAULT_JPEG_QUALITY, MAX_EFFORT, MAX_OUTPUT_PIXELS, MAX_RESAMPLE_PIXELS,
};
pub use job::JobDescriptor;
pub use service::{TransformResponse, TransformService};
