//! Transformation engines.
//!
//! The pipeline only depends on the [`TransformEngine`] trait. The bundled
//! [`ImageEngine`] uses the `image` crate codecs.
//!
//! # Encoder notes
//!
//! - **JPEG**: quality 1-100 (default 80); `lossless` encodes at 100
//! - **PNG**: always lossless; effort selects the deflate level
//! - **GIF**: effort selects the quantiser speed
//! - **WebP**: the encoder is lossless-only, quality is ignored
//! - **AVIF**: quality 1-100 (default 80); effort 0-9 maps to speed 10-1
//!
//! Encoders never copy source metadata, so output is always stripped.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, Frame};

use crate::error::TransformError;
use crate::format::OutputFormat;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Default AVIF quality (1-100).
pub const DEFAULT_AVIF_QUALITY: u8 = 80;

/// Default AVIF encoder speed (1 = slowest, 10 = fastest).
pub const DEFAULT_AVIF_SPEED: u8 = 6;

/// Default GIF quantiser speed (1 = best, 30 = fastest).
pub const DEFAULT_GIF_SPEED: i32 = 10;

/// Highest meaningful effort value; larger values are treated as this.
pub const MAX_EFFORT: u8 = 9;

/// Largest output image, in pixels, a resize may produce.
pub const MAX_OUTPUT_PIXELS: u64 = 50_000_000;

/// Largest intermediate buffer, in pixels, a resize may allocate.
///
/// Resampling runs one axis at a time, so a buffer of one source axis by
/// one target axis exists between the two passes.
pub const MAX_RESAMPLE_PIXELS: u64 = 100_000_000;

/// Encoder options shared by all output formats.
///
/// Each encoder interprets the fields it supports and ignores the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Encoder quality, `None` for the encoder default
    pub quality: Option<u8>,

    /// Compression effort 0-9, `None` for the encoder default
    pub effort: Option<u8>,

    /// Request lossless output
    pub lossless: bool,

    /// Request metadata stripping
    pub strip_metadata: bool,
}

/// Capability interface for decode, resize and encode.
///
/// Implementations are CPU-bound and synchronous; the pipeline runs them on
/// the blocking thread pool.
pub trait TransformEngine: Send + Sync {
    /// Decode source bytes into pixels.
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, TransformError>;

    /// Resize to the target box. A zero axis is derived from the aspect ratio.
    fn resize(
        &self,
        image: DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, TransformError>;

    /// Encode pixels in the target format.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Bytes, TransformError>;

    /// Run the full decode → resize → encode chain.
    ///
    /// The resize step is skipped entirely when both axes are zero.
    fn transform(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Bytes, TransformError> {
        let mut image = self.decode(data)?;
        if width != 0 || height != 0 {
            image = self.resize(image, width, height)?;
        }
        self.encode(&image, format, options)
    }
}

/// Compute output dimensions for a resize request.
///
/// Both axes set gives an exact size. One axis set scales the other to
/// keep the aspect ratio, never below one pixel. Returns `None` for a zero
/// sized source.
pub fn target_dimensions(
    source: (u32, u32),
    width: u32,
    height: u32,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return None;
    }

    let scaled = |len: u32, num: u32, den: u32| -> u32 {
        let value = (len as f64 * num as f64 / den as f64).round();
        (value as u32).max(1)
    };

    match (width, height) {
        (0, 0) => Some(source),
        (w, 0) => Some((w, scaled(src_h, w, src_w))),
        (0, h) => Some((scaled(src_w, h, src_h), h)),
        (w, h) => Some((w, h)),
    }
}

/// Reject resizes whose output or intermediate buffers exceed the limits.
///
/// Allocation failure aborts the process, so oversized requests must be
/// refused before any pixel buffer is created.
pub fn check_resize_limits(source: (u32, u32), target: (u32, u32)) -> Result<(), TransformError> {
    let (src_w, src_h) = (u64::from(source.0), u64::from(source.1));
    let (dst_w, dst_h) = (u64::from(target.0), u64::from(target.1));

    let too_large = || TransformError::OutputTooLarge {
        width: target.0,
        height: target.1,
        max_pixels: MAX_OUTPUT_PIXELS,
    };

    let output = dst_w.checked_mul(dst_h).ok_or_else(too_large)?;
    if output > MAX_OUTPUT_PIXELS {
        return Err(too_large());
    }

    let intermediate = (src_w * dst_h).max(dst_w * src_h);
    if intermediate > MAX_RESAMPLE_PIXELS {
        return Err(too_large());
    }

    Ok(())
}

/// Engine backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageEngine {
    filter: FilterType,
}

impl ImageEngine {
    /// Create an engine using Lanczos3 resampling.
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    /// Use a different resampling filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn encode_jpeg(
        &self,
        image: &DynamicImage,
        options: &EncodeOptions,
        out: &mut Vec<u8>,
    ) -> image::ImageResult<()> {
        let quality = if options.lossless {
            100
        } else {
            clamp_quality(options.quality.unwrap_or(DEFAULT_JPEG_QUALITY))
        };

        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(out, quality))
    }

    fn encode_png(
        &self,
        image: &DynamicImage,
        options: &EncodeOptions,
        out: &mut Vec<u8>,
    ) -> image::ImageResult<()> {
        let compression = match options.effort {
            None => CompressionType::Default,
            Some(0..=3) => CompressionType::Fast,
            Some(4..=6) => CompressionType::Default,
            Some(_) => CompressionType::Best,
        };
        let encoder = PngEncoder::new_with_quality(out, compression, PngFilter::Adaptive);

        match image.color() {
            ColorType::L8
            | ColorType::La8
            | ColorType::Rgb8
            | ColorType::Rgba8
            | ColorType::L16
            | ColorType::La16
            | ColorType::Rgb16
            | ColorType::Rgba16 => image.write_with_encoder(encoder),
            _ => DynamicImage::ImageRgba16(image.to_rgba16()).write_with_encoder(encoder),
        }
    }

    fn encode_gif(
        &self,
        image: &DynamicImage,
        options: &EncodeOptions,
        out: &mut Vec<u8>,
    ) -> image::ImageResult<()> {
        let speed = match options.effort {
            Some(effort) => 30 - i32::from(effort.min(MAX_EFFORT)) * 3,
            None => DEFAULT_GIF_SPEED,
        };

        let mut encoder = GifEncoder::new_with_speed(out, speed);
        encoder.encode_frame(Frame::new(image.to_rgba8()))
    }

    fn encode_webp(&self, image: &DynamicImage, out: &mut Vec<u8>) -> image::ImageResult<()> {
        DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(WebPEncoder::new_lossless(out))
    }

    fn encode_avif(
        &self,
        image: &DynamicImage,
        options: &EncodeOptions,
        out: &mut Vec<u8>,
    ) -> image::ImageResult<()> {
        let quality = if options.lossless {
            100
        } else {
            clamp_quality(options.quality.unwrap_or(DEFAULT_AVIF_QUALITY))
        };
        let speed = match options.effort {
            Some(effort) => 10 - effort.min(MAX_EFFORT),
            None => DEFAULT_AVIF_SPEED,
        };

        let encoder = AvifEncoder::new_with_speed_quality(out, speed, quality);
        DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
    }
}

impl Default for ImageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformEngine for ImageEngine {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, TransformError> {
        image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode {
                message: e.to_string(),
            })?
            .decode()
            .map_err(|e| TransformError::Decode {
                message: e.to_string(),
            })
    }

    fn resize(
        &self,
        image: DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, TransformError> {
        let (target_w, target_h) = target_dimensions((image.width(), image.height()), width, height)
            .ok_or_else(|| TransformError::Resize {
                message: format!(
                    "source has zero size ({}x{})",
                    image.width(),
                    image.height()
                ),
            })?;

        if (target_w, target_h) == (image.width(), image.height()) {
            return Ok(image);
        }

        check_resize_limits((image.width(), image.height()), (target_w, target_h))?;

        Ok(image.resize_exact(target_w, target_h, self.filter))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        options: &EncodeOptions,
    ) -> Result<Bytes, TransformError> {
        let mut out = Vec::new();

        let result = match format {
            OutputFormat::Jpeg => self.encode_jpeg(image, options, &mut out),
            OutputFormat::Png => self.encode_png(image, options, &mut out),
            OutputFormat::Gif => self.encode_gif(image, options, &mut out),
            OutputFormat::WebP => self.encode_webp(image, &mut out),
            OutputFormat::Avif => self.encode_avif(image, options, &mut out),
        };

        result.map_err(|e| TransformError::Encode {
            format: format.name(),
            message: e.to_string(),
        })?;

        Ok(Bytes::from(out))
    }
}

/// Clamp quality to the 1-100 range every encoder accepts.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 100)
}
