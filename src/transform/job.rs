//! Job descriptors and cache keys.
//!
//! A [`JobDescriptor`] is derived once per request from the raw query
//! parameters and never changes afterwards.
//!
//! # Query Parameters
//!
//! | param | field | default |
//! |---|---|---|
//! | `u` | `source_url` | none (verbatim) |
//! | `f` | `format` | none (verbatim) |
//! | `w`, `h` | `width`, `height` | `0` (axis unspecified) |
//! | `q` | `quality` | unset (`0` or negative also means unset) |
//! | `c` | `effort` | unset (negative also means unset) |
//!
//! Quality and effort are kept as sent; range clamping happens when the
//! encoder options are built, so `q=300` and `q=100` are distinct cache
//! entries that encode identically.
//! | `l` | `lossless` | `false`, `"1"` enables |
//! | `s` | `strip_metadata` | `false`, `"1"` enables |

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ProxyError;
use crate::format::OutputFormat;

use super::engine::{clamp_quality, EncodeOptions, MAX_EFFORT};

/// Validated description of one transformation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDescriptor {
    /// URL of the original image
    pub source_url: String,

    /// Requested output format name, as sent by the client
    pub format: String,

    /// Target width in pixels (0 = unspecified)
    pub width: u32,

    /// Target height in pixels (0 = unspecified)
    pub height: u32,

    /// Encoder quality as sent, `None` for the encoder default
    pub quality: Option<i32>,

    /// Compression effort as sent, `None` for the encoder default
    pub effort: Option<i32>,

    /// Request lossless output where the encoder supports it
    pub lossless: bool,

    /// Request metadata stripping
    pub strip_metadata: bool,
}

impl JobDescriptor {
    /// Build a descriptor from raw query parameters.
    ///
    /// Empty or absent numeric parameters take their default. Non-empty
    /// values that fail to parse are rejected with
    /// [`ProxyError::InvalidParameter`]. Width and height are unsigned, so
    /// negative values are rejected as well.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ProxyError> {
        let width = parse_number::<u32>(params, "w", "width")?.unwrap_or(0);
        let height = parse_number::<u32>(params, "h", "height")?.unwrap_or(0);
        let quality = parse_number::<i32>(params, "q", "quality")?.filter(|q| *q > 0);
        let effort = parse_number::<i32>(params, "c", "compression")?.filter(|c| *c >= 0);

        Ok(Self {
            source_url: param(params, "u").to_string(),
            format: param(params, "f").to_string(),
            width,
            height,
            quality,
            effort,
            lossless: param(params, "l") == "1",
            strip_metadata: param(params, "s") == "1",
        })
    }

    /// Resolve the requested format against the supported set.
    pub fn output_format(&self) -> Result<OutputFormat, ProxyError> {
        OutputFormat::from_name(&self.format).ok_or_else(|| ProxyError::UnsupportedFormat {
            format: self.format.clone(),
        })
    }

    /// Whether a resize step is needed at all.
    pub fn needs_resize(&self) -> bool {
        self.width != 0 || self.height != 0
    }

    /// Encoder options carried by this job.
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            quality: self
                .quality
                .map(|q| clamp_quality(q.clamp(0, i32::from(u8::MAX)) as u8)),
            effort: self
                .effort
                .map(|c| c.clamp(0, i32::from(MAX_EFFORT)) as u8),
            lossless: self.lossless,
            strip_metadata: self.strip_metadata,
        }
    }

    /// Deterministic cache key covering every field that affects output.
    ///
    /// Layout: `{url}-{w}-{h}-{format}-q{q}-c{c}-l{0|1}-s{0|1}`, with `_`
    /// for unset optionals. Format aliases map to their canonical name so
    /// `jpg` and `jpeg` share an entry. The URL is the only free-form
    /// segment and comes first, so keys stay unambiguous.
    pub fn cache_key(&self) -> String {
        let format = OutputFormat::from_name(&self.format)
            .map(|f| f.name())
            .unwrap_or(self.format.as_str());

        format!(
            "{}-{}-{}-{}-q{}-c{}-l{}-s{}",
            self.source_url,
            self.width,
            self.height,
            format,
            opt_segment(self.quality),
            opt_segment(self.effort),
            u8::from(self.lossless),
            u8::from(self.strip_metadata),
        )
    }
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or("")
}

fn parse_number<T: FromStr>(
    params: &HashMap<String, String>,
    name: &'static str,
    label: &'static str,
) -> Result<Option<T>, ProxyError> {
    let raw = param(params, name);
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ProxyError::InvalidParameter {
            name: label,
            value: raw.to_string(),
        })
}

fn opt_segment(value: Option<i32>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "_".to_string(),
    }
}
