//! Output formats and content-type detection.
//!
//! - [`OutputFormat`]: the fixed set of encodings the proxy can produce
//! - [`sniff_content_type`]: MIME type of a byte buffer, used for the
//!   `Content-Type` of every served image

pub mod detect;

pub use detect::{sniff_content_type, OCTET_STREAM};

/// An encoding the proxy can produce.
///
/// Requested formats are matched case-sensitively against [`OutputFormat::from_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Avif,
}

impl OutputFormat {
    /// Every supported format, in canonical-name order.
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Gif,
        OutputFormat::WebP,
        OutputFormat::Avif,
    ];

    /// Resolve a requested format name.
    ///
    /// `jpg` and `jpeg` are aliases. Matching is case-sensitive, so `PNG`
    /// is not recognised.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "gif" => Some(OutputFormat::Gif),
            "webp" => Some(OutputFormat::WebP),
            "avif" => Some(OutputFormat::Avif),
            _ => None,
        }
    }

    /// Canonical name, used in cache keys so that aliases share entries.
    pub const fn name(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// MIME type of this encoding.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
