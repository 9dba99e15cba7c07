use thiserror::Error;

/// Errors raised by a cache backend.
///
/// These never reach the client: read failures degrade to a cache miss and
/// write failures degrade to "served but not cached".
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Error reported by the storage backend (e.g. SQLite or MySQL)
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Errors that can occur when fetching the source image
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Source URL is empty, unparseable, or not http(s)
    #[error("Invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Network or connection error
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Upstream answered with a non-success status
    #[error("Upstream {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Response body is larger than the configured limit
    #[error("Source {url} exceeds the size limit of {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    /// Response body could not be read
    #[error("Failed to read body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Errors raised by a transformation engine
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source bytes could not be decoded
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Resize step failed
    #[error("Failed to resize image: {message}")]
    Resize { message: String },

    /// Requested output exceeds the pixel limit
    #[error("Requested output {width}x{height} exceeds the limit of {max_pixels} pixels")]
    OutputTooLarge {
        width: u32,
        height: u32,
        max_pixels: u64,
    },

    /// Output could not be encoded
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
}

/// Errors that can occur while serving an image request.
///
/// Every variant is converted into an HTTP status and a short plain-text
/// message at the server boundary.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// A query parameter could not be parsed (HTTP 400)
    #[error("Invalid {name} parameter: '{value}'")]
    InvalidParameter { name: &'static str, value: String },

    /// Requested output format is not in the supported set (HTTP 400)
    #[error("Unsupported format: '{format}'")]
    UnsupportedFormat { format: String },

    /// Fetching the source image failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Decoding, resizing or encoding failed (HTTP 500)
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Unexpected internal failure (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),
}
