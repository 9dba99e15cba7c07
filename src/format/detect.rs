//! Content-type sniffing.
//!
//! Served bytes are labelled by what they actually contain rather than by
//! what was requested, so a cached entry always carries a truthful
//! `Content-Type`. Detection is based on magic bytes via
//! [`image::guess_format`].

/// MIME type returned when the bytes are not a recognised image.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect the MIME type of a byte buffer.
///
/// Returns [`OCTET_STREAM`] for empty or unrecognised input.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(format) => format.to_mime_type(),
        Err(_) => OCTET_STREAM,
    }
}
