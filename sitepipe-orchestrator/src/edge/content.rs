//! Content types and compression

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Bodies smaller than this are sent uncompressed
pub const MIN_COMPRESSIBLE_BYTES: usize = 1_000;
/// Bodies larger than this are sent uncompressed
pub const MAX_COMPRESSIBLE_BYTES: usize = 10_000_000;

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("xml", "text/xml; charset=utf-8"),
    ("txt", "text/plain; charset=utf-8"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("pdf", "application/pdf"),
    ("wasm", "application/wasm"),
];

/// Content type from the file extension of `path`
pub fn content_type(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let extension = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    CONTENT_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map_or("application/octet-stream", |(_, mime)| *mime)
}

/// Whether a response of this type and size gets gzip encoding
pub fn is_compressible(content_type: &str, len: usize) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    let eligible = matches!(
        mime,
        "text/html"
            | "text/css"
            | "text/plain"
            | "text/xml"
            | "application/javascript"
            | "application/json"
            | "image/svg+xml"
    );
    eligible && (MIN_COMPRESSIBLE_BYTES..=MAX_COMPRESSIBLE_BYTES).contains(&len)
}

pub fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}
