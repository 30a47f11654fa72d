//! MIME type helpers.
//!
//! Declared types from responses win; extension-based inference
//! (`mime_guess`) fills the gaps.

/// MIME type for HTML documents.
pub const HTML: &str = "text/html; charset=utf-8";

/// MIME type for a path-manifest upload.
pub const MANIFEST: &str = "application/x.arweave-manifest+json";

/// Fallback for unknown content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess a MIME type from a path's extension.
pub fn from_path(path: &str) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
}

/// `text/css; charset=utf-8` -> `text/css`
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Whether a declared type carries no information.
pub fn is_generic(mime_type: &str) -> bool {
    matches!(
        essence(mime_type).as_str(),
        "" | "application/octet-stream" | "binary/octet-stream" | "application/unknown"
    )
}

/// Whether the type denotes an HTML document.
pub fn is_html(mime_type: &str) -> bool {
    matches!(
        essence(mime_type).as_str(),
        "text/html" | "application/xhtml+xml"
    )
}
