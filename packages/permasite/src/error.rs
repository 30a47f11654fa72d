//! Typed errors for the permasite library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Only hard failures travel
//! through these types; recoverable per-item failures are recorded in a
//! [`RunReport`](crate::types::report::RunReport) instead.

use thiserror::Error;

/// Errors from the render/fetch backend for a single document or asset.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Target answered with a non-success status
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection or render timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The render resource was shut down or could not be created
    #[error("render backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the content-addressed storage network client.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Network rejected the write (bad request, payload refused)
    #[error("storage rejected write ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network asked us to slow down
    #[error("storage rate limit exceeded")]
    RateLimited,

    /// Write or read timed out
    #[error("storage timeout")]
    Timeout,

    /// Transient server-side failure
    #[error("storage unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Transport-level failure
    #[error("storage transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Object does not exist
    #[error("object not found: {id}")]
    NotFound { id: String },

    /// Response could not be understood
    #[error("malformed storage response: {0}")]
    Malformed(String),
}

impl StorageError {
    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::RateLimited
                | StorageError::Timeout
                | StorageError::Unavailable { .. }
                | StorageError::Transport(_)
        )
    }
}

/// Errors from the intermediate blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Key does not exist
    #[error("blob not found: {key}")]
    NotFound { key: String },

    /// Key cannot be mapped onto the backing store
    #[error("invalid blob key: {key}")]
    InvalidKey { key: String },

    /// Filesystem failure
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot metadata could not be (de)serialized
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Hard failures of an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Seed URL could not be parsed
    #[error("invalid seed URL: {url}")]
    InvalidSeed { url: String },

    /// Render resource could not be acquired
    #[error("render backend unavailable: {0}")]
    RenderUnavailable(String),

    /// Operation was cancelled
    #[error("extraction cancelled")]
    Cancelled,
}

/// Hard failures of a publish run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Operation was cancelled; the partial map is discarded
    #[error("publish cancelled")]
    Cancelled,

    /// Manifest could not be built
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Manifest upload failed after retries
    #[error("manifest upload failed: {0}")]
    ManifestUpload(#[source] StorageError),

    /// Invalid publish configuration
    #[error("config error: {0}")]
    Config(String),
}

/// Errors from building a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No routes survived publishing
    #[error("no routes to publish: manifest would be empty")]
    Empty,

    /// JSON encoding failed
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for blob store operations.
pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// Result type alias for extraction runs.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

/// Result type alias for publish runs.
pub type PublishResult<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StorageError::RateLimited.is_retryable());
        assert!(StorageError::Timeout.is_retryable());
        assert!(StorageError::Unavailable {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!StorageError::Rejected {
            status: 400,
            message: "bad tags".into()
        }
        .is_retryable());
        assert!(!StorageError::NotFound { id: "x".into() }.is_retryable());
    }

    #[test]
    fn test_empty_manifest_message() {
        let err = PublishError::from(ManifestError::Empty);
        assert!(err.to_string().contains("no routes"));
    }
}
