//! Render and fetch backends.
//!
//! Pages go through a [`Renderer`] (script-capable in production), assets
//! through a plain [`Fetcher`]. Both report the status they saw; deciding
//! what a non-success status means is left to the caller.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

use crate::error::FetchResult;

/// A response body with the metadata the pipeline needs.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Declared `Content-Type`, if any
    pub content_type: Option<String>,

    pub body: Bytes,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text (lossy for invalid UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Navigates to a page and returns the rendered document.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render one page within `timeout`.
    async fn navigate(&self, url: &Url, timeout: Duration) -> FetchResult<Fetched>;

    /// Release backend resources. Called once, when the owning handle shuts down.
    async fn close(&self) {}

    /// Backend name for logs.
    fn name(&self) -> &str {
        "renderer"
    }
}

/// Fetches raw resource bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one resource within `timeout`.
    async fn fetch(&self, url: &Url, timeout: Duration) -> FetchResult<Fetched>;
}
