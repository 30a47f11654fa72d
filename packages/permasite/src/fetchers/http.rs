//! Plain HTTP backend.
//!
//! Serves both as the page renderer (server-rendered HTML, no script
//! execution) and as the asset fetcher. Script-capable renderers plug in
//! behind the same [`Renderer`] trait.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::renderer::{Fetched, Fetcher, Renderer};

/// HTTP backend built on `reqwest`.
///
/// # Example
///
/// ```rust,ignore
/// use permasite::{HttpRenderer, RenderHandle};
///
/// let backend = HttpRenderer::new()?;
/// let handle = RenderHandle::ready(Arc::new(backend), 4);
/// ```
pub struct HttpRenderer {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpRenderer {
    pub fn new() -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;
        Ok(Self {
            client,
            user_agent: concat!("permasite/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn get(&self, url: &Url, timeout: Duration) -> FetchResult<Fetched> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                request_error(url, e)
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| request_error(url, e))?;

        Ok(Fetched {
            url: final_url,
            status,
            content_type,
            body,
        })
    }
}

fn request_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http(Box::new(e))
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn navigate(&self, url: &Url, timeout: Duration) -> FetchResult<Fetched> {
        self.get(url, timeout).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl Fetcher for HttpRenderer {
    async fn fetch(&self, url: &Url, timeout: Duration) -> FetchResult<Fetched> {
        self.get(url, timeout).await
    }
}
