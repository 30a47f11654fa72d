//! HTTP upload client.
//!
//! Writes go to `POST {endpoint}` with the raw body, the content type as
//! `Content-Type` and one `tag=Name:Value` query pair per tag. The service
//! answers `{"id": "..."}`. Reads go to `GET {gateway}/{id}`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{StorageError, StorageResult};
use crate::security::UploadCredentials;
use crate::traits::storage::{StorageClient, Tag};
use crate::types::config::DEFAULT_GATEWAY;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// Storage client speaking to an upload service over HTTP.
pub struct HttpStorageClient {
    client: reqwest::Client,
    credentials: UploadCredentials,
    gateway: String,
}

impl HttpStorageClient {
    pub fn new(credentials: UploadCredentials) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("permasite/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::Transport(Box::new(e)))?;
        Ok(Self {
            client,
            credentials,
            gateway: DEFAULT_GATEWAY.to_string(),
        })
    }

    /// Read objects through a different gateway.
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into().trim_end_matches('/').to_string();
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.bearer() {
            Some(wallet) => request.bearer_auth(wallet),
            None => request,
        }
    }
}

/// Map a non-success status onto the storage error taxonomy.
fn status_error(status: u16, message: String) -> StorageError {
    match status {
        429 => StorageError::RateLimited,
        408 | 504 => StorageError::Timeout,
        500..=599 => StorageError::Unavailable { status, message },
        _ => StorageError::Rejected { status, message },
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Timeout
    } else {
        StorageError::Transport(Box::new(e))
    }
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn put(&self, data: Bytes, content_type: &str, tags: &[Tag]) -> StorageResult<String> {
        let query: Vec<(&str, String)> = tags
            .iter()
            .map(|t| ("tag", format!("{}:{}", t.name, t.value)))
            .collect();

        let resp = self
            .authorize(self.client.post(&self.credentials.endpoint))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .query(&query)
            .body(data)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let parsed: UploadResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))?;
        if parsed.id.trim().is_empty() {
            return Err(StorageError::Malformed("empty object id".to_string()));
        }
        Ok(parsed.id)
    }

    async fn get(&self, id: &str) -> StorageResult<Bytes> {
        let url = format!("{}/{}", self.gateway, id);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound { id: id.to_string() });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }
        resp.bytes().await.map_err(transport_error)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(429, String::new()), StorageError::RateLimited));
        assert!(matches!(status_error(504, String::new()), StorageError::Timeout));
        assert!(matches!(
            status_error(503, "down".into()),
            StorageError::Unavailable { status: 503, .. }
        ));
        assert!(matches!(
            status_error(413, "too big".into()),
            StorageError::Rejected { status: 413, .. }
        ));
        assert!(status_error(502, String::new()).is_retryable());
        assert!(!status_error(400, String::new()).is_retryable());
    }

    #[test]
    fn test_gateway_trailing_slash() {
        let client = HttpStorageClient::new(UploadCredentials::new("http://localhost:1984/tx"))
            .unwrap()
            .with_gateway("https://gw.example/");
        assert_eq!(client.gateway, "https://gw.example");
    }
}
