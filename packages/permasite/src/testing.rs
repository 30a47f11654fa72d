//! Testing utilities including mock implementations.
//!
//! These let applications exercise extraction and publishing without a
//! network: [`MockSite`] serves a fixed set of routes as both renderer and
//! fetcher, [`MockStorage`] records every upload and can inject failures.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

use crate::error::{FetchError, FetchResult, StorageError, StorageResult};
use crate::traits::renderer::{Fetched, Fetcher, Renderer};
use crate::publisher::{TAG_PASS, TAG_PATH};
use crate::traits::storage::{StorageClient, Tag};

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

/// A fake website keyed by URL path (`/about` and `/about/` are distinct).
///
/// Unknown paths answer 404.
pub struct MockSite {
    origin: Url,
    routes: Arc<RwLock<HashMap<String, MockResponse>>>,
    redirects: Arc<RwLock<HashMap<String, String>>>,
    unreachable: Arc<RwLock<Vec<String>>>,
    requests: Arc<RwLock<Vec<String>>>,
    closes: AtomicUsize,
}

impl MockSite {
    /// Create an empty site at `origin` (e.g. `https://example.com`).
    pub fn new(origin: &str) -> Self {
        Self {
            origin: Url::parse(origin).unwrap_or_else(|_| panic!("invalid mock origin {origin}")),
            routes: Arc::default(),
            redirects: Arc::default(),
            unreachable: Arc::default(),
            requests: Arc::default(),
            closes: AtomicUsize::new(0),
        }
    }

    /// Serve an HTML page.
    pub fn with_page(self, path: &str, html: &str) -> Self {
        self.with_response(path, 200, "text/html; charset=utf-8", html.to_string())
    }

    /// Serve a resource with an explicit content type.
    pub fn with_resource(self, path: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.with_response(path, 200, content_type, body)
    }

    /// Serve an arbitrary response.
    pub fn with_response(
        self,
        path: &str,
        status: u16,
        content_type: &str,
        body: impl Into<Bytes>,
    ) -> Self {
        self.routes.write().unwrap().insert(
            path.to_string(),
            MockResponse {
                status,
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
        self
    }

    /// Redirect `from` to `to` (a path or absolute URL).
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        self.redirects
            .write()
            .unwrap()
            .insert(from.to_string(), to.to_string());
        self
    }

    /// Make a path fail at the transport level.
    pub fn unreachable(self, path: &str) -> Self {
        self.unreachable.write().unwrap().push(path.to_string());
        self
    }

    /// Paths requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }

    /// How often a path was requested.
    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .read()
            .unwrap()
            .iter()
            .filter(|p| *p == path)
            .count()
    }

    /// How often the backend was closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &Url) -> FetchResult<Fetched> {
        self.requests.write().unwrap().push(url.path().to_string());

        if self.unreachable.read().unwrap().iter().any(|p| p == url.path()) {
            return Err(FetchError::Http(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("connection refused: {url}"),
            ))));
        }

        let mut final_url = url.clone();
        if let Some(target) = self.redirects.read().unwrap().get(url.path()) {
            final_url = url.join(target).map_err(|_| FetchError::InvalidUrl {
                url: target.clone(),
            })?;
        }

        let routes = self.routes.read().unwrap();
        let response = if final_url.host_str() == self.origin.host_str() {
            routes.get(final_url.path()).cloned()
        } else {
            None
        };
        let response = response.unwrap_or_else(|| MockResponse {
            status: 404,
            content_type: "text/html".to_string(),
            body: Bytes::from_static(b"<title>404 Not Found</title>"),
        });

        Ok(Fetched {
            url: final_url,
            status: response.status,
            content_type: Some(response.content_type),
            body: response.body,
        })
    }
}

#[async_trait]
impl Renderer for MockSite {
    async fn navigate(&self, url: &Url, _timeout: Duration) -> FetchResult<Fetched> {
        self.respond(url)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl Fetcher for MockSite {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> FetchResult<Fetched> {
        self.respond(url)
    }
}

/// Record of one `put` call made to [`MockStorage`].
#[derive(Debug, Clone)]
pub struct PutRecord {
    /// Value of the `Path` tag, if present
    pub path: Option<String>,
    /// Value of the `Publish-Pass` tag, if present
    pub pass: Option<String>,
    pub content_type: String,
    pub data: Bytes,
    /// Identifier returned, `None` when the put failed
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
struct FailRule {
    /// Puts that succeed before failures start
    skip: usize,
    /// Number of failing puts; `None` fails forever
    count: Option<usize>,
    retryable: bool,
    attempts: usize,
}

impl FailRule {
    fn next_fails(&mut self) -> bool {
        let n = self.attempts;
        self.attempts += 1;
        if n < self.skip {
            return false;
        }
        match self.count {
            Some(count) => n - self.skip < count,
            None => true,
        }
    }
}

/// Recording storage with sequential identifiers and failure injection.
///
/// Failure rules match the `Path` tag of an upload.
#[derive(Default)]
pub struct MockStorage {
    objects: Arc<RwLock<HashMap<String, (Bytes, String)>>>,
    puts: Arc<RwLock<Vec<PutRecord>>>,
    rules: Arc<RwLock<HashMap<String, FailRule>>>,
    counter: AtomicU64,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_rule(self, path: &str, rule: FailRule) -> Self {
        self.rules.write().unwrap().insert(path.to_string(), rule);
        self
    }

    /// Reject every upload of `path`.
    pub fn reject_path(self, path: &str) -> Self {
        self.with_rule(path, FailRule { skip: 0, count: None, retryable: false, attempts: 0 })
    }

    /// Rate-limit the first `times` uploads of `path`.
    pub fn flaky_path(self, path: &str, times: usize) -> Self {
        self.with_rule(path, FailRule { skip: 0, count: Some(times), retryable: true, attempts: 0 })
    }

    /// Accept the first `successes` uploads of `path`, then reject.
    pub fn reject_path_after(self, path: &str, successes: usize) -> Self {
        self.with_rule(path, FailRule { skip: successes, count: None, retryable: false, attempts: 0 })
    }

    /// Every put attempt, in order.
    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.read().unwrap().clone()
    }

    /// Paths of successful puts, in order.
    pub fn uploaded_paths(&self) -> Vec<String> {
        self.puts
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.id.is_some())
            .filter_map(|p| p.path.clone())
            .collect()
    }

    /// Bytes of the most recent successful upload of `path`.
    pub fn latest(&self, path: &str) -> Option<Bytes> {
        self.puts
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.id.is_some() && p.path.as_deref() == Some(path))
            .map(|p| p.data.clone())
    }

    /// Stored object by identifier.
    pub fn object(&self, id: &str) -> Option<(Bytes, String)> {
        self.objects.read().unwrap().get(id).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }
}

fn tag_value(tags: &[Tag], name: &str) -> Option<String> {
    tags.iter().find(|t| t.name == name).map(|t| t.value.clone())
}

#[async_trait]
impl StorageClient for MockStorage {
    async fn put(&self, data: Bytes, content_type: &str, tags: &[Tag]) -> StorageResult<String> {
        let path = tag_value(tags, TAG_PATH);
        let mut record = PutRecord {
            path: path.clone(),
            pass: tag_value(tags, TAG_PASS),
            content_type: content_type.to_string(),
            data: data.clone(),
            id: None,
        };

        let failure = path.as_ref().and_then(|p| {
            let mut rules = self.rules.write().unwrap();
            let rule = rules.get_mut(p)?;
            rule.next_fails().then_some(rule.retryable)
        });
        if let Some(retryable) = failure {
            self.puts.write().unwrap().push(record);
            return Err(if retryable {
                StorageError::RateLimited
            } else {
                StorageError::Rejected {
                    status: 400,
                    message: "rejected by mock".to_string(),
                }
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("mock-{n:04}");
        self.objects
            .write()
            .unwrap()
            .insert(id.clone(), (data, content_type.to_string()));
        record.id = Some(id.clone());
        self.puts.write().unwrap().push(record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .unwrap()
            .get(id)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_site_routes() {
        let site = MockSite::new("https://example.com")
            .with_page("/about", "<p>about</p>")
            .with_redirect("/old", "/about");
        let url = Url::parse("https://example.com/about").unwrap();
        let page = site.navigate(&url, Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.status, 200);

        let old = Url::parse("https://example.com/old").unwrap();
        let page = site.fetch(&old, Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.url.path(), "/about");

        let missing = Url::parse("https://example.com/about/").unwrap();
        let page = site.fetch(&missing, Duration::from_secs(1)).await.unwrap();
        assert_eq!(page.status, 404);
        assert_eq!(site.requests(), vec!["/about", "/old", "/about/"]);
    }

    #[tokio::test]
    async fn test_mock_storage_failure_rules() {
        let storage = MockStorage::new()
            .flaky_path("/a", 1)
            .reject_path_after("/b", 1);
        let tags = |p: &str| vec![Tag::new(TAG_PATH, p)];

        assert!(matches!(
            storage.put(Bytes::from("a"), "text/plain", &tags("/a")).await,
            Err(StorageError::RateLimited)
        ));
        assert!(storage.put(Bytes::from("a"), "text/plain", &tags("/a")).await.is_ok());
        assert!(storage.put(Bytes::from("b"), "text/plain", &tags("/b")).await.is_ok());
        assert!(storage.put(Bytes::from("b"), "text/plain", &tags("/b")).await.is_err());
        assert_eq!(storage.uploaded_paths(), vec!["/a", "/b"]);
        assert_eq!(storage.puts().len(), 4);
    }
}
