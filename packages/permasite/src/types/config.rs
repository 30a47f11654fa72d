//! Configuration types for extraction, publishing and storage addressing.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default gateway used to address stored objects.
pub const DEFAULT_GATEWAY: &str = "https://arweave.net";

/// Settings for an extraction (crawl) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSettings {
    /// Maximum number of pages to visit.
    ///
    /// Default: 100.
    pub max_pages: usize,

    /// Maximum number of new links enqueued from a single page.
    ///
    /// Keeps link-dense pages from exploding the queue. Default: 50.
    pub max_links_per_page: usize,

    /// Pause between requests of one worker. Default: 500ms.
    #[serde(with = "duration_ms")]
    pub per_request_delay: Duration,

    /// Timeout for a single render or fetch. Default: 30s.
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Only follow and keep references on the seed's site. Default: true.
    pub same_domain_only: bool,

    /// Concurrent asset fetch workers. Default: 4.
    pub workers: usize,

    /// Probe conventional documentation paths from the seed page.
    ///
    /// Helps on sites whose navigation is script-driven. Default: true.
    pub probe_common_paths: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_links_per_page: 50,
            per_request_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            same_domain_only: true,
            workers: 4,
            probe_common_paths: true,
        }
    }
}

impl ExtractSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page limit.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the per-page link cap.
    pub fn with_max_links_per_page(mut self, max_links: usize) -> Self {
        self.max_links_per_page = max_links;
        self
    }

    /// Set the politeness delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.per_request_delay = delay;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Allow or forbid references to other hosts.
    pub fn with_same_domain_only(mut self, same_domain_only: bool) -> Self {
        self.same_domain_only = same_domain_only;
        self
    }

    /// Set the number of asset fetch workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Enable or disable documentation path probing.
    pub fn with_probing(mut self, probe: bool) -> Self {
        self.probe_common_paths = probe;
        self
    }
}

/// Settings for a publish run.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Concurrent uploads within one pass. Default: 8.
    pub concurrency: usize,

    /// Retries after the first failed attempt of a retryable upload. Default: 3.
    pub max_retries: u32,

    /// Backoff before the first retry; doubles each attempt. Default: 500ms.
    pub retry_base_delay: Duration,

    /// Page upload rounds, including the provisional one. Minimum 2.
    pub page_rounds: u32,

    /// Optional client-side cap on uploads per second.
    pub uploads_per_second: Option<u32>,

    /// Value of the `App-Name` tag attached to every upload.
    pub app_name: String,

    /// How rewritten references address stored objects.
    pub addressing: StorageAddressing,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            page_rounds: 2,
            uploads_per_second: None,
            app_name: "permasite".to_string(),
            addressing: StorageAddressing::default(),
        }
    }
}

impl PublishConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set upload concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set retry policy.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Set the number of page rounds (clamped to at least 2).
    pub fn with_page_rounds(mut self, rounds: u32) -> Self {
        self.page_rounds = rounds.max(2);
        self
    }

    /// Cap uploads per second.
    pub fn with_uploads_per_second(mut self, rate: u32) -> Self {
        self.uploads_per_second = Some(rate).filter(|r| *r > 0);
        self
    }

    /// Set storage addressing.
    pub fn with_addressing(mut self, addressing: StorageAddressing) -> Self {
        self.addressing = addressing;
        self
    }
}

/// How references to stored objects are written and recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAddressing {
    /// Gateway base used when writing rewritten references
    pub gateway: String,

    /// Hosts whose URLs already point at the storage network
    pub gateway_hosts: Vec<String>,

    /// URI schemes that address the storage network directly (`ar://`)
    pub schemes: Vec<String>,
}

impl Default for StorageAddressing {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_GATEWAY.to_string(),
            gateway_hosts: vec!["arweave.net".to_string(), "ar-io.net".to_string()],
            schemes: vec!["ar".to_string()],
        }
    }
}

impl StorageAddressing {
    /// Use a different gateway; its host is recognized as storage too.
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        let gateway = gateway.into().trim_end_matches('/').to_string();
        if let Some(host) = Url::parse(&gateway)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        {
            if !self.gateway_hosts.contains(&host) {
                self.gateway_hosts.push(host);
            }
        }
        self.gateway = gateway;
        self
    }

    /// Reference to a stored object.
    pub fn address(&self, id: &str) -> String {
        format!("{}/{}", self.gateway.trim_end_matches('/'), id)
    }

    /// Whether a raw reference already points at the storage network.
    pub fn is_storage_ref(&self, raw: &str) -> bool {
        let lower = raw.trim().to_ascii_lowercase();
        if self
            .schemes
            .iter()
            .any(|s| lower.starts_with(&format!("{s}://")))
        {
            return true;
        }

        let absolute = if lower.starts_with("//") {
            format!("https:{lower}")
        } else {
            lower
        };
        let Ok(url) = Url::parse(&absolute) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        self.gateway_hosts
            .iter()
            .any(|g| host == g || host.ends_with(&format!(".{g}")))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_settings_builder() {
        let settings = ExtractSettings::new()
            .with_max_pages(3)
            .with_max_links_per_page(7)
            .with_delay(Duration::from_millis(0))
            .with_workers(0);

        assert_eq!(settings.max_pages, 3);
        assert_eq!(settings.max_links_per_page, 7);
        assert_eq!(settings.per_request_delay, Duration::ZERO);
        assert_eq!(settings.workers, 1);
        assert!(settings.same_domain_only);
    }

    #[test]
    fn test_page_rounds_minimum() {
        assert_eq!(PublishConfig::new().with_page_rounds(1).page_rounds, 2);
        assert_eq!(PublishConfig::new().with_page_rounds(4).page_rounds, 4);
    }

    #[test]
    fn test_storage_ref_detection() {
        let addressing = StorageAddressing::default();
        assert!(addressing.is_storage_ref("https://arweave.net/abc"));
        assert!(addressing.is_storage_ref("//arweave.net/abc"));
        assert!(addressing.is_storage_ref("https://sub.arweave.net/abc"));
        assert!(addressing.is_storage_ref("ar://abc"));
        assert!(!addressing.is_storage_ref("https://example.com/abc"));
        assert!(!addressing.is_storage_ref("/abc"));
        assert!(!addressing.is_storage_ref("https://notarweave.net/abc"));
    }

    #[test]
    fn test_custom_gateway() {
        let addressing = StorageAddressing::default().with_gateway("https://gw.example.org/");
        assert_eq!(addressing.address("xyz"), "https://gw.example.org/xyz");
        assert!(addressing.is_storage_ref("https://gw.example.org/xyz"));
    }

    #[test]
    fn test_settings_serde_roundtrip_durations() {
        let json = serde_json::to_string(&ExtractSettings::default()).unwrap();
        assert!(json.contains("\"per_request_delay\":500"));
        let back: ExtractSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_timeout, Duration::from_secs(30));
    }
}
