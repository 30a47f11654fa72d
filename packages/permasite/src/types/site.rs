//! Site graph types - captured pages and discovered assets.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::canon::{page_storage_path, Canonicalizer};
use crate::mime;

/// A captured page document.
///
/// The canonical path is computed once from the URL the page was discovered
/// under and never recomputed from content. Bodies are not part of the
/// serialized form; snapshots store them separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// URL the page was fetched from (after redirects)
    pub url: String,

    /// Canonical key of the page URL
    pub canonical_path: String,

    /// Rendered document bytes
    #[serde(skip)]
    pub content: Bytes,

    /// SHA-256 hash of the rendered document
    pub content_hash: String,

    /// Page title if available
    pub title: Option<String>,

    /// Raw outbound link references as written in the document
    #[serde(default)]
    pub outbound_links: Vec<String>,

    /// Raw asset references as written in the document
    #[serde(default)]
    pub asset_refs: Vec<String>,

    /// When the page was captured
    pub fetched_at: DateTime<Utc>,
}

impl Page {
    /// Create a page from its URL and rendered bytes.
    pub fn new(url: &Url, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            url: url.to_string(),
            canonical_path: Canonicalizer::canonical_path(url),
            content_hash: hash_content(&content),
            content,
            title: None,
            outbound_links: Vec::new(),
            asset_refs: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Create a page discovered under one URL and rendered at another
    /// (after redirects). The canonical path follows the discovery URL.
    pub fn at(discovered: &Url, rendered: &Url, content: impl Into<Bytes>) -> Self {
        Self {
            canonical_path: Canonicalizer::canonical_path(discovered),
            ..Self::new(rendered, content)
        }
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set outbound link references.
    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.outbound_links = links;
        self
    }

    /// Set asset references.
    pub fn with_asset_refs(mut self, refs: Vec<String>) -> Self {
        self.asset_refs = refs;
        self
    }

    /// Path the page is stored under (`/about` -> `/about/index.html`).
    pub fn storage_path(&self) -> String {
        page_storage_path(&self.canonical_path)
    }

    /// Parsed page URL.
    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }

    /// Document as text (lossy for invalid UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Category of an asset, deciding which publish pass handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Stylesheet,
    Script,
    Image,
    Font,
    Other,
}

impl AssetKind {
    /// Classify from MIME type, falling back to the path extension.
    pub fn classify(mime_type: &str, path: &str) -> Self {
        let essence = mime::essence(mime_type);
        match essence.as_str() {
            "text/css" => return AssetKind::Stylesheet,
            "text/javascript" | "application/javascript" | "application/x-javascript" => {
                return AssetKind::Script
            }
            _ => {}
        }
        if essence.starts_with("image/") {
            return AssetKind::Image;
        }
        if essence.starts_with("font/") || essence == "application/vnd.ms-fontobject" {
            return AssetKind::Font;
        }

        match crate::canon::path::extension(path).as_deref() {
            Some("css") => AssetKind::Stylesheet,
            Some("js" | "mjs" | "cjs") => AssetKind::Script,
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" | "bmp") => {
                AssetKind::Image
            }
            Some("woff" | "woff2" | "ttf" | "otf" | "eot") => AssetKind::Font,
            _ => AssetKind::Other,
        }
    }

    /// Whether the asset body may contain same-site references to rewrite.
    pub fn is_referencing(self) -> bool {
        matches!(self, AssetKind::Stylesheet)
    }
}

/// A discovered asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Absolute URL of the asset
    pub url: String,

    /// Canonical key, also the storage path
    pub canonical_path: String,

    /// Declared or inferred MIME type
    pub mime_type: String,

    /// Raw bytes; `None` until fetched
    #[serde(skip)]
    pub content: Option<Bytes>,

    pub kind: AssetKind,
}

impl Asset {
    /// Create an unfetched asset; MIME type and kind come from the extension.
    pub fn discovered(url: &Url) -> Self {
        let canonical_path = Canonicalizer::canonical_path(url);
        let mime_type = mime::from_path(&canonical_path).to_string();
        let kind = AssetKind::classify(&mime_type, &canonical_path);
        Self {
            url: url.to_string(),
            canonical_path,
            mime_type,
            content: None,
            kind,
        }
    }

    /// Attach fetched bytes and the declared content type, if any.
    pub fn with_content(mut self, content: impl Into<Bytes>, declared: Option<&str>) -> Self {
        if let Some(declared) = declared.filter(|d| !mime::is_generic(d)) {
            self.mime_type = declared.to_string();
        }
        self.kind = AssetKind::classify(&self.mime_type, &self.canonical_path);
        self.content = Some(content.into());
        self
    }

    pub fn is_fetched(&self) -> bool {
        self.content.is_some()
    }

    pub fn size(&self) -> usize {
        self.content.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }
}

/// Output of the extractor: pages and assets of one site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteGraph {
    /// Seed URL the crawl started from
    pub seed: String,

    /// Captured pages in BFS order
    pub pages: Vec<Page>,

    /// Fetched assets in discovery order
    pub assets: Vec<Asset>,
}

impl SiteGraph {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Default::default()
        }
    }

    /// Host part of the seed URL, used as the snapshot key prefix.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.seed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    pub fn page(&self, canonical_path: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.canonical_path == canonical_path)
    }

    pub fn asset(&self, canonical_path: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|a| a.canonical_path == canonical_path)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.assets.is_empty()
    }

    /// Total bytes of all captured content.
    pub fn total_bytes(&self) -> usize {
        self.pages.iter().map(|p| p.content.len()).sum::<usize>()
            + self.assets.iter().map(Asset::size).sum::<usize>()
    }
}

/// Calculate SHA-256 hash of content.
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_paths() {
        let url = Url::parse("https://example.com/about/").unwrap();
        let page = Page::new(&url, "<html></html>").with_title("About");
        assert_eq!(page.canonical_path, "/about");
        assert_eq!(page.storage_path(), "/about/index.html");
        assert_eq!(page.title.as_deref(), Some("About"));
        assert_eq!(page.content_hash.len(), 64);
    }

    #[test]
    fn test_identical_content_same_hash() {
        let a = Page::new(&Url::parse("https://example.com/a").unwrap(), "same");
        let b = Page::new(&Url::parse("https://example.com/b").unwrap(), "same");
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_asset_kind_from_mime_and_extension() {
        assert_eq!(AssetKind::classify("text/css; charset=utf-8", "/x"), AssetKind::Stylesheet);
        assert_eq!(AssetKind::classify("application/octet-stream", "/a.css"), AssetKind::Stylesheet);
        assert_eq!(AssetKind::classify("image/png", "/x"), AssetKind::Image);
        assert_eq!(AssetKind::classify("font/woff2", "/x"), AssetKind::Font);
        assert_eq!(AssetKind::classify("", "/app.mjs"), AssetKind::Script);
        assert_eq!(AssetKind::classify("", "/data.bin"), AssetKind::Other);
    }

    #[test]
    fn test_asset_declared_type_wins_unless_generic() {
        let url = Url::parse("https://example.com/theme").unwrap();
        let asset = Asset::discovered(&url).with_content("body{}", Some("text/css"));
        assert_eq!(asset.kind, AssetKind::Stylesheet);

        let url = Url::parse("https://example.com/logo.png").unwrap();
        let asset = Asset::discovered(&url).with_content("png", Some("application/octet-stream"));
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.kind, AssetKind::Image);
    }

    #[test]
    fn test_graph_host() {
        let graph = SiteGraph::new("https://docs.example.com/start");
        assert_eq!(graph.host().as_deref(), Some("docs.example.com"));
    }
}
