//! Breadth-first site extraction.
//!
//! Pages are rendered one at a time through the shared [`RenderHandle`] in
//! BFS order from the seed; assets are fetched afterwards by a small worker
//! pool. Pages reachable under several URLs (`/about` and `/about/`) are
//! kept once, by content hash. Per-item failures never abort the crawl;
//! they are recorded in the run's [`RunReport`].

pub mod error_page;
pub mod html;

use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::canon::{Canonicalizer, RefAttr, RefContext, Reference};
use crate::error::{ExtractError, ExtractResult, FetchError, FetchResult};
use crate::mime;
use crate::render::RenderHandle;
use crate::scan;
use crate::traits::renderer::{Fetched, Fetcher, Renderer};
use crate::types::config::{ExtractSettings, StorageAddressing};
use crate::types::report::{IssueKind, RunReport};
use crate::types::site::{Asset, AssetKind, Page, SiteGraph};

/// Conventional documentation entry points tried from the seed page.
///
/// Catches sections that script-driven navigation hides from link discovery.
pub const PROBE_PATHS: &[&str] = &[
    "/docs",
    "/documentation",
    "/guide",
    "/getting-started",
    "/api",
    "/reference",
    "/blog",
    "/about",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Seed,
    Link,
    Probe,
}

#[derive(Debug)]
struct Queued {
    url: Url,
    origin: Origin,
}

/// Result of an extraction run.
#[derive(Debug)]
pub struct Extraction {
    pub graph: SiteGraph,
    pub report: RunReport,
}

/// Crawls one site into a [`SiteGraph`].
pub struct Extractor<R: Renderer, F: Fetcher> {
    renderer: Arc<RenderHandle<R>>,
    fetcher: Arc<F>,
    settings: ExtractSettings,
    addressing: StorageAddressing,
}

/// Mutable state of one crawl.
#[derive(Default)]
struct Crawl {
    queue: VecDeque<Queued>,
    /// URL paths already enqueued (trailing slash significant)
    visited: HashSet<String>,
    /// Content hash -> storage path of the page that claimed it
    seen_hashes: HashMap<String, String>,
    stored_paths: HashSet<String>,
    /// Canonical key -> URL of every asset referenced so far
    assets: IndexMap<String, Url>,
    /// Non-HTML resources reached through links, already downloaded
    prefetched: HashMap<String, Fetched>,
}

impl Crawl {
    fn enqueue(&mut self, url: Url, origin: Origin) -> bool {
        if self.visited.insert(url.path().to_string()) {
            self.queue.push_back(Queued { url, origin });
            true
        } else {
            false
        }
    }
}

impl<R, F> Extractor<R, F>
where
    R: Renderer + 'static,
    F: Fetcher + 'static,
{
    pub fn new(renderer: Arc<RenderHandle<R>>, fetcher: Arc<F>, settings: ExtractSettings) -> Self {
        Self {
            renderer,
            fetcher,
            settings,
            addressing: StorageAddressing::default(),
        }
    }

    /// Recognize a custom storage gateway when classifying references.
    pub fn with_addressing(mut self, addressing: StorageAddressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    /// Crawl from `seed` and fetch every referenced same-site asset.
    ///
    /// Cancellation stops the run at the next suspension point and returns
    /// [`ExtractError::Cancelled`]; nothing partial is returned.
    pub async fn extract(&self, seed: &str, cancel: &CancellationToken) -> ExtractResult<Extraction> {
        let seed_url = Url::parse(seed)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .ok_or_else(|| ExtractError::InvalidSeed {
                url: seed.to_string(),
            })?;

        info!(
            seed = %seed_url,
            max_pages = self.settings.max_pages,
            "Extraction starting"
        );

        let mut canon = Canonicalizer::new(&seed_url).with_addressing(self.addressing.clone());
        let mut graph = SiteGraph::new(seed_url.as_str());
        let mut report = RunReport::new();
        let mut crawl = Crawl::default();
        crawl.enqueue(seed_url, Origin::Seed);

        while let Some(entry) = crawl.queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            if graph.pages.len() >= self.settings.max_pages {
                debug!(limit = self.settings.max_pages, "Page limit reached");
                break;
            }

            debug!(url = %entry.url, pages_so_far = graph.pages.len(), "Rendering page");
            match self.render(&entry.url, cancel).await? {
                Ok(fetched) => {
                    self.capture(entry, fetched, &mut canon, &mut crawl, &mut graph, &mut report)
                }
                Err(e) if entry.origin == Origin::Probe => {
                    debug!(url = %entry.url, error = %e, "Probe path unavailable");
                }
                Err(e) => {
                    warn!(url = %entry.url, error = %e, "Failed to render page");
                    report.push(IssueKind::FetchFailure, entry.url.as_str(), e.to_string());
                }
            }

            self.pause(cancel).await?;
        }

        let pending = std::mem::take(&mut crawl.assets);
        let prefetched = std::mem::take(&mut crawl.prefetched);
        self.fetch_assets(&canon, pending, prefetched, &mut graph, &mut report, cancel)
            .await?;

        report.finish();
        info!(
            seed = %graph.seed,
            pages = graph.pages.len(),
            assets = graph.assets.len(),
            issues = report.issues.len(),
            "Extraction completed"
        );

        Ok(Extraction { graph, report })
    }

    /// Render one page through a bounded context.
    async fn render(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> ExtractResult<FetchResult<Fetched>> {
        let context = self
            .renderer
            .acquire()
            .await
            .map_err(|e| ExtractError::RenderUnavailable(e.to_string()))?;

        let timeout = self.settings.request_timeout;
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            r = tokio::time::timeout(timeout, context.navigate(url, timeout)) => {
                r.unwrap_or_else(|_| Err(FetchError::Timeout { url: url.to_string() }))
            }
        };
        context.release();
        Ok(result)
    }

    /// Turn a rendered response into a page and queue what it references.
    fn capture(
        &self,
        entry: Queued,
        fetched: Fetched,
        canon: &mut Canonicalizer,
        crawl: &mut Crawl,
        graph: &mut SiteGraph,
        report: &mut RunReport,
    ) {
        let final_url = fetched.url.clone();
        let is_probe = entry.origin == Origin::Probe;

        if !canon.is_same_site(&final_url) {
            if entry.origin == Origin::Seed {
                info!(
                    original = %entry.url,
                    resolved = %final_url,
                    "Site resolved after redirect"
                );
                *canon = Canonicalizer::new(&final_url).with_addressing(self.addressing.clone());
                graph.seed = final_url.to_string();
            } else {
                debug!(url = %entry.url, to = %final_url, "Redirected off-site, skipping");
                return;
            }
        }

        if !fetched.is_success() {
            if is_probe {
                debug!(url = %entry.url, status = fetched.status, "Probe path unavailable");
            } else {
                warn!(url = %entry.url, status = fetched.status, "Error status, skipping page");
                report.push(
                    IssueKind::ErrorPageDetected,
                    entry.url.as_str(),
                    format!("HTTP {}", fetched.status),
                );
            }
            return;
        }

        let is_html = fetched
            .content_type
            .as_deref()
            .map(|ct| mime::is_generic(ct) || mime::is_html(ct))
            .unwrap_or(true);
        if !is_html {
            let key = Canonicalizer::canonical_path(&entry.url);
            debug!(url = %entry.url, "Linked resource is not a document, keeping as asset");
            crawl.assets.entry(key.clone()).or_insert_with(|| entry.url.clone());
            crawl.prefetched.insert(key, fetched);
            return;
        }

        let text = fetched.text();
        let found = html::discover(&text);

        if let Some(signature) = error_page::detect(found.title.as_deref(), found.heading.as_deref())
        {
            if is_probe {
                debug!(url = %entry.url, signature = %signature, "Probe path is an error page");
            } else {
                warn!(url = %entry.url, signature = %signature, "Error page detected, skipping");
                report.push(
                    IssueKind::ErrorPageDetected,
                    entry.url.as_str(),
                    format!("matched \"{signature}\""),
                );
            }
            return;
        }

        // Links are followed even from duplicates; only storage is deduplicated.
        let link_ctx = RefContext::new(&final_url, RefAttr::Href);
        let mut enqueued = 0;
        for raw in &found.links {
            if enqueued >= self.settings.max_links_per_page
                || crawl.visited.len() >= self.settings.max_pages
            {
                break;
            }
            if let Some(target) = canon.resolve_url(raw, &link_ctx) {
                if crawl.enqueue(target, Origin::Link) {
                    enqueued += 1;
                }
            }
        }

        if entry.origin == Origin::Seed && self.settings.probe_common_paths {
            for path in PROBE_PATHS {
                if crawl.visited.len() >= self.settings.max_pages {
                    break;
                }
                if let Ok(target) = final_url.join(path) {
                    crawl.enqueue(target, Origin::Probe);
                }
            }
        }

        for (raw, attr) in &found.assets {
            if let Reference::Site(site) = canon.parse(raw, &RefContext::new(&final_url, *attr)) {
                crawl.assets.entry(site.key).or_insert(site.url);
            }
        }

        let keep = |raw: &str, attr: RefAttr| {
            let reference = canon.parse(raw, &RefContext::new(&final_url, attr));
            if self.settings.same_domain_only {
                reference.is_site()
            } else {
                matches!(reference, Reference::Site(_) | Reference::External(_))
            }
        };
        let links: Vec<String> = found
            .links
            .iter()
            .filter(|l| keep(l, RefAttr::Href))
            .cloned()
            .collect();
        let asset_refs: Vec<String> = found
            .assets
            .iter()
            .filter(|(a, attr)| keep(a, *attr))
            .map(|(a, _)| a.clone())
            .collect();

        let mut page = Page::at(&entry.url, &final_url, fetched.body)
            .with_links(links)
            .with_asset_refs(asset_refs);
        if let Some(title) = found.title {
            page = page.with_title(title);
        }

        let storage_path = page.storage_path();
        if let Some(first) = crawl.seen_hashes.get(&page.content_hash) {
            debug!(url = %entry.url, duplicate_of = %first, "Duplicate content, not stored again");
            return;
        }
        if !crawl.stored_paths.insert(storage_path.clone()) {
            debug!(url = %entry.url, path = %storage_path, "Path already captured");
            return;
        }
        crawl
            .seen_hashes
            .insert(page.content_hash.clone(), storage_path);

        debug!(
            url = %entry.url,
            path = %page.canonical_path,
            bytes = page.content.len(),
            new_links = enqueued,
            "Page captured"
        );
        graph.pages.push(page);
    }

    /// Fetch discovered assets in waves; stylesheets may reveal more.
    async fn fetch_assets(
        &self,
        canon: &Canonicalizer,
        pending: IndexMap<String, Url>,
        mut prefetched: HashMap<String, Fetched>,
        graph: &mut SiteGraph,
        report: &mut RunReport,
        cancel: &CancellationToken,
    ) -> ExtractResult<()> {
        let page_paths: HashSet<String> = graph.pages.iter().map(Page::storage_path).collect();
        let mut seen: HashSet<String> = pending.keys().cloned().collect();
        let mut wave: Vec<(String, Url)> = pending
            .into_iter()
            .filter(|(key, _)| !page_paths.contains(key))
            .collect();
        let workers = self.settings.workers.max(1);

        while !wave.is_empty() {
            debug!(count = wave.len(), workers, "Fetching asset wave");
            let jobs: Vec<_> = wave
                .drain(..)
                .enumerate()
                .map(|(i, (key, url))| {
                    let ready = prefetched.remove(&key);
                    (i, key, url, ready)
                })
                .collect();

            let mut results: Vec<_> = stream::iter(jobs)
                .map(|(i, key, url, ready)| async move {
                    let result = match ready {
                        Some(fetched) => Ok(Ok(fetched)),
                        None => self.fetch_one(&url, cancel).await,
                    };
                    (i, key, url, result)
                })
                .buffer_unordered(workers)
                .collect()
                .await;
            results.sort_by_key(|(i, ..)| *i);

            for (_, key, url, result) in results {
                let fetched = match result? {
                    Ok(fetched) if fetched.is_success() => fetched,
                    Ok(fetched) => {
                        warn!(url = %url, status = fetched.status, "Asset returned error status");
                        report.push(
                            IssueKind::FetchFailure,
                            url.as_str(),
                            format!("HTTP {}", fetched.status),
                        );
                        continue;
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Failed to fetch asset");
                        report.push(IssueKind::FetchFailure, url.as_str(), e.to_string());
                        continue;
                    }
                };

                let asset = Asset::discovered(&url)
                    .with_content(fetched.body.clone(), fetched.content_type.as_deref());

                if asset.kind == AssetKind::Stylesheet {
                    let css = fetched.text();
                    for r in scan::css::references(&css) {
                        let ctx = RefContext::new(&fetched.url, r.attr);
                        if let Reference::Site(site) = canon.parse(&r.value, &ctx) {
                            if !page_paths.contains(&site.key) && seen.insert(site.key.clone()) {
                                debug!(from = %key, asset = %site.key, "Asset found in stylesheet");
                                wave.push((site.key, site.url));
                            }
                        }
                    }
                }

                graph.assets.push(asset);
            }
        }

        Ok(())
    }

    /// Fetch one asset, then hold the worker for the politeness delay.
    async fn fetch_one(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> ExtractResult<FetchResult<Fetched>> {
        let timeout = self.settings.request_timeout;
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            r = tokio::time::timeout(timeout, self.fetcher.fetch(url, timeout)) => {
                r.unwrap_or_else(|_| Err(FetchError::Timeout { url: url.to_string() }))
            }
        };
        self.pause(cancel).await?;
        Ok(result)
    }

    async fn pause(&self, cancel: &CancellationToken) -> ExtractResult<()> {
        let delay = self.settings.per_request_delay;
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(ExtractError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSite;
    use std::time::Duration;

    fn extractor(site: Arc<MockSite>) -> Extractor<MockSite, MockSite> {
        let settings = ExtractSettings::new()
            .with_delay(Duration::ZERO)
            .with_probing(false);
        Extractor::new(Arc::new(RenderHandle::ready(site.clone(), 2)), site, settings)
    }

    #[tokio::test]
    async fn test_invalid_seed() {
        let site = Arc::new(MockSite::new("https://example.com"));
        let cancel = CancellationToken::new();
        for seed in ["not a url", "ftp://example.com/", "mailto:a@b.c"] {
            assert!(matches!(
                extractor(site.clone()).extract(seed, &cancel).await,
                Err(ExtractError::InvalidSeed { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_bfs_order_and_link_cap() {
        let site = Arc::new(
            MockSite::new("https://example.com")
                .with_page("/", r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#)
                .with_page("/a", r#"<a href="/a/deep">deep</a>"#)
                .with_page("/b", "<p>b</p>")
                .with_page("/c", "<p>c</p>")
                .with_page("/a/deep", "<p>deep</p>"),
        );
        let mut ex = extractor(site.clone());
        ex.settings = ex.settings.clone().with_max_links_per_page(2);

        let result = ex
            .extract("https://example.com/", &CancellationToken::new())
            .await
            .unwrap();
        let paths: Vec<_> = result
            .graph
            .pages
            .iter()
            .map(|p| p.canonical_path.as_str())
            .collect();
        assert_eq!(paths, vec!["/", "/a", "/b", "/a/deep"]);
    }

    #[tokio::test]
    async fn test_max_pages() {
        let site = Arc::new(
            MockSite::new("https://example.com")
                .with_page("/", r#"<a href="/a">a</a><a href="/b">b</a>"#)
                .with_page("/a", "<p>a</p>")
                .with_page("/b", "<p>b</p>"),
        );
        let mut ex = extractor(site);
        ex.settings = ex.settings.clone().with_max_pages(2);
        let result = ex
            .extract("https://example.com/", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.graph.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_probe_paths_queued_from_seed() {
        let site = Arc::new(
            MockSite::new("https://example.com")
                .with_page("/", "<p>home</p>")
                .with_page("/docs", "<p>docs</p>"),
        );
        let mut ex = extractor(site);
        ex.settings = ex.settings.clone().with_probing(true);
        let result = ex
            .extract("https://example.com/", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.graph.page("/docs").is_some());
        // Missing probe paths are not reported.
        assert!(result.report.is_clean());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let site = Arc::new(MockSite::new("https://example.com").with_page("/", "<p>x</p>"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            extractor(site).extract("https://example.com/", &cancel).await,
            Err(ExtractError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_non_document_link_becomes_asset() {
        let site = Arc::new(
            MockSite::new("https://example.com")
                .with_page("/", r#"<a href="/files/guide.pdf">pdf</a>"#)
                .with_resource("/files/guide.pdf", "application/pdf", "%PDF-1.4"),
        );
        let result = extractor(site)
            .extract("https://example.com/", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.graph.pages.len(), 1);
        let pdf = result.graph.asset("/files/guide.pdf").unwrap();
        assert_eq!(pdf.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_asset_failure_recorded() {
        let site = Arc::new(
            MockSite::new("https://example.com")
                .with_page("/", r#"<img src="/missing.png">"#),
        );
        let result = extractor(site)
            .extract("https://example.com/", &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.graph.assets.is_empty());
        assert_eq!(result.report.count(IssueKind::FetchFailure), 1);
    }
}
