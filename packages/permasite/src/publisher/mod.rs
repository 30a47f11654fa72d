//! Three-pass publishing onto content-addressed storage.
//!
//! An object's identifier is only known after its final bytes are written,
//! yet documents must embed the identifiers of what they reference. Uploads
//! are therefore ordered by dependency:
//!
//! 1. Leaf assets (images, fonts, scripts), uploaded as-is
//! 2. Stylesheets, rewritten against pass 1 and earlier stylesheets,
//!    uploaded in `@import` dependency order
//! 3. Pages, in rounds: a provisional upload of the raw bytes gives every
//!    page an identifier, then each later round rewrites the original bytes
//!    against the identifiers of the previous round. Pages whose rewritten
//!    bytes did not change keep their identifier; the rounds stop early once
//!    nothing changes.
//!
//! With the default two rounds, a link from page A to page B points at B's
//! provisional upload, whose own outbound links are not rewritten. That one
//! level of staleness is the price of a bounded number of uploads.

pub mod map;
pub mod retry;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ManifestError, PublishError, PublishResult, StorageError, StorageResult};
use crate::canon::{Canonicalizer, RefContext, Reference};
use crate::manifest::{build_manifest, Manifest};
use crate::mime;
use crate::rewrite::{AddressBook, Ambiguity, Rewriter};
use crate::scan;
use crate::traits::storage::{StorageClient, Tag};
use crate::types::config::PublishConfig;
use crate::types::report::{IssueKind, RunReport};
use crate::types::site::{Asset, SiteGraph};

pub use map::PathIdMap;
pub use retry::RetryPolicy;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub const TAG_CONTENT_TYPE: &str = "Content-Type";
pub const TAG_PATH: &str = "Path";
pub const TAG_APP_NAME: &str = "App-Name";
pub const TAG_PASS: &str = "Publish-Pass";
pub const TAG_ROUND: &str = "Publish-Round";

/// Stage of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    LeafAssets,
    Stylesheets,
    Pages,
    Manifest,
}

impl Pass {
    pub fn as_str(self) -> &'static str {
        match self {
            Pass::LeafAssets => "assets",
            Pass::Stylesheets => "stylesheets",
            Pass::Pages => "pages",
            Pass::Manifest => "manifest",
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts for one pass (or one page round).
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub pass: Pass,
    /// Page round, 1 = provisional
    pub round: Option<u32>,
    pub uploaded: usize,
    /// Pages whose bytes did not change since their last upload
    pub unchanged: usize,
    pub failed: usize,
    /// Size of the path map when the pass finished
    pub mapped: usize,
}

impl PassSummary {
    fn new(pass: Pass, round: Option<u32>) -> Self {
        Self {
            pass,
            round,
            uploaded: 0,
            unchanged: 0,
            failed: 0,
            mapped: 0,
        }
    }
}

/// Outcome of publishing a site graph.
#[derive(Debug)]
pub struct Publication {
    /// Final `stored path -> identifier` map
    pub ids: BTreeMap<String, String>,
    pub passes: Vec<PassSummary>,
    pub report: RunReport,
}

/// A publication together with its uploaded manifest.
#[derive(Debug)]
pub struct PublishedSite {
    pub publication: Publication,
    pub manifest: Manifest,
    pub manifest_id: String,
}

#[derive(Debug, Clone)]
struct UploadJob {
    /// Stored path; empty for the manifest
    path: String,
    body: Bytes,
    content_type: String,
    pass: Pass,
    round: Option<u32>,
}

impl UploadJob {
    fn asset(asset: &Asset, body: Bytes, pass: Pass) -> Self {
        Self {
            path: asset.canonical_path.clone(),
            body,
            content_type: asset.mime_type.clone(),
            pass,
            round: None,
        }
    }
}

/// Publishes site graphs through a [`StorageClient`].
pub struct Publisher<S: StorageClient> {
    storage: Arc<S>,
    config: PublishConfig,
    retry: RetryPolicy,
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl<S: StorageClient + 'static> Publisher<S> {
    pub fn new(storage: Arc<S>, config: PublishConfig) -> Self {
        let limiter = config
            .uploads_per_second
            .and_then(NonZeroU32::new)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self {
            storage,
            retry: RetryPolicy::from_config(&config),
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Upload every asset and page of `graph`.
    ///
    /// Per-object failures are recorded in the returned report and leave the
    /// object out of the map. Cancellation discards the partial map.
    pub async fn publish(
        &self,
        graph: &SiteGraph,
        cancel: &CancellationToken,
    ) -> PublishResult<Publication> {
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        let seed = Url::parse(&graph.seed)
            .map_err(|_| PublishError::Config(format!("invalid seed URL: {}", graph.seed)))?;
        let canon = Canonicalizer::new(&seed).with_addressing(self.config.addressing.clone());
        let map = PathIdMap::new();
        let mut report = RunReport::new();
        let mut passes = Vec::new();
        let mut ambiguities: BTreeSet<Ambiguity> = BTreeSet::new();

        info!(
            seed = %graph.seed,
            pages = graph.pages.len(),
            assets = graph.assets.len(),
            storage = self.storage.name(),
            "Publish starting"
        );

        // Pass 1: leaf assets.
        let leaves: Vec<UploadJob> = graph
            .assets
            .iter()
            .filter(|a| !a.kind.is_referencing())
            .filter_map(|a| {
                a.content
                    .clone()
                    .map(|body| UploadJob::asset(a, body, Pass::LeafAssets))
            })
            .collect();
        let mut summary = PassSummary::new(Pass::LeafAssets, None);
        for (job, result) in self.upload_batch(leaves, &map, cancel).await? {
            match result {
                Ok(_) => summary.uploaded += 1,
                Err(e) => {
                    summary.failed += 1;
                    record_failure(&mut report, &job.path, &e);
                }
            }
        }
        summary.mapped = map.len().await;
        info!(uploaded = summary.uploaded, failed = summary.failed, "Leaf assets published");
        passes.push(summary);

        // Pass 2: stylesheets, in dependency waves.
        let sheets: Vec<&Asset> = graph
            .assets
            .iter()
            .filter(|a| a.kind.is_referencing() && a.is_fetched())
            .collect();
        let mut summary = PassSummary::new(Pass::Stylesheets, None);
        for wave in stylesheet_waves(&sheets, &canon) {
            let book = AddressBook::new(map.snapshot().await, self.config.addressing.clone());
            let rewriter = Rewriter::new(&canon, &book);
            let jobs: Vec<UploadJob> = wave
                .iter()
                .map(|sheet| {
                    let content = sheet.content.clone().unwrap_or_default();
                    let base = sheet.parsed_url().unwrap_or_else(|| seed.clone());
                    let (body, rewrite) = rewriter.css_body(&content, &base);
                    ambiguities.extend(rewrite.ambiguities);
                    UploadJob::asset(sheet, body, Pass::Stylesheets)
                })
                .collect();

            for (job, result) in self.upload_batch(jobs, &map, cancel).await? {
                match result {
                    Ok(_) => summary.uploaded += 1,
                    Err(e) => {
                        summary.failed += 1;
                        record_failure(&mut report, &job.path, &e);
                    }
                }
            }
        }
        summary.mapped = map.len().await;
        info!(uploaded = summary.uploaded, failed = summary.failed, "Stylesheets published");
        passes.push(summary);

        // Pass 3: pages, provisional round then rewrite rounds.
        let mut last_sent: HashMap<String, Bytes> = HashMap::new();
        let mut page_errors: HashMap<String, StorageError> = HashMap::new();

        let provisional: Vec<UploadJob> = graph
            .pages
            .iter()
            .map(|page| UploadJob {
                path: page.storage_path(),
                body: page.content.clone(),
                content_type: mime::HTML.to_string(),
                pass: Pass::Pages,
                round: Some(1),
            })
            .collect();
        let mut summary = PassSummary::new(Pass::Pages, Some(1));
        for (job, result) in self.upload_batch(provisional, &map, cancel).await? {
            match result {
                Ok(_) => {
                    summary.uploaded += 1;
                    last_sent.insert(job.path, job.body);
                }
                Err(e) => {
                    summary.failed += 1;
                    page_errors.insert(job.path, e);
                }
            }
        }
        summary.mapped = map.len().await;
        debug!(uploaded = summary.uploaded, failed = summary.failed, "Provisional pages published");
        passes.push(summary);

        for round in 2..=self.config.page_rounds.max(2) {
            let book = AddressBook::new(map.snapshot().await, self.config.addressing.clone());
            let rewriter = Rewriter::new(&canon, &book);
            let mut summary = PassSummary::new(Pass::Pages, Some(round));

            let mut jobs = Vec::new();
            for page in &graph.pages {
                let path = page.storage_path();
                let base = page.parsed_url().unwrap_or_else(|| seed.clone());
                let (body, rewrite) = rewriter.html_body(&page.content, &base);
                ambiguities.extend(rewrite.ambiguities);
                if !rewrite.unresolved.is_empty() {
                    debug!(page = %path, unresolved = ?rewrite.unresolved, "References left as written");
                }

                if last_sent.get(&path) == Some(&body) {
                    summary.unchanged += 1;
                    continue;
                }
                jobs.push(UploadJob {
                    path,
                    body,
                    content_type: mime::HTML.to_string(),
                    pass: Pass::Pages,
                    round: Some(round),
                });
            }

            if jobs.is_empty() {
                debug!(round, "Pages converged, no further rounds needed");
                summary.mapped = map.len().await;
                passes.push(summary);
                break;
            }

            for (job, result) in self.upload_batch(jobs, &map, cancel).await? {
                match result {
                    Ok(_) => {
                        summary.uploaded += 1;
                        page_errors.remove(&job.path);
                        last_sent.insert(job.path, job.body);
                    }
                    Err(e) => {
                        summary.failed += 1;
                        page_errors.insert(job.path, e);
                    }
                }
            }
            summary.mapped = map.len().await;
            debug!(
                round,
                uploaded = summary.uploaded,
                unchanged = summary.unchanged,
                failed = summary.failed,
                "Page round published"
            );
            passes.push(summary);
        }

        let mut failed_pages: Vec<_> = page_errors.into_iter().collect();
        failed_pages.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, error) in failed_pages {
            if map.contains(&path).await {
                warn!(path = %path, error = %error, "Final page upload failed, keeping earlier identifier");
                report.push(
                    IssueKind::UploadFailure,
                    path,
                    format!("final upload failed, earlier identifier kept: {error}"),
                );
            } else {
                record_failure(&mut report, &path, &error);
            }
        }

        for ambiguity in ambiguities {
            report.push(
                IssueKind::CanonicalizationAmbiguity,
                ambiguity.key,
                format!(
                    "resolved to {} over {}",
                    ambiguity.chosen,
                    ambiguity.others.join(", ")
                ),
            );
        }

        report.finish();
        let ids = map.snapshot().await;
        info!(
            mapped = ids.len(),
            issues = report.issues.len(),
            "Publish completed"
        );

        Ok(Publication {
            ids,
            passes,
            report,
        })
    }

    /// Upload a manifest; returns the identifier that addresses the site.
    pub async fn publish_manifest(
        &self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> PublishResult<String> {
        let job = UploadJob {
            path: String::new(),
            body: Bytes::from(manifest.to_json()?),
            content_type: mime::MANIFEST.to_string(),
            pass: Pass::Manifest,
            round: None,
        };
        let id = self
            .upload(&job, cancel)
            .await?
            .map_err(PublishError::ManifestUpload)?;
        info!(id = %id, routes = manifest.len(), "Manifest published");
        Ok(id)
    }

    /// Publish a graph, build its manifest and upload it.
    pub async fn publish_site(
        &self,
        graph: &SiteGraph,
        cancel: &CancellationToken,
    ) -> PublishResult<PublishedSite> {
        let publication = self.publish(graph, cancel).await?;
        let pages_stored = graph
            .pages
            .iter()
            .any(|page| publication.ids.contains_key(&page.storage_path()));
        if !pages_stored {
            warn!(
                routes = publication.ids.len(),
                "No page survived publishing, refusing to build a manifest"
            );
            return Err(ManifestError::Empty.into());
        }
        let manifest = build_manifest(&publication.ids)?;
        let manifest_id = self.publish_manifest(&manifest, cancel).await?;
        Ok(PublishedSite {
            publication,
            manifest,
            manifest_id,
        })
    }

    fn tags(&self, job: &UploadJob) -> Vec<Tag> {
        let mut tags = vec![
            Tag::new(TAG_CONTENT_TYPE, &job.content_type),
            Tag::new(TAG_APP_NAME, &self.config.app_name),
            Tag::new(TAG_PASS, job.pass.as_str()),
        ];
        if !job.path.is_empty() {
            tags.push(Tag::new(TAG_PATH, &job.path));
        }
        if let Some(round) = job.round {
            tags.push(Tag::new(TAG_ROUND, round.to_string()));
        }
        tags
    }

    async fn upload(
        &self,
        job: &UploadJob,
        cancel: &CancellationToken,
    ) -> PublishResult<StorageResult<String>> {
        let tags = &self.tags(job);
        let storage = &self.storage;
        let limiter = self.limiter.as_deref();
        retry::with_backoff(&self.retry, cancel, move || async move {
            if let Some(limiter) = limiter {
                limiter.until_ready().await;
            }
            storage.put(job.body.clone(), &job.content_type, tags).await
        })
        .await
    }

    /// Upload jobs concurrently, recording successes in `map` as they land.
    async fn upload_batch(
        &self,
        jobs: Vec<UploadJob>,
        map: &PathIdMap,
        cancel: &CancellationToken,
    ) -> PublishResult<Vec<(UploadJob, StorageResult<String>)>> {
        let results: Vec<PublishResult<(UploadJob, StorageResult<String>)>> = stream::iter(jobs)
            .map(move |job| async move {
                let result = self.upload(&job, cancel).await?;
                match &result {
                    Ok(id) => {
                        debug!(path = %job.path, id = %id, pass = %job.pass, "Uploaded");
                        map.record(job.path.clone(), id.clone()).await;
                    }
                    Err(e) => {
                        warn!(path = %job.path, error = %e, pass = %job.pass, "Upload failed");
                    }
                }
                Ok((job, result))
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        results.into_iter().collect()
    }
}

fn record_failure(report: &mut RunReport, path: &str, error: &StorageError) {
    report.push(IssueKind::UploadFailure, path, error.to_string());
}

/// Group stylesheets so that each one comes after the sheets it imports.
///
/// Sheets caught in an import cycle end up together in a final wave; their
/// references to each other stay unresolved.
fn stylesheet_waves<'a>(sheets: &[&'a Asset], canon: &Canonicalizer) -> Vec<Vec<&'a Asset>> {
    let paths: HashSet<&str> = sheets.iter().map(|s| s.canonical_path.as_str()).collect();

    let mut deps: HashMap<&str, HashSet<String>> = HashMap::new();
    for sheet in sheets {
        let mut own = HashSet::new();
        if let (Some(content), Some(base)) = (&sheet.content, sheet.parsed_url()) {
            let text = String::from_utf8_lossy(content);
            for r in scan::css::references(&text) {
                let ctx = RefContext::new(&base, r.attr);
                if let Reference::Site(site) = canon.parse(&r.value, &ctx) {
                    if site.key != sheet.canonical_path && paths.contains(site.key.as_str()) {
                        own.insert(site.key);
                    }
                }
            }
        }
        deps.insert(sheet.canonical_path.as_str(), own);
    }

    let mut remaining: Vec<&'a Asset> = sheets.to_vec();
    let mut done: HashSet<String> = HashSet::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&'a Asset>, Vec<&'a Asset>) =
            remaining.into_iter().partition(|sheet| {
                deps.get(sheet.canonical_path.as_str())
                    .map(|d| d.iter().all(|dep| done.contains(dep)))
                    .unwrap_or(true)
            });

        if ready.is_empty() {
            warn!(
                sheets = ?blocked.iter().map(|s| s.canonical_path.as_str()).collect::<Vec<_>>(),
                "Stylesheet import cycle, uploading remaining sheets together"
            );
            waves.push(blocked);
            break;
        }

        done.extend(ready.iter().map(|s| s.canonical_path.clone()));
        waves.push(ready);
        remaining = blocked;
    }

    waves
}
