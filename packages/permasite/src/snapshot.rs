//! Snapshot persistence between the extract and publish stages.
//!
//! Layout inside a [`BlobStore`]:
//!
//! - `{host}/graph.json`: the site graph without bodies
//! - `{host}/bodies/{sha256}`: page and asset bodies, deduplicated by hash

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::error::{BlobError, BlobResult};
use crate::traits::blob::BlobStore;
use crate::types::site::{hash_content, SiteGraph};

const GRAPH_FILE: &str = "graph.json";
const BODIES_DIR: &str = "bodies";

/// On-disk form of a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub captured_at: DateTime<Utc>,
    pub graph: SiteGraph,
    /// `canonical path -> body hash` for every fetched asset
    #[serde(default)]
    pub asset_hashes: BTreeMap<String, String>,
}

/// Key prefix of a site's snapshot.
pub fn site_prefix(graph: &SiteGraph) -> String {
    graph.host().unwrap_or_else(|| "site".to_string())
}

fn body_key(prefix: &str, hash: &str) -> String {
    format!("{prefix}/{BODIES_DIR}/{hash}")
}

/// Write `graph` and its bodies; returns the snapshot prefix.
pub async fn save(store: &dyn BlobStore, graph: &SiteGraph) -> BlobResult<String> {
    let prefix = site_prefix(graph);
    let mut written = HashSet::new();

    for page in &graph.pages {
        if written.insert(page.content_hash.clone()) {
            store
                .put(&body_key(&prefix, &page.content_hash), page.content.clone())
                .await?;
        }
    }

    let mut asset_hashes = BTreeMap::new();
    for asset in &graph.assets {
        let Some(content) = &asset.content else {
            continue;
        };
        let hash = hash_content(content);
        if written.insert(hash.clone()) {
            store.put(&body_key(&prefix, &hash), content.clone()).await?;
        }
        asset_hashes.insert(asset.canonical_path.clone(), hash);
    }

    let file = SnapshotFile {
        captured_at: Utc::now(),
        graph: graph.clone(),
        asset_hashes,
    };
    let json = serde_json::to_vec_pretty(&file)?;
    store
        .put(&format!("{prefix}/{GRAPH_FILE}"), Bytes::from(json))
        .await?;

    info!(
        prefix = %prefix,
        pages = graph.pages.len(),
        assets = graph.assets.len(),
        bodies = written.len(),
        "Snapshot saved"
    );
    Ok(prefix)
}

/// Read a snapshot back with its bodies attached.
///
/// Assets whose body is missing come back unfetched; a page whose body is
/// missing is dropped.
pub async fn load(store: &dyn BlobStore, prefix: &str) -> BlobResult<SiteGraph> {
    let raw = store.get(&format!("{prefix}/{GRAPH_FILE}")).await?;
    let file: SnapshotFile = serde_json::from_slice(&raw)?;
    let mut graph = file.graph;

    let mut keys: Vec<String> = graph
        .pages
        .iter()
        .map(|p| body_key(prefix, &p.content_hash))
        .chain(file.asset_hashes.values().map(|h| body_key(prefix, h)))
        .collect();
    keys.sort();
    keys.dedup();
    let bodies = store.get_many(&keys).await?;

    graph.pages.retain_mut(|page| {
        match bodies.get(&body_key(prefix, &page.content_hash)) {
            Some(body) => {
                page.content = body.clone();
                true
            }
            None => {
                warn!(page = %page.canonical_path, "Page body missing from snapshot, dropping");
                false
            }
        }
    });
    for asset in &mut graph.assets {
        asset.content = file
            .asset_hashes
            .get(&asset.canonical_path)
            .and_then(|h| bodies.get(&body_key(prefix, h)))
            .cloned();
    }

    debug!(
        prefix = %prefix,
        captured_at = %file.captured_at,
        pages = graph.pages.len(),
        assets = graph.assets.len(),
        "Snapshot loaded"
    );
    Ok(graph)
}

/// Prefixes of every snapshot in the store.
pub async fn list_sites(store: &dyn BlobStore) -> BlobResult<Vec<String>> {
    let suffix = format!("/{GRAPH_FILE}");
    Ok(store
        .list("")
        .await?
        .into_iter()
        .filter_map(|key| key.strip_suffix(&suffix).map(str::to_string))
        .collect())
}

/// Whether a snapshot exists under `prefix`.
pub async fn exists(store: &dyn BlobStore, prefix: &str) -> BlobResult<bool> {
    match store.get(&format!("{prefix}/{GRAPH_FILE}")).await {
        Ok(_) => Ok(true),
        Err(BlobError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryBlobStore;
    use crate::types::site::{Asset, Page};
    use url::Url;

    fn graph() -> SiteGraph {
        let home = Url::parse("https://example.com/").unwrap();
        let about = Url::parse("https://example.com/about").unwrap();
        let mut graph = SiteGraph::new("https://example.com/");
        graph.pages.push(Page::new(&home, "<p>same</p>").with_title("Home"));
        graph.pages.push(Page::new(&about, "<p>same</p>"));
        graph.assets.push(
            Asset::discovered(&home.join("/logo.png").unwrap()).with_content("png", Some("image/png")),
        );
        graph
            .assets
            .push(Asset::discovered(&home.join("/missing.js").unwrap()));
        graph
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryBlobStore::new();
        let prefix = save(&store, &graph()).await.unwrap();
        assert_eq!(prefix, "example.com");

        let loaded = load(&store, &prefix).await.unwrap();
        assert_eq!(loaded.pages.len(), 2);
        assert_eq!(loaded.pages[0].title.as_deref(), Some("Home"));
        assert_eq!(loaded.pages[1].text(), "<p>same</p>");
        assert_eq!(loaded.assets[0].content.as_deref(), Some(&b"png"[..]));
        assert!(!loaded.assets[1].is_fetched());
    }

    #[tokio::test]
    async fn test_identical_bodies_stored_once() {
        let store = MemoryBlobStore::new();
        save(&store, &graph()).await.unwrap();
        let bodies = store.list("example.com/bodies/").await.unwrap();
        assert_eq!(bodies.len(), 2);
    }

    #[tokio::test]
    async fn test_list_and_exists() {
        let store = MemoryBlobStore::new();
        assert!(!exists(&store, "example.com").await.unwrap());
        save(&store, &graph()).await.unwrap();
        assert_eq!(list_sites(&store).await.unwrap(), vec!["example.com"]);
        assert!(exists(&store, "example.com").await.unwrap());
    }
}
