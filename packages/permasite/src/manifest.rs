//! Path manifest: the single entry point of a published site.
//!
//! Wire format:
//!
//! ```json
//! {
//!   "manifest": "arweave/paths",
//!   "version": "0.1.0",
//!   "index": { "path": "index.html" },
//!   "paths": { "index.html": { "id": "..." }, "css/site.css": { "id": "..." } }
//! }
//! ```
//!
//! Route keys never carry a leading slash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ManifestError;

pub const MANIFEST_SCHEMA: &str = "arweave/paths";
pub const MANIFEST_VERSION: &str = "0.1.0";

/// Entry served for the bare manifest address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
}

/// Identifier of one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub id: String,
}

/// Mapping of relative route paths to identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest: String,
    pub version: String,
    pub index: IndexEntry,
    pub paths: BTreeMap<String, PathEntry>,
}

impl Manifest {
    pub fn default_entry(&self) -> &str {
        &self.index.path
    }

    /// Identifier of a route.
    pub fn route(&self, path: &str) -> Option<&str> {
        self.paths.get(path).map(|e| e.id.as_str())
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.paths.iter().map(|(p, e)| (p.as_str(), e.id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build a manifest from a `stored path -> identifier` map.
///
/// Leading slashes are stripped from every route. The default entry is
/// `index.html` when present, otherwise the first HTML route, otherwise the
/// first route. An empty map is an error: a manifest without routes would
/// address nothing.
pub fn build_manifest(ids: &BTreeMap<String, String>) -> Result<Manifest, ManifestError> {
    let mut paths = BTreeMap::new();
    for (path, id) in ids {
        let route = path.trim_start_matches('/');
        if route.is_empty() {
            continue;
        }
        paths
            .entry(route.to_string())
            .or_insert_with(|| PathEntry { id: id.clone() });
    }

    let index = if paths.contains_key("index.html") {
        "index.html".to_string()
    } else {
        paths
            .keys()
            .find(|p| crate::canon::path::has_html_extension(p))
            .or_else(|| paths.keys().next())
            .cloned()
            .ok_or(ManifestError::Empty)?
    };

    Ok(Manifest {
        manifest: MANIFEST_SCHEMA.to_string(),
        version: MANIFEST_VERSION.to_string(),
        index: IndexEntry { path: index },
        paths,
    })
}
