//! Concurrent path -> identifier map built up during a publish run.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Published identifiers keyed by stored path.
///
/// Entries are only ever added or replaced, never removed, so the set of
/// mapped paths grows monotonically over a run. Cloning shares the map.
#[derive(Debug, Clone, Default)]
pub struct PathIdMap {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl PathIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an identifier; returns the one it replaced, if any.
    pub async fn record(&self, path: impl Into<String>, id: impl Into<String>) -> Option<String> {
        self.inner.write().await.insert(path.into(), id.into())
    }

    pub async fn get(&self, path: &str) -> Option<String> {
        self.inner.read().await.get(path).cloned()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.inner.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Point-in-time copy for rewriting and manifest building.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.read().await.clone()
    }
}
