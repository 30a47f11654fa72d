//! Key/value blob store used to hand a snapshot from extract to publish.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use crate::error::{BlobError, BlobResult};

/// Flat key/value store for snapshot bodies and metadata.
///
/// Keys are `/`-separated relative paths (`example.com/graph.json`).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write (or overwrite) a blob.
    async fn put(&self, key: &str, data: Bytes) -> BlobResult<()>;

    /// Read a blob; [`BlobError::NotFound`] if absent.
    async fn get(&self, key: &str) -> BlobResult<Bytes>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>>;

    /// Read several blobs; missing keys are skipped.
    async fn get_many(&self, keys: &[String]) -> BlobResult<HashMap<String, Bytes>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.get(key).await {
                Ok(data) => {
                    found.insert(key.clone(), data);
                }
                Err(BlobError::NotFound { .. }) => {
                    tracing::warn!(key = %key, "blob missing");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}
