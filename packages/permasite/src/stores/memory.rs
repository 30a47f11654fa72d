//! In-memory blob store.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{BlobError, BlobResult};
use crate::traits::blob::BlobStore;

/// Blob store backed by a sorted map. Data is lost when dropped.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> BlobResult<()> {
        self.blobs.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> BlobResult<Bytes> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list() {
        let store = MemoryBlobStore::new();
        store.put("a.com/graph.json", Bytes::from("{}")).await.unwrap();
        store.put("a.com/bodies/1", Bytes::from("x")).await.unwrap();
        store.put("b.com/graph.json", Bytes::from("{}")).await.unwrap();

        assert_eq!(store.get("a.com/bodies/1").await.unwrap(), Bytes::from("x"));
        assert_eq!(
            store.list("a.com/").await.unwrap(),
            vec!["a.com/bodies/1", "a.com/graph.json"]
        );
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(BlobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let store = MemoryBlobStore::new();
        store.put("k1", Bytes::from("1")).await.unwrap();
        let found = store
            .get_many(&["k1".to_string(), "k2".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("k1"));
    }
}
