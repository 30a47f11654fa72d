//! In-process content-addressed storage.

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::traits::storage::{StorageClient, Tag};

/// A stored object with its metadata.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
    pub tags: Vec<Tag>,
}

/// Storage that keeps objects in memory.
///
/// Identifiers are derived from the content type and bytes, so identical
/// uploads share an identifier. Used for `--dry-run` publishing.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier an upload of `data` as `content_type` would receive.
    pub fn object_id(data: &[u8], content_type: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content_type.as_bytes());
        hasher.update([0u8]);
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    pub async fn object(&self, id: &str) -> Option<StoredObject> {
        self.objects.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Total stored bytes.
    pub async fn total_bytes(&self) -> usize {
        self.objects.read().await.values().map(|o| o.data.len()).sum()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn put(&self, data: Bytes, content_type: &str, tags: &[Tag]) -> StorageResult<String> {
        let id = Self::object_id(&data, content_type);
        self.objects
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| StoredObject {
                data,
                content_type: content_type.to_string(),
                tags: tags.to_vec(),
            });
        Ok(id)
    }

    async fn get(&self, id: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .await
            .get(id)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
