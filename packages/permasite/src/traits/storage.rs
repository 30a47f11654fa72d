//! Content-addressed storage network client.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// Metadata attached to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Put bytes, get back an identifier.
///
/// Objects are immutable: every successful `put` yields an identifier that
/// permanently addresses exactly those bytes.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Store `data` and return its identifier.
    async fn put(&self, data: Bytes, content_type: &str, tags: &[Tag]) -> StorageResult<String>;

    /// Read an object back.
    async fn get(&self, id: &str) -> StorageResult<Bytes>;

    /// Client name for logs.
    fn name(&self) -> &str {
        "storage"
    }
}
