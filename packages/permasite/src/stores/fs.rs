//! Filesystem blob store.
//!
//! Keys map onto relative paths under a root directory. Keys that would
//! escape the root (`..`, absolute paths) are refused.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

use crate::error::{BlobError, BlobResult};
use crate::traits::blob::BlobStore;

/// Blob store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> BlobResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(BlobError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> BlobResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        tracing::trace!(key = %key, bytes = data.len(), "blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> BlobResult<Bytes> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("permasite-fs-{}-{}", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_roundtrip_and_list() {
        let root = temp_root("roundtrip");
        let store = FsBlobStore::new(&root);

        store.put("site/graph.json", Bytes::from("{}")).await.unwrap();
        store.put("site/bodies/abc", Bytes::from("body")).await.unwrap();
        store.put("other/graph.json", Bytes::from("{}")).await.unwrap();

        assert_eq!(store.get("site/bodies/abc").await.unwrap(), Bytes::from("body"));
        assert_eq!(
            store.list("site/").await.unwrap(),
            vec!["site/bodies/abc", "site/graph.json"]
        );

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let store = FsBlobStore::new(temp_root("escape"));
        for key in ["../x", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(store.put(key, Bytes::new()).await, Err(BlobError::InvalidKey { .. })),
                "accepted {key}"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let store = FsBlobStore::new(temp_root("missing"));
        assert!(store.list("").await.unwrap().is_empty());
        assert!(matches!(store.get("x").await, Err(BlobError::NotFound { .. })));
    }
}
