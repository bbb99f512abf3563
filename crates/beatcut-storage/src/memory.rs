//! In-process blob store for tests and local runs.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::blob::BlobStore;
use crate::error::{StorageError, StorageResult};

/// A stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Keeps every object in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly.
    pub async fn insert(&self, key: impl Into<String>, data: Vec<u8>, content_type: &str) {
        self.objects.write().await.insert(
            key.into(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn download_to_file(&self, key: &str, path: &Path) -> StorageResult<u64> {
        let object = self.get(key).await.ok_or_else(|| StorageError::not_found(key))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &object.data).await?;
        Ok(object.data.len() as u64)
    }

    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<u64> {
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(key, data, content_type).await
    }

    async fn upload_bytes(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<u64> {
        let size = data.len() as u64;
        self.insert(key, data, content_type).await;
        Ok(size)
    }

    async fn signed_download_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::not_found(key));
        }
        Ok(format!("memory://{}?expires={}", key, ttl.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_download() {
        let store = MemoryBlobStore::new();
        let dir = tempfile::tempdir().unwrap();

        let size = store
            .upload_bytes("projects/p/edl/j.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        assert_eq!(size, 2);

        let target = dir.path().join("nested/edl.json");
        let written = store
            .download_to_file("projects/p/edl/j.json", &target)
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_upload_file_records_content_type() {
        let store = MemoryBlobStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.mp4");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let size = store.upload_file("r.mp4", &path, "video/mp4").await.unwrap();
        assert_eq!(size, 64);
        assert_eq!(store.get("r.mp4").await.unwrap().content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryBlobStore::new();
        let dir = tempfile::tempdir().unwrap();

        let err = store
            .download_to_file("nope", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(store
            .signed_download_url("nope", Duration::from_secs(60))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_signed_url_carries_ttl() {
        let store = MemoryBlobStore::new();
        store.insert("k", vec![1], "text/plain").await;
        let url = tokio_test::assert_ok!(store.signed_download_url("k", Duration::from_secs(300)).await);
        assert_eq!(url, "memory://k?expires=300");
    }
}
