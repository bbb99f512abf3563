//! Blob storage abstraction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Object storage used by the pipeline for uploads and artifacts.
///
/// Each call is a single request/response; sizes returned are the number of
/// bytes transferred.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download `key` into `path`, creating parent directories.
    async fn download_to_file(&self, key: &str, path: &Path) -> StorageResult<u64>;

    /// Stream a local file to `key`.
    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<u64>;

    /// Store an in-memory buffer at `key`.
    async fn upload_bytes(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> StorageResult<u64>;

    /// Time-limited GET URL for `key`.
    async fn signed_download_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;
}
