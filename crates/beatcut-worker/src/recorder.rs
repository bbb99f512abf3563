//! Persist stage outputs and register them as artifacts.

use std::path::Path;
use std::sync::Arc;

use beatcut_models::{keys, Artifact, ArtifactType, JobId, NewArtifact, ProjectId};
use beatcut_queue::JobStore;
use beatcut_storage::BlobStore;
use tracing::debug;

use crate::error::WorkerResult;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const LOG_CONTENT_TYPE: &str = "text/plain";
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Uploads one job's outputs and appends the matching artifact records.
#[derive(Clone)]
pub struct ArtifactRecorder {
    blobs: Arc<dyn BlobStore>,
    store: Arc<dyn JobStore>,
    project_id: ProjectId,
    job_id: JobId,
}

impl ArtifactRecorder {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        store: Arc<dyn JobStore>,
        project_id: ProjectId,
        job_id: JobId,
    ) -> Self {
        Self {
            blobs,
            store,
            project_id,
            job_id,
        }
    }

    /// Storage key of an artifact type for this job.
    pub fn key_for(&self, artifact_type: ArtifactType) -> String {
        match artifact_type {
            ArtifactType::Analysis => keys::analysis_key(&self.project_id, &self.job_id),
            ArtifactType::Edl => keys::edl_key(&self.project_id, &self.job_id),
            ArtifactType::Log => keys::log_key(&self.project_id, &self.job_id),
            ArtifactType::Render => keys::render_key(&self.project_id, &self.job_id),
        }
    }

    /// Upload an in-memory document.
    pub async fn record_bytes(
        &self,
        artifact_type: ArtifactType,
        data: Vec<u8>,
        content_type: &str,
    ) -> WorkerResult<Artifact> {
        let key = self.key_for(artifact_type);
        let size = self.blobs.upload_bytes(&key, data, content_type).await?;
        self.register(artifact_type, key, content_type, size).await
    }

    /// Stream a local file to storage.
    pub async fn record_file(
        &self,
        artifact_type: ArtifactType,
        path: &Path,
        content_type: &str,
    ) -> WorkerResult<Artifact> {
        let key = self.key_for(artifact_type);
        let size = self.blobs.upload_file(&key, path, content_type).await?;
        self.register(artifact_type, key, content_type, size).await
    }

    /// Short-lived download link for a recorded artifact.
    pub async fn signed_url(&self, artifact: &Artifact, ttl: std::time::Duration) -> WorkerResult<String> {
        Ok(self.blobs.signed_download_url(&artifact.storage_key, ttl).await?)
    }

    async fn register(
        &self,
        artifact_type: ArtifactType,
        storage_key: String,
        content_type: &str,
        size: u64,
    ) -> WorkerResult<Artifact> {
        let artifact = self
            .store
            .create_artifact(NewArtifact {
                project_id: self.project_id.clone(),
                job_id: self.job_id.clone(),
                artifact_type,
                storage_key,
                content_type: content_type.to_string(),
                size: Some(size),
            })
            .await?;
        debug!(
            job_id = %self.job_id,
            artifact_type = %artifact_type,
            key = %artifact.storage_key,
            size,
            "Recorded artifact"
        );
        Ok(artifact)
    }
}
