//! The persistent store consumed by the pipeline.

use async_trait::async_trait;
use beatcut_models::{Artifact, Asset, ClaimedJob, Job, JobId, NewArtifact, Project, ProjectId};

use crate::error::QueueResult;

/// Jobs, projects, assets and artifacts.
///
/// Every mutation is a single atomic operation on the backing store. Job
/// status only moves QUEUED → PROCESSING → {COMPLETED, FAILED}; the
/// terminal states are never rewritten.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically move the oldest QUEUED job to PROCESSING and return it
    /// with its project and assets. `None` when nothing is queued.
    ///
    /// Two concurrent callers never receive the same job.
    async fn claim_next_queued_job(&self) -> QueueResult<Option<ClaimedJob>>;

    /// Record stage/progress of a PROCESSING job. Progress is clamped to 100;
    /// a `None` snippet keeps the previous one.
    async fn update_job_progress(
        &self,
        job_id: &JobId,
        stage: &str,
        progress: u8,
        log_snippet: Option<String>,
    ) -> QueueResult<Job>;

    /// PROCESSING → FAILED.
    async fn mark_job_failed(
        &self,
        job_id: &JobId,
        error: &str,
        log_snippet: Option<String>,
    ) -> QueueResult<Job>;

    /// PROCESSING → COMPLETED.
    async fn mark_job_completed(&self, job_id: &JobId, log_snippet: Option<String>)
        -> QueueResult<Job>;

    /// Append an artifact record.
    async fn create_artifact(&self, artifact: NewArtifact) -> QueueResult<Artifact>;

    /// Artifacts of a job in creation order.
    async fn list_artifacts_for_job(&self, job_id: &JobId) -> QueueResult<Vec<Artifact>>;

    /// Assets of a project in upload order.
    async fn list_assets_for_project(&self, project_id: &ProjectId) -> QueueResult<Vec<Asset>>;

    async fn get_project_by_id(&self, project_id: &ProjectId) -> QueueResult<Option<Project>>;

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>>;

    /// Create or replace a project.
    async fn put_project(&self, project: &Project) -> QueueResult<()>;

    /// Register an uploaded asset. The project must exist.
    async fn add_asset(&self, asset: &Asset) -> QueueResult<()>;

    /// Queue a new job for a project.
    ///
    /// Fails with `ActiveJobExists` while the project has a QUEUED or
    /// PROCESSING job, and with `NoVideoAssets` when there is nothing to cut.
    async fn enqueue_job(&self, project_id: &ProjectId) -> QueueResult<Job>;
}
