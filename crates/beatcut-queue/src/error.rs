//! Queue error types.

use beatcut_models::{JobId, JobStatus, ProjectId};
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Project {project_id} already has an active job {job_id}")]
    ActiveJobExists { project_id: ProjectId, job_id: JobId },

    #[error("Project {0} has no video assets")]
    NoVideoAssets(ProjectId),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Job {job_id} is {status}, expected PROCESSING")]
    NotProcessing { job_id: JobId, status: JobStatus },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}
