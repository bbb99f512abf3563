//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// No usable input or an EDL that fails validation.
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(#[from] beatcut_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] beatcut_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] beatcut_queue::QueueError),

    #[error("EDL error: {0}")]
    Edl(#[from] beatcut_models::EdlError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Input/validation failures, as opposed to tool or transport failures.
    pub fn is_planning(&self) -> bool {
        matches!(self, WorkerError::Planning(_) | WorkerError::Edl(_))
    }

    /// Text stored as the job's `error`. Planning failures keep their bare
    /// message; the "Planning failed" prefix only goes to the job log.
    pub fn job_message(&self) -> String {
        match self {
            WorkerError::Planning(msg) => msg.clone(),
            WorkerError::Edl(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}
