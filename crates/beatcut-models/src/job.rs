//! Render job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Asset, Project, ProjectId};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
///
/// `Queued -> Processing -> {Completed, Failed}`; the terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Waiting for a worker to claim it
    #[default]
    Queued,
    /// Claimed by exactly one worker
    Processing,
    /// Render finished and uploaded
    Completed,
    /// A stage failed; `error` holds the message
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Queued and processing jobs count against the one-active-job-per-project rule.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Stage labels written alongside progress updates.
pub mod stage {
    pub const QUEUED: &str = "queued";
    pub const ANALYZE: &str = "analyze";
    pub const PLAN: &str = "plan";
    pub const RENDER: &str = "render";
    pub const FINALIZE: &str = "finalize";
    pub const FAILED: &str = "failed";
    pub const COMPLETED: &str = "completed";
}

/// A render job for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    pub status: JobStatus,
    /// Free-text stage label, see [`stage`]
    pub stage: String,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub error: Option<String>,
    /// Last lines of the job log
    pub log_snippet: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a freshly queued job.
    pub fn queued(project_id: ProjectId) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            project_id,
            status: JobStatus::Queued,
            stage: stage::QUEUED.to_string(),
            progress: 0,
            error: None,
            log_snippet: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply the claim transition (QUEUED -> PROCESSING).
    pub fn mark_claimed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.stage = stage::ANALYZE.to_string();
        self.progress = 0;
        self.started_at = Some(now);
        self.updated_at = now;
    }

    /// Record a stage/progress checkpoint.
    pub fn set_progress(&mut self, stage: &str, progress: u8, log_snippet: Option<String>) {
        self.stage = stage.to_string();
        self.progress = progress.min(100);
        if log_snippet.is_some() {
            self.log_snippet = log_snippet;
        }
        self.updated_at = Utc::now();
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>, log_snippet: Option<String>) {
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.stage = stage::FAILED.to_string();
        self.progress = 100;
        self.error = Some(error.into());
        if log_snippet.is_some() {
            self.log_snippet = log_snippet;
        }
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Mark job as completed.
    pub fn complete(&mut self, log_snippet: Option<String>) {
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.stage = stage::COMPLETED.to_string();
        self.progress = 100;
        if log_snippet.is_some() {
            self.log_snippet = log_snippet;
        }
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

/// A job won by the claim operation, together with its inputs.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: Job,
    pub project: Project,
    /// Project assets in creation order
    pub assets: Vec<Asset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        assert_eq!("FAILED".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("failed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_state_machine() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Queued.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(Queued.is_active() && Processing.is_active());
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_lifecycle_fields() {
        let mut job = Job::queued(ProjectId::from("p1"));
        assert_eq!(job.stage, stage::QUEUED);

        job.mark_claimed(Utc::now());
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.stage, stage::ANALYZE);
        assert!(job.started_at.is_some());

        job.set_progress(stage::RENDER, 250, Some("line".into()));
        assert_eq!(job.progress, 100);
        assert_eq!(job.log_snippet.as_deref(), Some("line"));

        job.fail("boom", None);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.stage, stage::FAILED);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert_eq!(job.log_snippet.as_deref(), Some("line"));
        assert!(job.completed_at.is_some());
    }
}
