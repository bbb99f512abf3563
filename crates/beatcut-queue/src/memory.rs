//! In-process job store.
//!
//! Each operation runs inside one critical section, which gives the same
//! atomicity the Redis scripts provide. Used by tests and single-process
//! deployments.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use beatcut_models::{
    Artifact, Asset, AssetKind, ClaimedJob, Job, JobId, JobStatus, NewArtifact, Project, ProjectId,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

#[derive(Debug, Default)]
struct Inner {
    projects: HashMap<ProjectId, Project>,
    assets: HashMap<ProjectId, Vec<Asset>>,
    jobs: HashMap<JobId, Job>,
    /// Ids waiting to be claimed, oldest first.
    queued: VecDeque<JobId>,
    artifacts: HashMap<JobId, Vec<Artifact>>,
}

impl Inner {
    fn processing_job(&mut self, job_id: &JobId) -> QueueResult<&mut Job> {
        let job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;
        if job.status != JobStatus::Processing {
            return Err(QueueError::NotProcessing {
                job_id: job_id.clone(),
                status: job.status,
            });
        }
        Ok(job)
    }
}

/// Job store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn claim_next_queued_job(&self) -> QueueResult<Option<ClaimedJob>> {
        let mut inner = self.inner.lock().await;

        // Ids whose job is gone or no longer QUEUED are dropped on the way.
        let (job_id, job) = loop {
            let Some(job_id) = inner.queued.pop_front() else {
                return Ok(None);
            };
            if let Some(job) = inner
                .jobs
                .get_mut(&job_id)
                .filter(|j| j.status == JobStatus::Queued)
            {
                job.mark_claimed(Utc::now());
                break (job_id, job.clone());
            }
        };

        let Some(project) = inner.projects.get(&job.project_id).cloned() else {
            warn!(job_id = %job.id, "Claimed job references a missing project");
            if let Some(job) = inner.jobs.get_mut(&job_id) {
                job.fail("Project not found", None);
            }
            return Ok(None);
        };
        let assets = inner.assets.get(&job.project_id).cloned().unwrap_or_default();

        debug!(job_id = %job.id, "Claimed job");
        Ok(Some(ClaimedJob {
            job,
            project,
            assets,
        }))
    }

    async fn update_job_progress(
        &self,
        job_id: &JobId,
        stage: &str,
        progress: u8,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        let mut inner = self.inner.lock().await;
        let job = inner.processing_job(job_id)?;
        job.set_progress(stage, progress, log_snippet);
        Ok(job.clone())
    }

    async fn mark_job_failed(
        &self,
        job_id: &JobId,
        error: &str,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        let mut inner = self.inner.lock().await;
        let job = inner.processing_job(job_id)?;
        job.fail(error, log_snippet);
        Ok(job.clone())
    }

    async fn mark_job_completed(
        &self,
        job_id: &JobId,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        let mut inner = self.inner.lock().await;
        let job = inner.processing_job(job_id)?;
        job.complete(log_snippet);
        Ok(job.clone())
    }

    async fn create_artifact(&self, artifact: NewArtifact) -> QueueResult<Artifact> {
        let artifact = artifact.into_artifact();
        let mut inner = self.inner.lock().await;
        inner
            .artifacts
            .entry(artifact.job_id.clone())
            .or_default()
            .push(artifact.clone());
        Ok(artifact)
    }

    async fn list_artifacts_for_job(&self, job_id: &JobId) -> QueueResult<Vec<Artifact>> {
        let inner = self.inner.lock().await;
        Ok(inner.artifacts.get(job_id).cloned().unwrap_or_default())
    }

    async fn list_assets_for_project(&self, project_id: &ProjectId) -> QueueResult<Vec<Asset>> {
        let inner = self.inner.lock().await;
        Ok(inner.assets.get(project_id).cloned().unwrap_or_default())
    }

    async fn get_project_by_id(&self, project_id: &ProjectId) -> QueueResult<Option<Project>> {
        Ok(self.inner.lock().await.projects.get(project_id).cloned())
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        Ok(self.inner.lock().await.jobs.get(job_id).cloned())
    }

    async fn put_project(&self, project: &Project) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        inner.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn add_asset(&self, asset: &Asset) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.projects.contains_key(&asset.project_id) {
            return Err(QueueError::ProjectNotFound(asset.project_id.clone()));
        }
        inner
            .assets
            .entry(asset.project_id.clone())
            .or_default()
            .push(asset.clone());
        Ok(())
    }

    async fn enqueue_job(&self, project_id: &ProjectId) -> QueueResult<Job> {
        let mut inner = self.inner.lock().await;

        if !inner.projects.contains_key(project_id) {
            return Err(QueueError::ProjectNotFound(project_id.clone()));
        }
        if let Some(active) = inner
            .jobs
            .values()
            .find(|j| &j.project_id == project_id && j.status.is_active())
        {
            return Err(QueueError::ActiveJobExists {
                project_id: project_id.clone(),
                job_id: active.id.clone(),
            });
        }
        let has_video = inner
            .assets
            .get(project_id)
            .is_some_and(|assets| assets.iter().any(|a| a.kind == AssetKind::Video));
        if !has_video {
            return Err(QueueError::NoVideoAssets(project_id.clone()));
        }

        let job = Job::queued(project_id.clone());
        inner.queued.push_back(job.id.clone());
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }
}
