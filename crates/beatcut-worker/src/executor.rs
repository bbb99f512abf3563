//! Job executor: the worker's poll loop.

use std::sync::Arc;

use beatcut_queue::JobStore;
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::WorkerResult;
use crate::pipeline::{JobOutcome, JobPipeline};

/// Polls the store, claims one job at a time and runs it to completion.
///
/// Workers coordinate only through the store's atomic claim, so any number
/// of executors may run against the same store.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    pipeline: JobPipeline,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(store: Arc<dyn JobStore>, pipeline: JobPipeline) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            pipeline,
            shutdown,
        }
    }

    /// Start the executor. Returns after [`JobExecutor::shutdown`]; a job in
    /// flight is finished first.
    pub async fn run(&self) -> WorkerResult<()> {
        let config = self.pipeline.config();
        info!(
            "Starting job executor (work_dir={}, poll_interval={:?})",
            config.work_dir.display(),
            config.poll_interval
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            match self.poll_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!("Failed to claim job: {}", e),
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = tokio::time::sleep(config.poll_interval) => {}
            }
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Claim and process at most one job.
    pub async fn poll_once(&self) -> WorkerResult<Option<JobOutcome>> {
        let Some(claimed) = self.store.claim_next_queued_job().await? else {
            return Ok(None);
        };

        metrics::counter!("beatcut_jobs_claimed_total").increment(1);
        info!(
            job_id = %claimed.job.id,
            project_id = %claimed.project.id,
            "Claimed job"
        );

        let outcome = self.pipeline.process(claimed).await;
        info!(
            job_id = %outcome.job_id,
            status = %outcome.status,
            "Job finished"
        );
        Ok(Some(outcome))
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Handle for signalling shutdown from another task.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }
}
