//! Per-job pipeline.
//!
//! ```text
//!   download -> analyze (15%) -> plan (40%) -> render (65%) -> finalize (90%)
//!      |            |               |              |               |
//!      |        ANALYSIS           EDL          RENDER            LOG
//!      +------------------ any error: FAILED + LOG -----------------+
//! ```
//!
//! Every stage runs sequentially inside one task. Whatever happens, the
//! job ends COMPLETED or FAILED and its scratch directory is removed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use beatcut_media::{analyze_assets, AssetFile, FfmpegRunner, RenderRequest, Renderer, SharedSink};
use beatcut_models::{sanitize_filename, stage, ArtifactType, ClaimedJob, JobId, JobStatus};
use beatcut_queue::JobStore;
use beatcut_storage::BlobStore;
use tracing::{debug, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::{JobLogger, LogBuffer};
use crate::planner::build_edl;
use crate::recorder::{ArtifactRecorder, JSON_CONTENT_TYPE, LOG_CONTENT_TYPE, VIDEO_CONTENT_TYPE};
use crate::scratch::ScratchDir;

/// How a processed job ended.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    pub error: Option<String>,
}

/// State shared by the stages of one job.
struct JobRun<'a> {
    claimed: &'a ClaimedJob,
    log: Arc<LogBuffer>,
    recorder: ArtifactRecorder,
    logger: JobLogger,
    /// Set once the LOG artifact exists, so a late failure does not add a second one.
    log_recorded: AtomicBool,
}

impl JobRun<'_> {
    fn job_id(&self) -> &JobId {
        &self.claimed.job.id
    }

    async fn record_log(&self) -> WorkerResult<()> {
        self.recorder
            .record_bytes(ArtifactType::Log, self.log.contents().into_bytes(), LOG_CONTENT_TYPE)
            .await?;
        self.log_recorded.store(true, Ordering::Release);
        Ok(())
    }
}

/// Runs claimed jobs to a terminal state.
#[derive(Clone)]
pub struct JobPipeline {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
}

impl JobPipeline {
    pub fn new(config: WorkerConfig, store: Arc<dyn JobStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            config,
            store,
            blobs,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Process a claimed job. Never returns an error: failures are
    /// recorded on the job itself.
    pub async fn process(&self, claimed: ClaimedJob) -> JobOutcome {
        let logger = JobLogger::new(&claimed.job.id, "render_edit");
        let span = logger.create_span();
        self.process_inner(&claimed, logger).instrument(span).await
    }

    async fn process_inner(&self, claimed: &ClaimedJob, logger: JobLogger) -> JobOutcome {
        let job_id = claimed.job.id.clone();
        let project_id = claimed.project.id.clone();

        let log = Arc::new(LogBuffer::new(
            self.config.log_capacity,
            self.config.log_snippet_lines,
        ));
        log.push(&format!("Claimed job {} for project {}", job_id, project_id));
        logger.log_start(&format!("project {} with {} assets", project_id, claimed.assets.len()));

        let run = JobRun {
            claimed,
            log,
            recorder: ArtifactRecorder::new(
                self.blobs.clone(),
                self.store.clone(),
                project_id,
                job_id.clone(),
            ),
            logger,
            log_recorded: AtomicBool::new(false),
        };

        let scratch_path = self.config.scratch_dir_for(job_id.as_str());
        match ScratchDir::create(scratch_path).await {
            Ok(scratch) => {
                let result = self.run_stages(&run, &scratch).await;
                let outcome = self.settle(&run, result).await;
                if !scratch.remove().await {
                    run.logger.log_warning("Scratch directory was not removed");
                }
                outcome
            }
            Err(e) => self.settle(&run, Err(e.into())).await,
        }
    }

    async fn run_stages(&self, run: &JobRun<'_>, scratch: &ScratchDir) -> WorkerResult<()> {
        let sink: SharedSink = run.log.clone();

        // Download
        let started = Instant::now();
        let mut files = Vec::with_capacity(run.claimed.assets.len());
        let mut paths: HashMap<String, PathBuf> = HashMap::new();
        for asset in &run.claimed.assets {
            let path = scratch.join(format!("{}-{}", asset.id, sanitize_filename(&asset.filename)));
            let bytes = self.blobs.download_to_file(&asset.storage_key, &path).await?;
            run.log.push(&format!("Downloaded {} ({} bytes)", asset.filename, bytes));
            paths.insert(asset.id.clone(), path.clone());
            files.push(AssetFile {
                id: asset.id.clone(),
                path,
                kind: asset.kind,
            });
        }
        record_stage("download", started);

        // Analyze
        self.advance(run, stage::ANALYZE, 15).await?;
        let started = Instant::now();
        let analysis = analyze_assets(&self.config.media, &self.config.analysis, &files, sink.clone()).await?;
        run.log.push("Analysis complete");
        run.recorder
            .record_bytes(
                ArtifactType::Analysis,
                serde_json::to_vec_pretty(&analysis)?,
                JSON_CONTENT_TYPE,
            )
            .await?;
        record_stage(stage::ANALYZE, started);

        // Plan
        self.advance(run, stage::PLAN, 40).await?;
        let started = Instant::now();
        let edl = build_edl(&run.claimed.project, &run.claimed.assets, &analysis)?;
        run.log.push(&format!(
            "Planned {} clips for {:.1}s",
            edl.timeline.len(),
            edl.output.target_duration
        ));
        run.recorder
            .record_bytes(ArtifactType::Edl, edl.to_json_pretty()?.into_bytes(), JSON_CONTENT_TYPE)
            .await?;
        record_stage(stage::PLAN, started);

        // Render
        self.advance(run, stage::RENDER, 65).await?;
        let started = Instant::now();
        let runner = FfmpegRunner::new(&self.config.media).with_sink(sink);
        let renderer = Renderer::new(runner).with_max_parallel(self.config.max_ffmpeg_processes);
        let audio_path = analysis
            .audio
            .as_ref()
            .and_then(|audio| paths.get(&audio.asset_id))
            .map(PathBuf::as_path);
        let output = renderer
            .render(RenderRequest {
                edl: &edl,
                asset_paths: &paths,
                audio_path,
                scratch_dir: scratch.path(),
            })
            .await
            .map_err(|e| WorkerError::render(e.to_string()))?;
        run.log.push("Render complete");
        let render = run
            .recorder
            .record_file(ArtifactType::Render, &output, VIDEO_CONTENT_TYPE)
            .await?;
        record_stage(stage::RENDER, started);

        // Finalize
        self.advance(run, stage::FINALIZE, 90).await?;
        match run.recorder.signed_url(&render, self.config.signed_url_ttl).await {
            Ok(url) => debug!(job_id = %run.job_id(), url = %url, "Render download link"),
            Err(e) => run.logger.log_warning(&format!("Could not sign render URL: {}", e)),
        }
        run.log.push("Uploading logs");
        run.record_log().await?;
        self.store
            .mark_job_completed(run.job_id(), Some(run.log.snippet()))
            .await?;

        Ok(())
    }

    /// Checkpoint a stage with the current log tail.
    async fn advance(&self, run: &JobRun<'_>, stage: &str, progress: u8) -> WorkerResult<()> {
        run.log.push(&format!("Stage {} ({}%)", stage, progress));
        self.store
            .update_job_progress(run.job_id(), stage, progress, Some(run.log.snippet()))
            .await?;
        run.logger.log_progress(&format!("{} {}%", stage, progress));
        Ok(())
    }

    async fn settle(&self, run: &JobRun<'_>, result: WorkerResult<()>) -> JobOutcome {
        match result {
            Ok(()) => {
                metrics::counter!("beatcut_jobs_completed_total").increment(1);
                run.logger.log_completion("render uploaded");
                JobOutcome {
                    job_id: run.job_id().clone(),
                    status: JobStatus::Completed,
                    error: None,
                }
            }
            Err(err) => {
                metrics::counter!("beatcut_jobs_failed_total").increment(1);
                let message = err.job_message();
                self.fail(run, &err, &message).await;
                JobOutcome {
                    job_id: run.job_id().clone(),
                    status: JobStatus::Failed,
                    error: Some(message),
                }
            }
        }
    }

    /// Mark the job FAILED, then try to keep the log.
    async fn fail(&self, run: &JobRun<'_>, err: &WorkerError, message: &str) {
        run.logger.log_error(&err.to_string());
        if err.is_planning() {
            run.log.push(&format!("Planning failed: {}", message));
        } else {
            run.log.push(&format!("Error: {}", message));
        }

        if let Err(e) = self
            .store
            .mark_job_failed(run.job_id(), message, Some(run.log.snippet()))
            .await
        {
            run.logger.log_warning(&format!("Failed to mark job failed: {}", e));
        }

        if run.log_recorded.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = run.record_log().await {
            run.logger.log_warning(&format!("Failed to upload job log: {}", e));
        }
    }
}

fn record_stage(stage: &'static str, started: Instant) {
    metrics::histogram!("beatcut_stage_duration_seconds", "stage" => stage)
        .record(started.elapsed().as_secs_f64());
}
