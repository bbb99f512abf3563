//! The job pipeline against in-memory stores.
//!
//! Failure paths that stop before the transcoder run without any tools.
//! The rest use small shell scripts standing in for ffprobe/ffmpeg.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use beatcut_models::{
    stage, Artifact, ArtifactType, Asset, AssetKind, ClaimedJob, Job, JobId, JobStatus,
    NewArtifact, Project, ProjectId,
};
use beatcut_queue::{JobStore, MemoryJobStore, QueueError, QueueResult};
use beatcut_storage::MemoryBlobStore;
use beatcut_worker::{JobPipeline, WorkerConfig};

const FFPROBE: &str = r#"#!/bin/sh
echo "12.000000"
"#;

/// Decodes to four silent frames, writes a stub for every other output.
const FFMPEG: &str = r#"#!/bin/sh
for last; do :; done
case " $* " in
  *" pipe:1 "*)
    echo "decoding" >&2
    head -c 8192 /dev/zero
    ;;
  *" -filter_complex "*)
    echo "composing $last" >&2
    printf 'rendered video\n' > "$last"
    ;;
  *)
    echo "segment $last" >&2
    printf 'segment\n' > "$last"
    ;;
esac
"#;

/// Same as [`FFMPEG`] but the compose step fails.
const FFMPEG_COMPOSE_FAILS: &str = r#"#!/bin/sh
for last; do :; done
case " $* " in
  *" pipe:1 "*)
    head -c 8192 /dev/zero
    ;;
  *" -filter_complex "*)
    echo "Conversion failed!" >&2
    exit 1
    ;;
  *)
    printf 'segment\n' > "$last"
    ;;
esac
"#;

struct Harness {
    store: Arc<MemoryJobStore>,
    blobs: Arc<MemoryBlobStore>,
    work_dir: tempfile::TempDir,
    tools_dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(MemoryJobStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            work_dir: tempfile::tempdir().unwrap(),
            tools_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self) -> WorkerConfig {
        WorkerConfig {
            work_dir: self.work_dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    /// Config pointing at stand-in tools.
    #[cfg(unix)]
    fn config_with_tools(&self, ffmpeg: &str) -> WorkerConfig {
        let mut config = self.config();
        config.media.ffprobe_path = self.write_tool("ffprobe", FFPROBE);
        config.media.ffmpeg_path = self.write_tool("ffmpeg", ffmpeg);
        config
    }

    #[cfg(unix)]
    fn write_tool(&self, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = self.tools_dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    fn pipeline(&self, config: WorkerConfig) -> JobPipeline {
        JobPipeline::new(config, self.store.clone(), self.blobs.clone())
    }

    /// Queue and claim a job for a one-video project.
    async fn claim(&self, upload_blob: bool) -> ClaimedJob {
        let project = Project::new("demo", "", "clean", 1080, 1920, Some(10.0));
        self.claim_project(project, &[("clip one.mp4", AssetKind::Video)], upload_blob)
            .await
    }

    async fn claim_project(
        &self,
        project: Project,
        files: &[(&str, AssetKind)],
        upload_blobs: bool,
    ) -> ClaimedJob {
        self.store.put_project(&project).await.unwrap();
        for (name, kind) in files {
            let content_type = match kind {
                AssetKind::Video => "video/mp4",
                AssetKind::Audio => "audio/mpeg",
            };
            let asset = Asset::new(project.id.clone(), *name, content_type, 4, *kind);
            self.store.add_asset(&asset).await.unwrap();
            if upload_blobs {
                self.blobs
                    .insert(asset.storage_key.clone(), b"fake".to_vec(), content_type)
                    .await;
            }
        }

        self.store.enqueue_job(&project.id).await.unwrap();
        self.store.claim_next_queued_job().await.unwrap().unwrap()
    }

    /// A hype project with two videos and a song.
    async fn claim_full_project(&self) -> ClaimedJob {
        let project = Project::new("promo", "", "hype", 1080, 1920, Some(10.0));
        self.claim_project(
            project,
            &[
                ("a.mp4", AssetKind::Video),
                ("b.mp4", AssetKind::Video),
                ("song.mp3", AssetKind::Audio),
            ],
            true,
        )
        .await
    }

    fn scratch_dir(&self, claimed: &ClaimedJob) -> PathBuf {
        self.work_dir.path().join(format!("job-{}", claimed.job.id))
    }

    async fn artifact_types(&self, claimed: &ClaimedJob) -> Vec<ArtifactType> {
        self.store
            .list_artifacts_for_job(&claimed.job.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.artifact_type)
            .collect()
    }

    async fn job_log(&self, claimed: &ClaimedJob) -> String {
        let key = beatcut_models::keys::log_key(&claimed.project.id, &claimed.job.id);
        let object = self.blobs.get(&key).await.expect("log uploaded");
        assert_eq!(object.content_type, "text/plain");
        String::from_utf8(object.data).unwrap()
    }

    fn assert_work_dir_empty(&self) {
        let leftovers: Vec<_> = std::fs::read_dir(self.work_dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "work dir not empty: {:?}", leftovers);
    }
}

/// Delegates to the memory store but refuses to complete jobs.
struct RejectCompletion(Arc<MemoryJobStore>);

#[async_trait]
impl JobStore for RejectCompletion {
    async fn claim_next_queued_job(&self) -> QueueResult<Option<ClaimedJob>> {
        self.0.claim_next_queued_job().await
    }

    async fn update_job_progress(
        &self,
        job_id: &JobId,
        stage: &str,
        progress: u8,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        self.0.update_job_progress(job_id, stage, progress, log_snippet).await
    }

    async fn mark_job_failed(
        &self,
        job_id: &JobId,
        error: &str,
        log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        self.0.mark_job_failed(job_id, error, log_snippet).await
    }

    async fn mark_job_completed(
        &self,
        _job_id: &JobId,
        _log_snippet: Option<String>,
    ) -> QueueResult<Job> {
        Err(QueueError::corrupt("store unavailable"))
    }

    async fn create_artifact(&self, artifact: NewArtifact) -> QueueResult<Artifact> {
        self.0.create_artifact(artifact).await
    }

    async fn list_artifacts_for_job(&self, job_id: &JobId) -> QueueResult<Vec<Artifact>> {
        self.0.list_artifacts_for_job(job_id).await
    }

    async fn list_assets_for_project(&self, project_id: &ProjectId) -> QueueResult<Vec<Asset>> {
        self.0.list_assets_for_project(project_id).await
    }

    async fn get_project_by_id(&self, project_id: &ProjectId) -> QueueResult<Option<Project>> {
        self.0.get_project_by_id(project_id).await
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        self.0.get_job(job_id).await
    }

    async fn put_project(&self, project: &Project) -> QueueResult<()> {
        self.0.put_project(project).await
    }

    async fn add_asset(&self, asset: &Asset) -> QueueResult<()> {
        self.0.add_asset(asset).await
    }

    async fn enqueue_job(&self, project_id: &ProjectId) -> QueueResult<Job> {
        self.0.enqueue_job(project_id).await
    }
}

#[tokio::test]
async fn test_zero_videos_fails_planning() {
    let harness = Harness::new();
    let mut claimed = harness.claim(true).await;
    claimed.assets.clear();
    let scratch = harness.scratch_dir(&claimed);

    let outcome = harness.pipeline(harness.config()).process(claimed.clone()).await;
    assert_eq!(outcome.status, JobStatus::Failed);
    assert_eq!(outcome.error.as_deref(), Some("No timeline clips planned"));

    let job = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.stage, stage::FAILED);
    assert_eq!(job.progress, 100);
    assert_eq!(job.error.as_deref(), Some("No timeline clips planned"));
    assert!(job.completed_at.is_some());

    // Analysis succeeded before planning failed and is kept.
    assert_eq!(
        harness.artifact_types(&claimed).await,
        vec![ArtifactType::Analysis, ArtifactType::Log]
    );
    let key = beatcut_models::keys::analysis_key(&claimed.project.id, &claimed.job.id);
    let analysis = harness.blobs.get(&key).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&analysis.data).unwrap();
    assert_eq!(json["videos"].as_array().unwrap().len(), 0);

    assert!(job.log_snippet.unwrap().contains("Planning failed: No timeline clips planned"));
    let log = harness.job_log(&claimed).await;
    assert!(log.contains("Claimed job"));
    assert!(log.contains("Planning failed: No timeline clips planned"));

    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_missing_upload_fails_download() {
    let harness = Harness::new();
    let claimed = harness.claim(false).await;
    let scratch = harness.scratch_dir(&claimed);

    let outcome = harness.pipeline(harness.config()).process(claimed.clone()).await;
    assert_eq!(outcome.status, JobStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("Object not found"));

    let job = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.artifact_types(&claimed).await, vec![ArtifactType::Log]);
    assert!(job.log_snippet.unwrap().contains("Error: "));
    assert!(harness.job_log(&claimed).await.contains("Error: "));

    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_missing_ffprobe_fails_analysis() {
    let harness = Harness::new();
    let claimed = harness.claim(true).await;
    let scratch = harness.scratch_dir(&claimed);

    let mut config = harness.config();
    config.media.ffprobe_path = "/nonexistent/beatcut-ffprobe".to_string();
    config.media.ffmpeg_path = "/nonexistent/beatcut-ffmpeg".to_string();

    let outcome = harness.pipeline(config).process(claimed.clone()).await;
    assert_eq!(outcome.status, JobStatus::Failed);

    let job = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(harness.artifact_types(&claimed).await, vec![ArtifactType::Log]);

    let log = harness.job_log(&claimed).await;
    assert!(log.contains("Downloaded clip_one.mp4"));
    assert!(log.contains("Stage analyze (15%)"));

    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_failed_job_is_not_rewritten() {
    let harness = Harness::new();
    let claimed = harness.claim(false).await;
    let pipeline = harness.pipeline(harness.config());

    pipeline.process(claimed.clone()).await;
    let first = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();

    // A second run over the same claim cannot move a terminal job.
    pipeline.process(claimed.clone()).await;
    let second = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(second.status, JobStatus::Failed);
    assert_eq!(second.error, first.error);
    assert_eq!(second.completed_at, first.completed_at);
}

#[tokio::test]
async fn test_scratch_dir_under_work_dir() {
    let harness = Harness::new();
    let claimed = harness.claim(false).await;
    harness.pipeline(harness.config()).process(claimed.clone()).await;

    harness.assert_work_dir_empty();
    assert!(Path::new(harness.work_dir.path()).exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_full_run_completes() {
    let harness = Harness::new();
    let claimed = harness.claim_full_project().await;
    let scratch = harness.scratch_dir(&claimed);
    let config = harness.config_with_tools(FFMPEG);

    let outcome = harness.pipeline(config).process(claimed.clone()).await;
    assert_eq!(outcome.status, JobStatus::Completed, "{:?}", outcome.error);
    assert_eq!(outcome.error, None);

    let job = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stage, stage::COMPLETED);
    assert_eq!(job.progress, 100);
    assert_eq!(job.error, None);
    assert!(job.completed_at.is_some());

    let artifacts = harness
        .store
        .list_artifacts_for_job(&claimed.job.id)
        .await
        .unwrap();
    let types: Vec<_> = artifacts.iter().map(|a| a.artifact_type).collect();
    assert_eq!(
        types,
        vec![
            ArtifactType::Analysis,
            ArtifactType::Edl,
            ArtifactType::Render,
            ArtifactType::Log
        ]
    );
    assert!(artifacts.iter().all(|a| a.size.is_some_and(|s| s > 0)));

    let render_key = beatcut_models::keys::render_key(&claimed.project.id, &claimed.job.id);
    let render = harness.blobs.get(&render_key).await.unwrap();
    assert_eq!(render.content_type, "video/mp4");
    assert_eq!(render.data, b"rendered video\n");

    let edl_key = beatcut_models::keys::edl_key(&claimed.project.id, &claimed.job.id);
    let edl: serde_json::Value =
        serde_json::from_slice(&harness.blobs.get(&edl_key).await.unwrap().data).unwrap();
    let timeline = edl["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[1]["start"], 2.0);
    assert_eq!(timeline[1]["transition"], "crossfade");
    assert_eq!(edl["audio"]["useUploadedAudio"], true);
    assert_eq!(edl["audio"]["mixLevel"], 0.95);

    let log = harness.job_log(&claimed).await;
    for line in [
        "Stage analyze (15%)",
        "Stage plan (40%)",
        "Stage render (65%)",
        "Stage finalize (90%)",
        "decoding",
        "xfade=transition=fade:duration=0.750:offset=2.750",
        "Render complete",
        "Uploading logs",
    ] {
        assert!(log.contains(line), "log missing {:?}:\n{}", line, log);
    }

    assert!(!scratch.exists());
    harness.assert_work_dir_empty();
}

#[cfg(unix)]
#[tokio::test]
async fn test_render_failure_keeps_plan() {
    let harness = Harness::new();
    let claimed = harness.claim_full_project().await;
    let scratch = harness.scratch_dir(&claimed);
    let config = harness.config_with_tools(FFMPEG_COMPOSE_FAILS);

    let outcome = harness.pipeline(config).process(claimed.clone()).await;
    assert_eq!(outcome.status, JobStatus::Failed);

    let job = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.stage, stage::FAILED);
    assert!(job.error.as_deref().unwrap().starts_with("Render failed: "));

    assert_eq!(
        harness.artifact_types(&claimed).await,
        vec![ArtifactType::Analysis, ArtifactType::Edl, ArtifactType::Log]
    );
    let log = harness.job_log(&claimed).await;
    assert!(log.contains("Conversion failed!"));
    assert!(log.contains("Error: Render failed: "));
    assert!(!log.contains("Render complete"));

    assert!(!scratch.exists());
    harness.assert_work_dir_empty();
}

#[cfg(unix)]
#[tokio::test]
async fn test_late_completion_failure_keeps_single_log() {
    let harness = Harness::new();
    let claimed = harness.claim_full_project().await;
    let config = harness.config_with_tools(FFMPEG);
    let store: Arc<dyn JobStore> = Arc::new(RejectCompletion(harness.store.clone()));

    let pipeline = JobPipeline::new(config, store, harness.blobs.clone());
    let outcome = pipeline.process(claimed.clone()).await;
    assert_eq!(outcome.status, JobStatus::Failed);

    let job = harness.store.get_job(&claimed.job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap().contains("store unavailable"));

    assert_eq!(
        harness.artifact_types(&claimed).await,
        vec![
            ArtifactType::Analysis,
            ArtifactType::Edl,
            ArtifactType::Render,
            ArtifactType::Log
        ]
    );
    harness.assert_work_dir_empty();
}
