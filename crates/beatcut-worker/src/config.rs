//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use beatcut_media::{AnalysisConfig, MediaConfig};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent of the per-job scratch directories
    pub work_dir: PathBuf,
    /// Idle sleep between polls that found nothing to claim
    pub poll_interval: Duration,
    /// Lines kept in the per-job log buffer
    pub log_capacity: usize,
    /// Lines copied into the job's log snippet
    pub log_snippet_lines: usize,
    /// Maximum intermediate clip transcodes running at once
    pub max_ffmpeg_processes: usize,
    /// Lifetime of signed download URLs
    pub signed_url_ttl: Duration,
    /// Port for the Prometheus exporter, if enabled
    pub metrics_port: Option<u16>,
    pub media: MediaConfig,
    pub analysis: AnalysisConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/beatcut"),
            poll_interval: Duration::from_millis(2000),
            log_capacity: 80,
            log_snippet_lines: 10,
            max_ffmpeg_processes: 2,
            signed_url_ttl: Duration::from_secs(300),
            metrics_port: None,
            media: MediaConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/beatcut")),
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            log_capacity: std::env::var("WORKER_LOG_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(80),
            log_snippet_lines: std::env::var("WORKER_LOG_SNIPPET_LINES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            max_ffmpeg_processes: std::env::var("WORKER_MAX_FFMPEG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            signed_url_ttl: Duration::from_secs(
                std::env::var("WORKER_SIGNED_URL_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            media: MediaConfig::from_env(),
            analysis: AnalysisConfig::default(),
        }
    }

    /// Scratch directory owned by one job.
    pub fn scratch_dir_for(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(format!("job-{}", job_id))
    }
}
