//! FFprobe duration lookup.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::forward_lines;
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::sink::LineSink;

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 10;

/// Probe the container duration of a media file in seconds.
///
/// Everything ffprobe prints is forwarded to `sink`. A missing or
/// unparsable duration yields `0.0`; a failing ffprobe invocation is an
/// error.
pub async fn probe_duration(
    config: &MediaConfig,
    path: impl AsRef<Path>,
    sink: &dyn LineSink,
) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let args = duration_args(path);
    sink.line(&format!("{} {}", config.ffprobe_path, args.join(" ")));
    metrics::counter!("beatcut_ffmpeg_invocations_total", "kind" => "probe").increment(1);

    let mut child = Command::new(&config.ffprobe_path)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MediaError::spawn_failed(&config.ffprobe_path, e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::internal("ffprobe stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("ffprobe stderr not captured"))?;

    let (value, tail) = tokio::join!(
        forward_lines(stdout, sink, 1),
        forward_lines(stderr, sink, STDERR_TAIL_LINES),
    );
    let status = child.wait().await?;

    if !status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", status),
            stderr: (!tail.is_empty()).then(|| tail.join("\n")),
        });
    }

    let duration = parse_duration_output(value.first().map(String::as_str).unwrap_or(""));
    debug!(path = %path.display(), duration, "Probed duration");
    Ok(duration)
}

fn duration_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=nk=1:nw=1".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Parse ffprobe's bare `format=duration` output.
fn parse_duration_output(stdout: &str) -> f64 {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0)
}
