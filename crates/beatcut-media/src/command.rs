//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::sink::{LineSink, NullSink, SharedSink};

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One `-i` entry together with the options that precede it.
#[derive(Debug, Clone)]
struct InputSpec {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands with any number of inputs.
///
/// Input options (`seek`, `until`, `format`) are buffered and attached to
/// the next `input` call, mirroring FFmpeg's own positional rules.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<InputSpec>,
    pending_input_args: Vec<String>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            pending_input_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add an option for the next input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.pending_input_args.push(arg.into());
        self
    }

    /// Start reading the next input at `seconds`.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Stop reading the next input at `seconds`.
    pub fn until(self, seconds: f64) -> Self {
        self.input_arg("-to").input_arg(format!("{:.3}", seconds))
    }

    /// Force the demuxer of the next input.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Add a file input, consuming any pending input options.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        let source = path.as_ref().to_string_lossy().to_string();
        self.push_input(source)
    }

    /// Add a lavfi source graph as an input.
    pub fn lavfi(self, graph: impl Into<String>) -> Self {
        self.format("lavfi").push_input(graph.into())
    }

    fn push_input(mut self, source: String) -> Self {
        let args = std::mem::take(&mut self.pending_input_args);
        self.inputs.push(InputSpec { args, source });
        self
    }

    /// Add output arguments (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or graph label into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Drop audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Cap the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// End the output with the shortest stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands. Tool output is streamed line by line into
/// the configured sink.
#[derive(Clone)]
pub struct FfmpegRunner {
    program: String,
    sink: SharedSink,
}

impl FfmpegRunner {
    /// Create a runner for the configured ffmpeg binary.
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            sink: std::sync::Arc::new(NullSink),
        }
    }

    /// Forward stdout/stderr lines to `sink`.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Run an FFmpeg command. `kind` labels the invocation in metrics.
    pub async fn run(&self, cmd: &FfmpegCommand, kind: &'static str) -> MediaResult<()> {
        let args = cmd.build_args();
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!("Running FFmpeg: {}", command_line);
        self.sink.line(&command_line);
        metrics::counter!("beatcut_ffmpeg_invocations_total", "kind" => kind).increment(1);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::spawn_failed(&self.program, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;

        // Runs to completion; there is no per-invocation deadline.
        let (_, tail) = tokio::join!(
            forward_lines(stdout, self.sink.as_ref(), 0),
            forward_lines(stderr, self.sink.as_ref(), STDERR_TAIL_LINES),
        );
        let status = child.wait().await?;

        if status.success() {
            Ok(())
        } else {
            let stderr = (!tail.is_empty()).then(|| tail.join("\n"));
            Err(MediaError::ffmpeg_failed(
                format!("ffmpeg {} exited with {}", kind, status),
                stderr,
                status.code(),
            ))
        }
    }
}

/// Copy every line of `reader` into `sink`, returning the last `keep` lines.
pub(crate) async fn forward_lines<R>(reader: R, sink: &dyn LineSink, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail = VecDeque::with_capacity(keep);

    while let Ok(Some(line)) = lines.next_line().await {
        sink.line(&line);
        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    tail.into()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg(config: &MediaConfig) -> MediaResult<PathBuf> {
    which::which(&config.ffmpeg_path)
        .map_err(|_| MediaError::FfmpegNotFound(config.ffmpeg_path.clone()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe(config: &MediaConfig) -> MediaResult<PathBuf> {
    which::which(&config.ffprobe_path)
        .map_err(|_| MediaError::FfprobeNotFound(config.ffprobe_path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_input_options_attach_to_next_input() {
        let cmd = FfmpegCommand::new("out.mp4")
            .seek(1.5)
            .until(4.25)
            .input("a.mp4")
            .input("b.mp4")
            .video_codec("libx264")
            .crf(18);

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-ss", "1.500", "-to", "4.250", "-i", "a.mp4", "-i", "b.mp4",
                "-c:v", "libx264", "-crf", "18", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_lavfi_input() {
        let args = FfmpegCommand::new("o.mp4")
            .lavfi("anullsrc=channel_layout=stereo:sample_rate=48000")
            .build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(&args[i - 2..i], ["-f", "lavfi"]);
        assert_eq!(args[i + 1], "anullsrc=channel_layout=stereo:sample_rate=48000");
    }

    #[test]
    fn test_output_flags() {
        let args = FfmpegCommand::new("render.mp4")
            .input("seg.mp4")
            .map("[vout]")
            .shortest()
            .faststart()
            .duration(30.0)
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-map [vout] -shortest -movflags +faststart -t 30.000 render.mp4"));
    }

    #[tokio::test]
    async fn test_forward_lines_keeps_tail() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = move |line: &str| captured.lock().unwrap().push(line.to_string());

        let input: &[u8] = b"one\ntwo\nthree\n";
        let tail = forward_lines(input, &sink, 2).await;

        assert_eq!(tail, vec!["two", "three"]);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let config = MediaConfig {
            ffmpeg_path: "/nonexistent/beatcut-ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        };
        let runner = FfmpegRunner::new(&config);
        let cmd = FfmpegCommand::new("out.mp4").input("in.mp4");

        let err = runner.run(&cmd, "test").await.unwrap_err();
        assert!(matches!(err, MediaError::SpawnFailed { .. }));
    }
}
