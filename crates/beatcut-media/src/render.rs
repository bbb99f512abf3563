//! EDL rendering.
//!
//! Two phases: every timeline clip is transcoded on its own into a
//! fixed-geometry intermediate, then one compose invocation stitches the
//! intermediates together with the audio branch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use beatcut_models::{Edl, TimelineClip};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{segment_filter, CompositionGraph, SILENCE_SOURCE};

/// File name of the composed output inside the scratch directory.
pub const RENDER_FILE_NAME: &str = "render.mp4";

/// Everything a render needs.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub edl: &'a Edl,
    /// Local file per source asset id.
    pub asset_paths: &'a HashMap<String, PathBuf>,
    /// Local audio track, if one was uploaded.
    pub audio_path: Option<&'a Path>,
    pub scratch_dir: &'a Path,
}

/// Drives ffmpeg to turn an EDL into a finished file.
#[derive(Clone)]
pub struct Renderer {
    runner: FfmpegRunner,
    max_parallel: usize,
}

impl Renderer {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self {
            runner,
            max_parallel: 1,
        }
    }

    /// Transcode up to `n` clips at once. Output is identical for any `n`.
    pub fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    /// Render `request` and return the path of the composed file.
    pub async fn render(&self, request: RenderRequest<'_>) -> MediaResult<PathBuf> {
        let edl = request.edl;
        if edl.timeline.is_empty() {
            return Err(MediaError::invalid_input("EDL timeline is empty"));
        }

        let mut segments = Vec::with_capacity(edl.timeline.len());
        let mut commands = Vec::with_capacity(edl.timeline.len());
        for (i, clip) in edl.timeline.iter().enumerate() {
            let source = request.asset_paths.get(&clip.source_asset_id).ok_or_else(|| {
                MediaError::invalid_input(format!(
                    "Missing asset file for {}",
                    clip.source_asset_id
                ))
            })?;
            let output = request.scratch_dir.join(format!("segment-{}.mp4", i));
            commands.push(segment_command(edl, clip, source, &output));
            segments.push(output);
        }

        info!(
            clips = commands.len(),
            parallel = self.max_parallel,
            "Transcoding timeline clips"
        );
        let transcodes: Vec<_> = commands
            .iter()
            .map(|cmd| self.runner.run(cmd, "segment"))
            .collect();
        stream::iter(transcodes)
            .buffered(self.max_parallel)
            .try_collect::<Vec<()>>()
            .await?;

        let output = request.scratch_dir.join(RENDER_FILE_NAME);
        let compose = compose_command(edl, &segments, request.audio_path, &output);
        self.runner.run(&compose, "compose").await?;

        info!(output = %output.display(), "Render composed");
        Ok(output)
    }
}

/// Trim one clip from its source and normalize geometry and frame rate.
pub fn segment_command(edl: &Edl, clip: &TimelineClip, source: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .seek(clip.in_point)
        .until(clip.out)
        .input(source)
        .no_audio()
        .video_filter(segment_filter(&edl.output, clip.speed))
        .video_codec("libx264")
        .preset("veryfast")
        .crf(18)
}

/// Compose intermediates and audio into the final H.264/AAC file.
pub fn compose_command(
    edl: &Edl,
    segments: &[PathBuf],
    audio_path: Option<&Path>,
    output: &Path,
) -> FfmpegCommand {
    let cmd = segments
        .iter()
        .fold(FfmpegCommand::new(output), |cmd, seg| cmd.input(seg));
    let cmd = match audio_path {
        Some(path) => cmd.input(path),
        None => cmd.lavfi(SILENCE_SOURCE),
    };

    let graph = CompositionGraph::build(edl, audio_path.is_some());

    cmd.filter_complex(graph.to_filter_complex())
        .map(graph.video_output())
        .map(graph.audio_output())
        .video_codec("libx264")
        .preset("veryfast")
        .crf(20)
        .audio_codec("aac")
        .shortest()
        .faststart()
        .duration(edl.output.target_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use beatcut_models::{
        AudioSettings, CaptionSettings, OutputSpec, Transition, EDL_VERSION,
    };

    fn sample_edl() -> Edl {
        Edl {
            version: EDL_VERSION.to_string(),
            output: OutputSpec {
                width: 1080,
                height: 1920,
                fps: 30.0,
                target_duration: 10.0,
            },
            timeline: vec![
                TimelineClip {
                    source_asset_id: "a".into(),
                    in_point: 2.0,
                    out: 6.0,
                    start: 0.0,
                    speed: None,
                    transition: Transition::None,
                },
                TimelineClip {
                    source_asset_id: "b".into(),
                    in_point: 2.5,
                    out: 6.5,
                    start: 4.0,
                    speed: None,
                    transition: Transition::None,
                },
            ],
            captions: CaptionSettings {
                enabled: false,
                font: "Inter".into(),
                size: 22.0,
                position: "bottom".into(),
                texts: vec![],
            },
            audio: AudioSettings {
                use_uploaded_audio: false,
                selected_segment: None,
                normalize: false,
                mix_level: 0.8,
            },
        }
    }

    #[test]
    fn test_segment_command_args() {
        let edl = sample_edl();
        let args = segment_command(
            &edl,
            &edl.timeline[1],
            Path::new("/s/b.mov"),
            Path::new("/tmp/job/segment-1.mp4"),
        )
        .build_args();

        assert_eq!(
            args.join(" "),
            "-y -v error -ss 2.500 -to 6.500 -i /s/b.mov -an -vf \
             scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1,fps=30 \
             -c:v libx264 -preset veryfast -crf 18 /tmp/job/segment-1.mp4"
        );
    }

    #[test]
    fn test_compose_command_with_silence() {
        let edl = sample_edl();
        let segments = vec![PathBuf::from("s0.mp4"), PathBuf::from("s1.mp4")];
        let args = compose_command(&edl, &segments, None, Path::new("render.mp4")).build_args();
        let joined = args.join(" ");

        assert!(joined.starts_with(
            "-y -v error -i s0.mp4 -i s1.mp4 -f lavfi -i anullsrc=channel_layout=stereo:sample_rate=48000 -filter_complex "
        ));
        assert!(joined.contains("-map [vxf0] -map [aout]"));
        assert!(joined.ends_with(
            "-c:v libx264 -preset veryfast -crf 20 -c:a aac -shortest -movflags +faststart -t 10.000 render.mp4"
        ));
    }

    #[test]
    fn test_compose_command_with_uploaded_audio() {
        let mut edl = sample_edl();
        edl.audio.use_uploaded_audio = true;
        let segments = vec![PathBuf::from("s0.mp4"), PathBuf::from("s1.mp4")];
        let args = compose_command(&edl, &segments, Some(Path::new("song.mp3")), Path::new("o.mp4"))
            .build_args();

        assert!(!args.iter().any(|a| a == "lavfi"));
        let fc_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[fc_pos + 1].contains("[2:a]atrim=start=0:end=10,"));
    }

    #[tokio::test]
    async fn test_missing_asset_is_rejected_before_transcoding() {
        let edl = sample_edl();
        let dir = tempfile::tempdir().unwrap();
        let mut paths = HashMap::new();
        paths.insert("a".to_string(), dir.path().join("a.mp4"));

        let renderer = Renderer::new(FfmpegRunner::new(&MediaConfig::default()));
        let err = renderer
            .render(RenderRequest {
                edl: &edl,
                asset_paths: &paths,
                audio_path: None,
                scratch_dir: dir.path(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Missing asset file for b"));
    }

    #[tokio::test]
    async fn test_empty_timeline_is_rejected() {
        let mut edl = sample_edl();
        edl.timeline.clear();
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(FfmpegRunner::new(&MediaConfig::default()));

        let err = renderer
            .render(RenderRequest {
                edl: &edl,
                asset_paths: &HashMap::new(),
                audio_path: None,
                scratch_dir: dir.path(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
