//! Plan builder: project + assets + analysis -> EDL.
//!
//! Pure and deterministic. The same inputs always produce the same
//! document, byte for byte once serialized.

use std::collections::HashSet;

use beatcut_models::{
    round_to, AnalysisResult, Asset, AudioSettings, CaptionSettings, CaptionText, Edl,
    OutputSpec, Project, StylePreset, TimeRange, TimelineClip, Transition, EDL_VERSION,
};

use crate::error::{WorkerError, WorkerResult};

/// Target duration when the project does not set one.
pub const DEFAULT_TARGET_SECS: f64 = 30.0;

pub const OUTPUT_FPS: f64 = 30.0;

/// Shortest sub-clip taken from a long enough source.
const MIN_SEGMENT_SECS: f64 = 1.5;

/// Smallest cursor advance per clip.
const MIN_ADVANCE_SECS: f64 = 0.3;

/// Mix level when no music was uploaded.
const DEFAULT_MIX_LEVEL: f64 = 0.8;

const CAPTION_SECS: f64 = 2.0;

/// Build and validate the EDL for one job.
///
/// Video assets are walked in the given order (creation order from the
/// store). Fails with [`WorkerError::Planning`] when no clip could be
/// placed or the resulting document does not validate.
pub fn build_edl(project: &Project, assets: &[Asset], analysis: &AnalysisResult) -> WorkerResult<Edl> {
    let preset = StylePreset::resolve(&project.style, &project.prompt);
    let target = project.target_duration.unwrap_or(DEFAULT_TARGET_SECS);
    let clip_len = preset.clip_duration();

    let mut timeline = Vec::new();
    let mut cursor = 0.0;

    for (index, asset) in assets.iter().filter(|a| a.is_video()).enumerate() {
        let duration = analysis.video_duration(&asset.id).unwrap_or(clip_len);
        let segment = clip_len.min(duration.max(MIN_SEGMENT_SECS));
        let available = (duration - segment).max(0.0);
        let in_point = if available > 0.0 {
            available.min((duration * 0.1 + index as f64) % available)
        } else {
            0.0
        };
        let out = duration.min(in_point + segment);
        let advance = (out - in_point).max(MIN_ADVANCE_SECS);

        let transition = if index == 0 {
            Transition::None
        } else {
            preset.transition()
        };

        timeline.push(TimelineClip {
            source_asset_id: asset.id.clone(),
            in_point: round_to(in_point, 3),
            out: round_to(out, 3),
            start: round_to(cursor, 3),
            speed: None,
            transition,
        });

        cursor += advance;
        if transition == Transition::Crossfade {
            // Overlap is taken from both sides of the cut.
            cursor -= transition.overlap_secs();
            cursor -= transition.overlap_secs();
        }

        if cursor >= target {
            break;
        }
    }

    if timeline.is_empty() {
        return Err(WorkerError::planning("No timeline clips planned"));
    }

    let captions = CaptionSettings {
        enabled: preset.captions(),
        font: "Inter".to_string(),
        size: 22.0,
        position: "bottom".to_string(),
        texts: if preset.captions() {
            timeline
                .iter()
                .enumerate()
                .map(|(i, clip)| CaptionText {
                    start: clip.start,
                    end: target.min(clip.start + CAPTION_SECS),
                    text: format!("Beat {}", i + 1),
                })
                .collect()
        } else {
            Vec::new()
        },
    };

    let audio = match &analysis.audio {
        Some(track) => {
            let best = track.best_segment;
            let mut end = best.start + target.min(best.end - best.start);
            if track.duration > 0.0 {
                end = end.min(track.duration);
            }
            AudioSettings {
                use_uploaded_audio: true,
                selected_segment: Some(TimeRange::new(best.start, end)),
                normalize: true,
                mix_level: preset.mix_level(),
            }
        }
        None => AudioSettings {
            use_uploaded_audio: false,
            selected_segment: None,
            normalize: false,
            mix_level: DEFAULT_MIX_LEVEL,
        },
    };

    let edl = Edl {
        version: EDL_VERSION.to_string(),
        output: OutputSpec {
            width: project.output_width,
            height: project.output_height,
            fps: OUTPUT_FPS,
            target_duration: target,
        },
        timeline,
        captions,
        audio,
    };

    let known: HashSet<&str> = assets.iter().map(|a| a.id.as_str()).collect();
    edl.validate(|id| known.contains(id))
        .map_err(|e| WorkerError::planning(format!("Invalid EDL: {}", e)))?;

    Ok(edl)
}
