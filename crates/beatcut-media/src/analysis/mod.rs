//! Audio analysis: energy frames, beats, tempo and best segment.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ PCM decode   │───►│ Energy       │───►│ Beats/tempo  │
//! │ (16kHz mono) │    │ frames       │    │ curve/window │
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! The decoder runs as its own task and hands sample chunks over a bounded
//! channel; frames are accumulated in stream order. Degenerate audio
//! (silence, clips shorter than one frame) degrades to defaults instead of
//! failing.

mod beats;
mod config;
mod energy;
mod segment;

use std::path::PathBuf;

use beatcut_models::{AnalysisResult, AssetKind, AudioAnalysis, TimeRange, VideoAnalysis};
use tracing::info;

use crate::config::MediaConfig;
use crate::decode::decode_audio_pcm;
use crate::error::MediaResult;
use crate::probe::probe_duration;
use crate::sink::SharedSink;

pub use beats::{detect_beats, estimate_tempo, normalize_curve, EnergyStats};
pub use config::AnalysisConfig;
pub use energy::EnergyAccumulator;
pub use segment::best_segment;

/// A downloaded asset ready for analysis.
#[derive(Debug, Clone)]
pub struct AssetFile {
    pub id: String,
    pub path: PathBuf,
    pub kind: AssetKind,
}

/// Derived features of one audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatures {
    pub tempo: f64,
    pub beat_times: Vec<f64>,
    pub energy_curve: Vec<f64>,
    pub best_segment: TimeRange,
}

/// Compute features from raw frame energies.
///
/// `energies` must be non-empty; [`EnergyAccumulator::finish`] guarantees it.
pub fn features_from_energies(
    energies: &[f64],
    config: &AnalysisConfig,
    total_duration: f64,
) -> AudioFeatures {
    let stats = EnergyStats::of(energies);
    let beat_times = detect_beats(energies, stats, config);
    let tempo = estimate_tempo(&beat_times, config);
    let energy_curve = normalize_curve(energies, stats);
    let best_segment = best_segment(&energy_curve, config, total_duration);

    AudioFeatures {
        tempo,
        beat_times,
        energy_curve,
        best_segment,
    }
}

/// Decode an audio file and compute its features.
pub async fn analyze_audio(
    media: &MediaConfig,
    config: &AnalysisConfig,
    path: &std::path::Path,
    total_duration: f64,
    sink: SharedSink,
) -> MediaResult<AudioFeatures> {
    let mut stream = decode_audio_pcm(media, path, config.sample_rate, 1, sink)?;
    let mut acc = EnergyAccumulator::new(config.frame_samples);

    while let Some(chunk) = stream.next_chunk().await {
        acc.push(&chunk);
    }
    stream.finish().await?;

    let energies = acc.finish();
    Ok(features_from_energies(&energies, config, total_duration))
}

/// Analyze all assets of a job: probe every video, and fully analyze the
/// first audio asset if there is one.
pub async fn analyze_assets(
    media: &MediaConfig,
    config: &AnalysisConfig,
    assets: &[AssetFile],
    sink: SharedSink,
) -> MediaResult<AnalysisResult> {
    let mut videos = Vec::new();
    for asset in assets.iter().filter(|a| a.kind == AssetKind::Video) {
        let duration = probe_duration(media, &asset.path, sink.as_ref()).await?;
        sink.line(&format!("probed video {}: {:.3}s", asset.id, duration));
        videos.push(VideoAnalysis {
            asset_id: asset.id.clone(),
            duration,
        });
    }

    let audio = match assets.iter().find(|a| a.kind == AssetKind::Audio) {
        Some(asset) => {
            let duration = probe_duration(media, &asset.path, sink.as_ref()).await?;
            let features = analyze_audio(media, config, &asset.path, duration, sink.clone()).await?;
            info!(
                asset_id = %asset.id,
                tempo = features.tempo,
                beats = features.beat_times.len(),
                "Analyzed audio"
            );
            sink.line(&format!(
                "analyzed audio {}: {:.3}s, {} beats, tempo {:.1}",
                asset.id,
                duration,
                features.beat_times.len(),
                features.tempo
            ));
            Some(AudioAnalysis {
                asset_id: asset.id.clone(),
                duration,
                tempo: features.tempo,
                beat_times: features.beat_times,
                energy_curve: features.energy_curve,
                best_segment: features.best_segment,
            })
        }
        None => None,
    };

    Ok(AnalysisResult { videos, audio })
}
