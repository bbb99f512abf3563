//! Configuration for audio analysis.

use serde::{Deserialize, Serialize};

/// Parameters of the energy/beat analysis.
///
/// The defaults are what the planner is tuned against; changing them
/// shifts beat positions and the best segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Decode sample rate in Hz.
    pub sample_rate: u32,

    /// Samples per energy frame.
    ///
    /// A trailing partial frame is dropped.
    pub frame_samples: usize,

    /// Beat threshold in standard deviations above the mean energy.
    pub threshold_sigma: f64,

    /// Inter-beat interval assumed when fewer than two beats are found (seconds).
    pub default_beat_interval: f64,

    /// Tempo clamp range in BPM.
    pub min_tempo: f64,
    pub max_tempo: f64,

    /// Length of the best-segment search window (seconds).
    pub window_secs: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_samples: 1024,
            threshold_sigma: 0.6,
            default_beat_interval: 0.5,
            min_tempo: 60.0,
            max_tempo: 180.0,
            window_secs: 10.0,
        }
    }
}

impl AnalysisConfig {
    /// Duration of one energy frame in seconds.
    pub fn frame_duration(&self) -> f64 {
        self.frame_samples as f64 / self.sample_rate as f64
    }

    /// Best-segment window length in whole frames (at least one).
    pub fn window_frames(&self) -> usize {
        ((self.window_secs / self.frame_duration()).floor() as usize).max(1)
    }
}
