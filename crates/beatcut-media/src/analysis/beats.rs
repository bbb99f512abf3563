//! Beat detection, tempo and curve normalization.

use beatcut_models::round_to;

use super::AnalysisConfig;

/// Guards the normalization divisor against an all-zero curve.
const NORMALIZE_EPSILON: f64 = 1e-6;

/// Mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl EnergyStats {
    pub fn of(energies: &[f64]) -> Self {
        if energies.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let n = energies.len() as f64;
        let mean = energies.iter().sum::<f64>() / n;
        let variance = energies.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// Timestamps (rounded to milliseconds) of every frame at or above the
/// threshold, in frame order.
pub fn detect_beats(energies: &[f64], stats: EnergyStats, config: &AnalysisConfig) -> Vec<f64> {
    let threshold = stats.mean + config.threshold_sigma * stats.std_dev;
    let frame_duration = config.frame_duration();

    energies
        .iter()
        .enumerate()
        .filter(|(_, &energy)| energy >= threshold)
        .map(|(idx, _)| round_to(idx as f64 * frame_duration, 3))
        .collect()
}

/// BPM from the average inter-beat interval, clamped to the configured range.
pub fn estimate_tempo(beat_times: &[f64], config: &AnalysisConfig) -> f64 {
    let interval = if beat_times.len() < 2 {
        config.default_beat_interval
    } else {
        let total: f64 = beat_times.windows(2).map(|w| w[1] - w[0]).sum();
        total / (beat_times.len() - 1) as f64
    };

    let interval = if interval > 0.0 {
        interval
    } else {
        config.default_beat_interval
    };

    (60.0 / interval).clamp(config.min_tempo, config.max_tempo)
}

/// Scale energies by `1 / (std + mean + eps)`, rounded to 4 places. Zero
/// frames stay exactly zero.
pub fn normalize_curve(energies: &[f64], stats: EnergyStats) -> Vec<f64> {
    let divisor = stats.std_dev + stats.mean + NORMALIZE_EPSILON;
    energies
        .iter()
        .map(|&v| if v == 0.0 { 0.0 } else { round_to(v / divisor, 4) })
        .collect()
}
