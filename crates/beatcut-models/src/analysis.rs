//! Media analysis results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A time window in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Probed duration of one video asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysis {
    pub asset_id: String,
    /// Duration in seconds (0 when the probe could not read it)
    pub duration: f64,
}

/// Beat/energy analysis of the uploaded music track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    pub asset_id: String,
    pub duration: f64,
    /// Beats per minute, clamped to [60, 180]
    pub tempo: f64,
    /// Beat timestamps in seconds, ascending
    pub beat_times: Vec<f64>,
    /// Normalized per-frame energy
    pub energy_curve: Vec<f64>,
    /// Highest-energy window
    pub best_segment: TimeRange,
}

/// Output of the analysis stage, persisted as the ANALYSIS artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub videos: Vec<VideoAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub audio: Option<AudioAnalysis>,
}

impl AnalysisResult {
    /// Probed duration for a video asset, if it was analyzed.
    pub fn video_duration(&self, asset_id: &str) -> Option<f64> {
        self.videos
            .iter()
            .find(|v| v.asset_id == asset_id)
            .map(|v| v.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let result = AnalysisResult {
            videos: vec![VideoAnalysis {
                asset_id: "v1".into(),
                duration: 12.5,
            }],
            audio: Some(AudioAnalysis {
                asset_id: "a1".into(),
                duration: 30.0,
                tempo: 120.0,
                beat_times: vec![0.5, 1.0],
                energy_curve: vec![0.1, 0.9],
                best_segment: TimeRange::new(2.0, 12.0),
            }),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["videos"][0]["assetId"], "v1");
        assert_eq!(json["audio"]["beatTimes"][1], 1.0);
        assert_eq!(json["audio"]["bestSegment"]["end"], 12.0);
        assert_eq!(result.video_duration("v1"), Some(12.5));
        assert_eq!(result.video_duration("nope"), None);
    }

    #[test]
    fn test_audio_omitted_when_absent() {
        let json = serde_json::to_string(&AnalysisResult::default()).unwrap();
        assert_eq!(json, r#"{"videos":[]}"#);
    }
}
