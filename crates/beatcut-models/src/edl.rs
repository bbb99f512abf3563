//! Edit Decision List.
//!
//! The EDL is the planned edit: output format, the ordered timeline of
//! sub-clips, captions and the audio mix. It is produced once per job,
//! validated, persisted as an artifact and then consumed by the renderer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TimeRange;

/// Only supported document version.
pub const EDL_VERSION: &str = "1.0";

/// Overlap of a crossfade between two clips, in seconds.
pub const CROSSFADE_SECS: f64 = 0.75;

/// Fade length the renderer uses for a hard cut.
const CUT_FADE_SECS: f64 = 0.001;

/// Result type for EDL validation.
pub type EdlResult<T> = Result<T, EdlError>;

/// EDL validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EdlError {
    #[error("Unsupported EDL version: {0}")]
    UnsupportedVersion(String),

    #[error("Timeline is empty")]
    EmptyTimeline,

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("timeline[{index}] references unknown asset {asset_id}")]
    UnknownAsset { index: usize, asset_id: String },

    #[error("EDL JSON error: {0}")]
    Json(String),
}

impl EdlError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Clip-to-clip transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    None,
    Crossfade,
}

impl Transition {
    /// Seconds the planner's cursor gives back for this transition.
    pub fn overlap_secs(&self) -> f64 {
        match self {
            Transition::None => 0.0,
            Transition::Crossfade => CROSSFADE_SECS,
        }
    }

    /// xfade duration used when composing; a cut is a near-zero fade.
    pub fn fade_secs(&self) -> f64 {
        match self {
            Transition::None => CUT_FADE_SECS,
            Transition::Crossfade => CROSSFADE_SECS,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Hard cap on the rendered duration, in seconds
    pub target_duration: f64,
}

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineClip {
    pub source_asset_id: String,
    /// In-point within the source, seconds
    #[serde(rename = "in")]
    pub in_point: f64,
    /// Out-point within the source, seconds
    pub out: f64,
    /// Position on the output timeline, seconds
    pub start: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speed: Option<f64>,
    pub transition: Transition,
}

impl TimelineClip {
    /// Length of the clip on the output timeline.
    pub fn duration(&self) -> f64 {
        (self.out - self.in_point) / self.speed.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionText {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSettings {
    pub enabled: bool,
    pub font: String,
    pub size: f64,
    pub position: String,
    #[serde(default)]
    pub texts: Vec<CaptionText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub use_uploaded_audio: bool,
    pub selected_segment: Option<TimeRange>,
    /// Apply loudness normalization
    pub normalize: bool,
    /// Music volume, 0..=1
    pub mix_level: f64,
}

/// The Edit Decision List document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Edl {
    pub version: String,
    pub output: OutputSpec,
    pub timeline: Vec<TimelineClip>,
    pub captions: CaptionSettings,
    pub audio: AudioSettings,
}

impl Edl {
    /// Validate field bounds and timeline invariants, then check every
    /// clip source with `is_known_asset`.
    pub fn validate(&self, is_known_asset: impl Fn(&str) -> bool) -> EdlResult<()> {
        self.validate_structure()?;

        for (index, clip) in self.timeline.iter().enumerate() {
            if !is_known_asset(&clip.source_asset_id) {
                return Err(EdlError::UnknownAsset {
                    index,
                    asset_id: clip.source_asset_id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Field bounds and ordering checks that need no outside context.
    pub fn validate_structure(&self) -> EdlResult<()> {
        if self.version != EDL_VERSION {
            return Err(EdlError::UnsupportedVersion(self.version.clone()));
        }

        if self.output.width == 0 {
            return Err(EdlError::invalid("output.width", "must be positive"));
        }
        if self.output.height == 0 {
            return Err(EdlError::invalid("output.height", "must be positive"));
        }
        positive("output.fps", self.output.fps)?;
        positive("output.targetDuration", self.output.target_duration)?;

        if self.timeline.is_empty() {
            return Err(EdlError::EmptyTimeline);
        }

        let mut previous_start = 0.0;
        for (i, clip) in self.timeline.iter().enumerate() {
            let field = |name: &str| format!("timeline[{}].{}", i, name);

            non_negative(&field("in"), clip.in_point)?;
            positive(&field("out"), clip.out)?;
            non_negative(&field("start"), clip.start)?;
            if let Some(speed) = clip.speed {
                positive(&field("speed"), speed)?;
            }
            if clip.in_point >= clip.out {
                return Err(EdlError::invalid(field("in"), "must be before out"));
            }
            if clip.start < previous_start {
                return Err(EdlError::invalid(field("start"), "must not decrease"));
            }
            previous_start = clip.start;
        }

        positive("captions.size", self.captions.size)?;
        for (i, caption) in self.captions.texts.iter().enumerate() {
            non_negative(&format!("captions.texts[{}].start", i), caption.start)?;
            positive(&format!("captions.texts[{}].end", i), caption.end)?;
        }

        let mix = self.audio.mix_level;
        if !mix.is_finite() || !(0.0..=1.0).contains(&mix) {
            return Err(EdlError::invalid("audio.mixLevel", "must be within [0, 1]"));
        }
        if let Some(segment) = &self.audio.selected_segment {
            non_negative("audio.selectedSegment.start", segment.start)?;
            positive("audio.selectedSegment.end", segment.end)?;
        }

        Ok(())
    }

    /// Pretty JSON, as stored in the EDL artifact.
    pub fn to_json_pretty(&self) -> EdlResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EdlError::Json(e.to_string()))
    }

    /// Parse and structurally validate a stored EDL.
    pub fn from_json(json: &str) -> EdlResult<Self> {
        let edl: Edl = serde_json::from_str(json).map_err(|e| EdlError::Json(e.to_string()))?;
        edl.validate_structure()?;
        Ok(edl)
    }

    /// JSON Schema of the document.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Edl)
    }
}

fn positive(field: &str, value: f64) -> EdlResult<()> {
    if !value.is_finite() {
        return Err(EdlError::invalid(field, "must be a finite number"));
    }
    if value <= 0.0 {
        return Err(EdlError::invalid(field, "must be positive"));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64) -> EdlResult<()> {
    if !value.is_finite() {
        return Err(EdlError::invalid(field, "must be a finite number"));
    }
    if value < 0.0 {
        return Err(EdlError::invalid(field, "must not be negative"));
    }
    Ok(())
}
