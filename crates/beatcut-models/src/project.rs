//! Projects and style presets.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::Transition;

/// Unique identifier for a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    /// Generate a new random project ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A user project: edit settings plus its uploaded assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Free-text description of the desired edit
    pub prompt: String,
    /// Declared style name; unknown names fall back to prompt keywords
    pub style: String,
    pub output_width: u32,
    pub output_height: u32,
    /// Target duration in seconds
    pub target_duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        style: impl Into<String>,
        output_width: u32,
        output_height: u32,
        target_duration: Option<f64>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            prompt: prompt.into(),
            style: style.into(),
            output_width,
            output_height,
            target_duration,
            created_at: Utc::now(),
        }
    }
}

/// Edit style presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    Hype,
    Cinematic,
    Clean,
}

impl StylePreset {
    /// All presets.
    pub const ALL: [StylePreset; 3] = [StylePreset::Hype, StylePreset::Cinematic, StylePreset::Clean];

    pub fn as_str(&self) -> &'static str {
        match self {
            StylePreset::Hype => "hype",
            StylePreset::Cinematic => "cinematic",
            StylePreset::Clean => "clean",
        }
    }

    /// Match a preset by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == normalized)
    }

    /// Infer a preset from prompt keywords.
    pub fn infer_from_prompt(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        if lower.contains("hype") || lower.contains("energy") {
            StylePreset::Hype
        } else if lower.contains("cinematic") || lower.contains("film") || lower.contains("dramatic") {
            StylePreset::Cinematic
        } else {
            StylePreset::Clean
        }
    }

    /// Declared style wins when it names a preset; otherwise the prompt decides.
    pub fn resolve(declared: &str, prompt: &str) -> Self {
        Self::from_name(declared).unwrap_or_else(|| Self::infer_from_prompt(prompt))
    }

    /// Default sub-clip length in seconds.
    pub fn clip_duration(&self) -> f64 {
        match self {
            StylePreset::Hype => 3.5,
            StylePreset::Cinematic => 4.8,
            StylePreset::Clean => 4.0,
        }
    }

    pub fn transition(&self) -> Transition {
        match self {
            StylePreset::Hype | StylePreset::Cinematic => Transition::Crossfade,
            StylePreset::Clean => Transition::None,
        }
    }

    /// Music mix level applied to uploaded audio.
    pub fn mix_level(&self) -> f64 {
        match self {
            StylePreset::Hype => 0.95,
            StylePreset::Cinematic => 0.85,
            StylePreset::Clean => 0.9,
        }
    }

    pub fn captions(&self) -> bool {
        false
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
