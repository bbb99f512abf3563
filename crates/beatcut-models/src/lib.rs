//! Shared data models for the beatcut pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, projects, assets and artifacts
//! - Audio/video analysis results
//! - The Edit Decision List (EDL) and its validation
//! - Blob storage key layout

pub mod analysis;
pub mod artifact;
pub mod asset;
pub mod edl;
pub mod job;
pub mod keys;
pub mod project;
pub mod utils;

// Re-export common types
pub use analysis::{AnalysisResult, AudioAnalysis, TimeRange, VideoAnalysis};
pub use artifact::{Artifact, ArtifactType, NewArtifact};
pub use asset::{Asset, AssetKind};
pub use edl::{
    AudioSettings, CaptionSettings, CaptionText, Edl, EdlError, EdlResult, OutputSpec,
    TimelineClip, Transition, CROSSFADE_SECS, EDL_VERSION,
};
pub use job::{stage, ClaimedJob, Job, JobId, JobStatus};
pub use keys::sanitize_filename;
pub use project::{Project, ProjectId, StylePreset};
pub use utils::round_to;
