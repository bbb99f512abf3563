//! Stored pipeline outputs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{JobId, ProjectId};

/// Artifact type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactType {
    Analysis,
    Edl,
    Log,
    Render,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Analysis => "ANALYSIS",
            ArtifactType::Edl => "EDL",
            ArtifactType::Log => "LOG",
            ArtifactType::Render => "RENDER",
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An artifact record. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub project_id: ProjectId,
    pub job_id: JobId,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub storage_key: String,
    pub content_type: String,
    pub size: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Artifact creation request.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub project_id: ProjectId,
    pub job_id: JobId,
    pub artifact_type: ArtifactType,
    pub storage_key: String,
    pub content_type: String,
    pub size: Option<u64>,
}

impl NewArtifact {
    /// Materialize into a record with a fresh id.
    pub fn into_artifact(self) -> Artifact {
        Artifact {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: self.project_id,
            job_id: self.job_id,
            artifact_type: self.artifact_type,
            storage_key: self.storage_key,
            content_type: self.content_type,
            size: self.size,
            created_at: Utc::now(),
        }
    }
}
