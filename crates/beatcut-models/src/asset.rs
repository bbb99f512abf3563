//! Uploaded media assets.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys;
use crate::ProjectId;

/// Asset media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Video,
    Audio,
}

impl AssetKind {
    /// Classify by MIME type; anything that is not audio/* or video/* is rejected.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("video/") {
            Some(AssetKind::Video)
        } else if content_type.starts_with("audio/") {
            Some(AssetKind::Audio)
        } else {
            None
        }
    }
}

/// An uploaded file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub project_id: ProjectId,
    /// Sanitized original filename
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub kind: AssetKind,
    /// Blob storage key
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Build a new asset record with its upload key.
    pub fn new(
        project_id: ProjectId,
        filename: &str,
        content_type: impl Into<String>,
        size: u64,
        kind: AssetKind,
    ) -> Self {
        let filename = keys::sanitize_filename(filename);
        let storage_key = keys::upload_key(&project_id, &filename);
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            filename,
            content_type: content_type.into(),
            size,
            kind,
            storage_key,
            created_at: Utc::now(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == AssetKind::Video
    }
}
