//! Blob storage key layout.
//!
//! ```text
//! projects/{projectId}/uploads/{uuid}-{sanitizedFilename}
//! projects/{projectId}/analysis/{jobId}.json
//! projects/{projectId}/edl/{jobId}.json
//! projects/{projectId}/logs/{jobId}.log
//! projects/{projectId}/renders/{jobId}.mp4
//! ```

use uuid::Uuid;

use crate::{JobId, ProjectId};

/// Longest filename kept after sanitizing.
pub const MAX_FILENAME_LEN: usize = 200;

pub fn analysis_key(project_id: &ProjectId, job_id: &JobId) -> String {
    format!("projects/{}/analysis/{}.json", project_id, job_id)
}

pub fn edl_key(project_id: &ProjectId, job_id: &JobId) -> String {
    format!("projects/{}/edl/{}.json", project_id, job_id)
}

pub fn log_key(project_id: &ProjectId, job_id: &JobId) -> String {
    format!("projects/{}/logs/{}.log", project_id, job_id)
}

pub fn render_key(project_id: &ProjectId, job_id: &JobId) -> String {
    format!("projects/{}/renders/{}.mp4", project_id, job_id)
}

/// Key for a new upload; `filename` is sanitized here.
pub fn upload_key(project_id: &ProjectId, filename: &str) -> String {
    format!(
        "projects/{}/uploads/{}-{}",
        project_id,
        Uuid::new_v4(),
        sanitize_filename(filename)
    )
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
