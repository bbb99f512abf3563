//! Structured job logging utilities.
//!
//! Two channels: [`JobLogger`] writes operator-facing `tracing` events,
//! [`LogBuffer`] collects the user-visible job log that ends up in the
//! job's snippet and LOG artifact.

use std::collections::VecDeque;
use std::sync::Mutex;

use beatcut_media::LineSink;
use beatcut_models::JobId;
use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    ///
    /// # Arguments
    /// * `job_id` - The unique identifier for the job
    /// * `operation` - The type of operation (e.g., "render_edit")
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

/// Bounded, timestamped job log. The oldest line is evicted on overflow.
///
/// Shared between the pipeline and every ffmpeg invocation of the job, so
/// it is a [`LineSink`] and uses interior mutability.
#[derive(Debug)]
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    snippet_lines: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize, snippet_lines: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            snippet_lines,
        }
    }

    /// Append one line, prefixed with the current UTC time.
    pub fn push(&self, line: &str) {
        let stamped = format!(
            "[{}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            line
        );
        let mut lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(stamped);
    }

    /// The most recent lines joined by newlines.
    pub fn snippet(&self) -> String {
        let lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = lines.len().saturating_sub(self.snippet_lines);
        lines
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whole buffer, one line per entry, as persisted in the LOG artifact.
    pub fn contents(&self) -> String {
        let lines = match self.lines.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn len(&self) -> usize {
        match self.lines.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LineSink for LogBuffer {
    fn line(&self, line: &str) {
        self.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_stamp(line: &str) -> &str {
        line.split_once("] ").map(|(_, rest)| rest).unwrap()
    }

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "render_edit");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "render_edit");
    }

    #[test]
    fn test_lines_are_timestamped() {
        let buffer = LogBuffer::new(80, 10);
        buffer.push("Claimed job");

        let contents = buffer.contents();
        let line = contents.lines().next().unwrap();
        assert!(line.starts_with('['));
        let stamp = &line[1..line.find(']').unwrap()];
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(stamp.ends_with('Z'));
        assert_eq!(strip_stamp(line), "Claimed job");
    }

    #[test]
    fn test_evicts_oldest() {
        let buffer = LogBuffer::new(3, 10);
        for i in 0..5 {
            buffer.push(&format!("line {}", i));
        }

        assert_eq!(buffer.len(), 3);
        let kept: Vec<_> = buffer.contents().lines().map(|l| strip_stamp(l).to_string()).collect();
        assert_eq!(kept, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_snippet_is_tail() {
        let buffer = LogBuffer::new(80, 10);
        for i in 0..25 {
            buffer.push(&format!("line {}", i));
        }

        let snippet = buffer.snippet();
        let lines: Vec<_> = snippet.split('\n').map(strip_stamp).collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "line 15");
        assert_eq!(lines[9], "line 24");
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = LogBuffer::new(80, 10);
        assert!(buffer.is_empty());
        assert_eq!(buffer.snippet(), "");
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn test_works_as_line_sink() {
        let buffer = std::sync::Arc::new(LogBuffer::new(80, 10));
        let sink: beatcut_media::SharedSink = buffer.clone();
        sink.line("ffmpeg -y -v error");
        assert_eq!(buffer.len(), 1);
    }
}
