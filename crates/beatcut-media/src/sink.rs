//! Destinations for subprocess output lines.

use std::sync::Arc;

/// Receives diagnostic lines from external tool invocations.
pub trait LineSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Shared, owned sink for work that outlives the caller's borrow.
pub type SharedSink = Arc<dyn LineSink>;

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn line(&self, line: &str) {
        self(line)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LineSink for NullSink {
    fn line(&self, _line: &str) {}
}
