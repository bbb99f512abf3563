//! Media tool configuration.

/// Locations of the external transcoding tools.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// ffmpeg executable (name on PATH or absolute path)
    pub ffmpeg_path: String,
    /// ffprobe executable (name on PATH or absolute path)
    pub ffprobe_path: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
        }
    }
}
