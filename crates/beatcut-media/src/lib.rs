//! FFmpeg CLI wrapper for the beatcut pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner that streams tool
//!   output into a [`LineSink`]
//! - Duration probing and raw PCM decoding
//! - Audio analysis (energy frames, beats, tempo, best segment)
//! - Filter graph construction and EDL rendering

pub mod analysis;
pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod filters;
pub mod probe;
pub mod render;
pub mod sink;

pub use analysis::{analyze_assets, analyze_audio, AnalysisConfig, AssetFile, AudioFeatures};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use config::MediaConfig;
pub use decode::{decode_audio_pcm, PcmStream};
pub use error::{MediaError, MediaResult};
pub use filters::CompositionGraph;
pub use probe::probe_duration;
pub use render::{RenderRequest, Renderer, RENDER_FILE_NAME};
pub use sink::{LineSink, NullSink, SharedSink};
