//! Beat-synced edit worker.
//!
//! This crate provides:
//! - The plan builder that turns analysis into an EDL
//! - The per-job pipeline (download, analyze, plan, render, finalize)
//! - Artifact recording and the bounded job log
//! - The poll-based job executor with graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod pipeline;
pub mod planner;
pub mod recorder;
pub mod scratch;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::{JobLogger, LogBuffer};
pub use pipeline::{JobOutcome, JobPipeline};
pub use planner::build_edl;
pub use recorder::ArtifactRecorder;
pub use scratch::ScratchDir;
