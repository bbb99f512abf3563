//! Blob storage for the beatcut pipeline.
//!
//! This crate provides:
//! - The [`BlobStore`] abstraction used by the worker
//! - A Cloudflare R2 implementation (S3 API)
//! - An in-memory implementation for tests and local runs

pub mod blob;
pub mod client;
pub mod error;
pub mod memory;

pub use blob::BlobStore;
pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryBlobStore, StoredObject};
