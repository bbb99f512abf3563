//! Persistent job store for the beatcut pipeline.
//!
//! This crate provides:
//! - The [`JobStore`] operations the worker consumes
//! - An atomic claim: two workers never process the same job
//! - A Redis implementation (Lua scripts) and an in-memory one

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryJobStore;
pub use redis_store::{RedisJobStore, StoreConfig};
pub use store::JobStore;
