//! Caching client for the neuromorphic job queue API.
//!
//! [`queue::CachedQueueClient`] memoizes jobs, projects, tags, comments and
//! logs per session, fetching only what the cache cannot answer.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod queue;

pub use error::{Failure, Operation, Result};
