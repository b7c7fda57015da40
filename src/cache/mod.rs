//! Session cache for queue records.
//!
//! This module provides an in-process memoization layer that:
//! - Keeps jobs, projects and tags per collaboration, keyed by id
//! - Tracks how far the paginated job listing has been fetched
//! - Holds logs and comment threads per job
//! - Is created once per session and cleared explicitly on logout

mod store;
mod traits;

pub use store::{project_order, Cache, JobCursor};
pub use traits::{is_almost_empty, Cacheable};
