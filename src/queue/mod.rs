pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod refresh;
pub mod routes;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use cached_client::CachedQueueClient;
pub use client::QueueClient;
pub use routes::{update_project, FormSubmission, ProjectAction};
pub use types::Auth;
