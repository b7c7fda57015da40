//! Detached refreshes of incomplete jobs.
//!
//! A job query hands every incomplete job to the [`Refresher`], which
//! re-fetches it on its own task. Outcomes are logged and broadcast to
//! whoever subscribed; they never reach the caller of the query.

use std::future::Future;
use tokio::sync::broadcast;

use super::types::{Job, JobId, JobStatus};
use crate::error::Result;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
  /// The job was re-read (or served from cache) with this status
  Refreshed { status: Option<JobStatus> },
  /// Neither the server nor the cache knows the job any more
  Missing,
  Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshEvent {
  pub collab: String,
  pub job_id: JobId,
  pub outcome: RefreshOutcome,
}

/// Receiving end of the refresh channel
pub struct RefreshEvents {
  rx: broadcast::Receiver<RefreshEvent>,
}

impl RefreshEvents {
  /// Next refresh outcome. Returns `None` once every client is dropped.
  pub async fn next(&mut self) -> Option<RefreshEvent> {
    loop {
      match self.rx.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "refresh subscriber lagging, events dropped");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

/// Spawns background job refreshes.
#[derive(Clone)]
pub struct Refresher {
  tx: broadcast::Sender<RefreshEvent>,
}

impl Default for Refresher {
  fn default() -> Self {
    Self::new()
  }
}

impl Refresher {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(EVENT_CAPACITY);
    Self { tx }
  }

  pub fn subscribe(&self) -> RefreshEvents {
    RefreshEvents {
      rx: self.tx.subscribe(),
    }
  }

  /// Run `refresh` on a detached task and report its outcome.
  pub fn spawn<F>(&self, collab: &str, job_id: JobId, refresh: F)
  where
    F: Future<Output = Result<Option<Job>>> + Send + 'static,
  {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      tracing::warn!(job_id, "no async runtime, skipping background refresh");
      return;
    };

    let tx = self.tx.clone();
    let collab = collab.to_string();
    runtime.spawn(async move {
      let outcome = match refresh.await {
        Ok(Some(job)) => {
          tracing::debug!(job_id, status = ?job.status, "refreshed incomplete job");
          RefreshOutcome::Refreshed { status: job.status }
        }
        Ok(None) => RefreshOutcome::Missing,
        Err(e) => {
          tracing::warn!(job_id, %collab, error = %e, "background job refresh failed");
          RefreshOutcome::Failed(e.to_string())
        }
      };
      // No subscribers is fine
      let _ = tx.send(RefreshEvent {
        collab,
        job_id,
        outcome,
      });
    });
  }
}
