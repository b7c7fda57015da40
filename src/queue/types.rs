use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type JobId = i64;
pub type ProjectId = i64;

/// Lifecycle state reported by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Submitted,
  Validated,
  Running,
  Mapped,
  Finished,
  Error,
  Removed,
  #[serde(other)]
  Unknown,
}

impl JobStatus {
  /// Whether the queue may still change this job.
  pub fn is_incomplete(&self) -> bool {
    matches!(
      self,
      Self::Submitted | Self::Validated | Self::Running | Self::Mapped
    )
  }
}

/// A file produced by a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
  #[serde(default)]
  pub url: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Output data of a job and the repository it lives in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputData {
  #[serde(default)]
  pub repository: Option<String>,
  #[serde(default)]
  pub files: Vec<DataItem>,
}

/// A queued job as returned by the server.
///
/// Fields the client does not interpret are kept in `extra` so that a
/// cached job round-trips without losing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub id: JobId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub collab: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<JobStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_data: Option<OutputData>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Job {
  pub fn is_incomplete(&self) -> bool {
    self.status.is_some_and(|s| s.is_incomplete())
  }
}

/// A resource-allocation project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
  pub id: ProjectId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub collab: Option<String>,
  #[serde(default)]
  pub submission_date: Option<NaiveDate>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id: i64,
  #[serde(default)]
  pub content: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Body of a new comment
#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
  pub content: String,
}

/// Membership record for a collaboration the user belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collab {
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

impl Collab {
  /// Best-effort display name: `id`, then `name`, then `title`.
  pub fn name(&self) -> Option<&str> {
    ["id", "name", "title"]
      .iter()
      .find_map(|k| self.fields.get(*k).and_then(Value::as_str))
  }
}

/// Credential attached to every request.
#[derive(Clone)]
pub struct Auth {
  token: String,
}

impl Auth {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      token: token.into(),
    }
  }

  pub fn bearer(&self) -> String {
    format!("Bearer {}", self.token)
  }
}

impl std::fmt::Debug for Auth {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Auth").field("token", &"<redacted>").finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_job_keeps_unknown_fields() {
    let job: Job = serde_json::from_value(json!({
      "id": 7,
      "collab": "c1",
      "status": "running",
      "hardware_platform": "SpiNNaker",
    }))
    .unwrap();

    assert!(job.is_incomplete());
    assert_eq!(job.extra["hardware_platform"], json!("SpiNNaker"));
    assert_eq!(
      serde_json::to_value(&job).unwrap()["hardware_platform"],
      json!("SpiNNaker")
    );
  }

  #[test]
  fn test_unrecognised_status_is_complete() {
    let job: Job = serde_json::from_value(json!({"id": 1, "status": "archived"})).unwrap();
    assert_eq!(job.status, Some(JobStatus::Unknown));
    assert!(!job.is_incomplete());
  }

  #[test]
  fn test_project_submission_date() {
    let p: Project =
      serde_json::from_value(json!({"id": 3, "submission_date": "2024-01-01"})).unwrap();
    assert_eq!(p.submission_date, NaiveDate::from_ymd_opt(2024, 1, 1));

    let p: Project = serde_json::from_value(json!({"id": 4, "submission_date": null})).unwrap();
    assert_eq!(p.submission_date, None);
  }

  #[test]
  fn test_auth_debug_hides_token() {
    let auth = Auth::new("secret");
    assert!(!format!("{:?}", auth).contains("secret"));
    assert_eq!(auth.bearer(), "Bearer secret");
  }
}
