//! Failure type shared by every query and mutation.

use reqwest::Method;
use thiserror::Error;

pub type Result<T, E = Failure> = std::result::Result<T, E>;

/// Write operations that the server can refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  CreateJob,
  HideJob,
  CreateComment,
  AddTag,
  RemoveTag,
  ChangeRepository,
  CreateProject,
  UpdateProject,
  DeleteProject,
}

impl Operation {
  /// Fixed message reported when this operation is refused.
  pub fn message(&self) -> &'static str {
    match self {
      Self::CreateJob => "Job creation was not successful.",
      Self::HideJob => "hiding job was not successful",
      Self::CreateComment => "commenting was not successful",
      Self::AddTag => "Unable to add tag",
      Self::RemoveTag => "Unable to remove tag",
      Self::ChangeRepository => "changing data repository was not successful",
      Self::CreateProject => "project creation was not successful",
      Self::UpdateProject => "project update was not successful",
      Self::DeleteProject => "project deletion was not successful",
    }
  }
}

#[derive(Debug, Error)]
pub enum Failure {
  /// The server answered a mutation with a non-ok status.
  #[error("{}", with_detail(.operation.message(), .detail.as_deref()))]
  Rejected {
    operation: Operation,
    status: Option<u16>,
    detail: Option<String>,
  },

  /// The server answered a read with a non-ok status.
  #[error("request to {path} returned status {status}")]
  Status { path: String, status: u16 },

  /// No response was received.
  #[error("request to {path} failed: {message}")]
  Transport { path: String, message: String },

  #[error("failed to decode response from {path}: {source}")]
  Decode {
    path: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("unexpected request method {0}")]
  UnexpectedMethod(Method),

  #[error("project submission is missing a numeric id")]
  MissingProjectId,
}

impl Failure {
  pub fn rejected(operation: Operation, status: u16, detail: Option<String>) -> Self {
    Self::Rejected {
      operation,
      status: Some(status),
      detail,
    }
  }

  /// The operation a rejection belongs to, if any.
  pub fn operation(&self) -> Option<Operation> {
    match self {
      Self::Rejected { operation, .. } => Some(*operation),
      _ => None,
    }
  }
}

fn with_detail(message: &str, detail: Option<&str>) -> String {
  match detail {
    Some(d) if !d.is_empty() => format!("{} {}", message, d),
    _ => message.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rejection_appends_server_detail() {
    let failure = Failure::rejected(
      Operation::CreateJob,
      400,
      Some("hardware platform unknown".to_string()),
    );
    assert_eq!(
      failure.to_string(),
      "Job creation was not successful. hardware platform unknown"
    );
  }

  #[test]
  fn test_rejection_without_detail_uses_fixed_message() {
    let failure = Failure::rejected(Operation::AddTag, 500, None);
    assert_eq!(failure.to_string(), "Unable to add tag");
    assert_eq!(failure.operation(), Some(Operation::AddTag));
  }

  #[test]
  fn test_unexpected_method_message() {
    let failure = Failure::UnexpectedMethod(Method::PATCH);
    assert_eq!(failure.to_string(), "unexpected request method PATCH");
  }
}
