//! Adapter from project form submissions to project mutations.

use reqwest::Method;
use serde_json::{Map, Value};

use super::cached_client::CachedQueueClient;
use super::types::{Auth, Project, ProjectId};
use crate::error::{Failure, Result};

/// An inbound project form: the HTTP method decides the action, the body
/// carries the project fields and, for updates and deletions, its `id`.
#[derive(Debug, Clone)]
pub struct FormSubmission {
  pub method: Method,
  pub collab: String,
  pub body: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectAction {
  Updated(ProjectId),
  Created(Project),
  Deleted(ProjectId),
}

/// Dispatch PUT/POST/DELETE to patch/create/delete. The `id` field is
/// removed from the body before it is forwarded.
pub async fn update_project(
  client: &CachedQueueClient,
  auth: &Auth,
  submission: FormSubmission,
) -> Result<ProjectAction> {
  let FormSubmission {
    method,
    collab,
    mut body,
  } = submission;
  let project_id = body.remove("id").as_ref().and_then(parse_id);

  tracing::debug!(%method, %collab, ?project_id, "project form submitted");

  if method == Method::PUT {
    let id = project_id.ok_or(Failure::MissingProjectId)?;
    client.patch_project(&collab, id, body, auth).await?;
    Ok(ProjectAction::Updated(id))
  } else if method == Method::POST {
    let project = client.create_project(&collab, body, auth).await?;
    Ok(ProjectAction::Created(project))
  } else if method == Method::DELETE {
    let id = project_id.ok_or(Failure::MissingProjectId)?;
    client.delete_project(&collab, id, auth).await?;
    Ok(ProjectAction::Deleted(id))
  } else {
    Err(Failure::UnexpectedMethod(method))
  }
}

/// Form values may arrive as numbers or numeric strings.
fn parse_id(value: &Value) -> Option<ProjectId> {
  match value {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}
