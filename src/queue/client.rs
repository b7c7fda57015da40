use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::api_types::{error_detail, ApiOutputDataUpdate};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use super::types::{
  Auth, Collab, Comment, Job, JobId, NewComment, OutputData, Project, ProjectId,
};
use crate::error::{Failure, Operation, Result};

/// Page size used for the collaboration and project listings.
pub const LIST_PAGE_SIZE: usize = 100;

/// Queue API client wrapper, one method per endpoint, no caching.
#[derive(Clone)]
pub struct QueueClient {
  transport: Arc<dyn Transport>,
}

impl QueueClient {
  /// Client talking HTTP(S) to `base_url`.
  pub fn connect(base_url: &str) -> Result<Self> {
    Ok(Self::with_transport(Arc::new(HttpTransport::new(base_url)?)))
  }

  pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
    Self { transport }
  }

  /// Send a read and decode the JSON answer.
  async fn read<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
    let path = request.path.clone();
    let response = self.transport.send(request).await?;
    if !response.is_ok() {
      return Err(Failure::Status {
        path,
        status: response.status,
      });
    }
    decode(&path, &response)
  }

  /// Send a write and fail with the operation's message if it is refused.
  async fn write(&self, request: ApiRequest, operation: Operation) -> Result<ApiResponse> {
    let response = self.transport.send(request).await?;
    if !response.is_ok() {
      return Err(Failure::rejected(
        operation,
        response.status,
        error_detail(&response.body),
      ));
    }
    Ok(response)
  }

  async fn write_json<T: DeserializeOwned>(
    &self,
    request: ApiRequest,
    operation: Operation,
  ) -> Result<T> {
    let path = request.path.clone();
    let response = self.write(request, operation).await?;
    decode(&path, &response)
  }

  // --------------------------------------------------------------------------
  // Reads
  // --------------------------------------------------------------------------

  pub async fn list_collabs(&self, auth: &Auth) -> Result<Vec<Collab>> {
    let request = ApiRequest::new(Method::GET, "/collabs/", auth).query("size", LIST_PAGE_SIZE);
    self.read(request).await
  }

  /// One page of the job listing, newest first.
  pub async fn list_jobs(
    &self,
    auth: &Auth,
    collab: &str,
    size: usize,
    from_index: usize,
  ) -> Result<Vec<Job>> {
    let request = ApiRequest::new(Method::GET, "/jobs/", auth)
      .query("size", size)
      .query("from_index", from_index)
      .query("collab", collab);
    self.read(request).await
  }

  pub async fn get_job(&self, auth: &Auth, job_id: JobId) -> Result<Job> {
    self
      .read(ApiRequest::new(Method::GET, format!("/jobs/{}", job_id), auth))
      .await
  }

  pub async fn get_log(&self, auth: &Auth, job_id: JobId) -> Result<String> {
    let path = format!("/jobs/{}/log", job_id);
    let response = self
      .transport
      .send(ApiRequest::new(Method::GET, path.clone(), auth).plain())
      .await?;
    if !response.is_ok() {
      return Err(Failure::Status {
        path,
        status: response.status,
      });
    }
    Ok(response.body)
  }

  pub async fn list_comments(&self, auth: &Auth, job_id: JobId) -> Result<Vec<Comment>> {
    self
      .read(ApiRequest::new(
        Method::GET,
        format!("/jobs/{}/comments/", job_id),
        auth,
      ))
      .await
  }

  pub async fn list_tags(&self, auth: &Auth, collab: &str) -> Result<Vec<String>> {
    let request = ApiRequest::new(Method::GET, "/tags/", auth).query("collab", collab);
    self.read(request).await
  }

  pub async fn list_projects(&self, auth: &Auth, collab: &str) -> Result<Vec<Project>> {
    let request = ApiRequest::new(Method::GET, "/projects/", auth)
      .query("size", LIST_PAGE_SIZE)
      .query("collab", collab);
    self.read(request).await
  }

  // --------------------------------------------------------------------------
  // Writes
  // --------------------------------------------------------------------------

  pub async fn create_job(&self, auth: &Auth, fields: Map<String, Value>) -> Result<Job> {
    let request = ApiRequest::new(Method::POST, "/jobs/", auth).body(Value::Object(fields));
    self.write_json(request, Operation::CreateJob).await
  }

  pub async fn hide_job(&self, auth: &Auth, job_id: JobId) -> Result<()> {
    let request = ApiRequest::new(Method::DELETE, format!("/jobs/{}", job_id), auth);
    self.write(request, Operation::HideJob).await?;
    Ok(())
  }

  pub async fn create_comment(
    &self,
    auth: &Auth,
    job_id: JobId,
    comment: &NewComment,
  ) -> Result<Comment> {
    let body = serde_json::to_value(comment).map_err(|source| Failure::Decode {
      path: format!("/jobs/{}/comments/", job_id),
      source,
    })?;
    let request =
      ApiRequest::new(Method::POST, format!("/jobs/{}/comments/", job_id), auth).body(body);
    self.write_json(request, Operation::CreateComment).await
  }

  pub async fn add_tag(&self, auth: &Auth, job_id: JobId, tag: &str) -> Result<()> {
    let request =
      ApiRequest::new(Method::POST, format!("/jobs/{}/tags/", job_id), auth).body(json!([tag]));
    self.write(request, Operation::AddTag).await?;
    Ok(())
  }

  pub async fn remove_tag(&self, auth: &Auth, job_id: JobId, tag: &str) -> Result<()> {
    let request =
      ApiRequest::new(Method::DELETE, format!("/jobs/{}/tags/", job_id), auth).body(json!([tag]));
    self.write(request, Operation::RemoveTag).await?;
    Ok(())
  }

  /// Point a job's output data at another repository. The file list is
  /// reset; the server answers with the new output data.
  pub async fn set_output_repository(
    &self,
    auth: &Auth,
    job_id: JobId,
    repository: &str,
  ) -> Result<OutputData> {
    let path = format!("/jobs/{}/output_data", job_id);
    let body = serde_json::to_value(ApiOutputDataUpdate {
      repository,
      files: Vec::new(),
    })
    .map_err(|source| Failure::Decode {
      path: path.clone(),
      source,
    })?;
    let request = ApiRequest::new(Method::PUT, path, auth).body(body);
    self
      .write_json(request, Operation::ChangeRepository)
      .await
  }

  pub async fn create_project(&self, auth: &Auth, fields: Map<String, Value>) -> Result<Project> {
    let request = ApiRequest::new(Method::POST, "/projects/", auth).body(Value::Object(fields));
    self.write_json(request, Operation::CreateProject).await
  }

  pub async fn update_project(
    &self,
    auth: &Auth,
    project_id: ProjectId,
    fields: &Map<String, Value>,
  ) -> Result<()> {
    let request = ApiRequest::new(Method::PUT, format!("/projects/{}", project_id), auth)
      .body(Value::Object(fields.clone()));
    self.write(request, Operation::UpdateProject).await?;
    Ok(())
  }

  pub async fn delete_project(&self, auth: &Auth, project_id: ProjectId) -> Result<()> {
    let request = ApiRequest::new(Method::DELETE, format!("/projects/{}", project_id), auth);
    self.write(request, Operation::DeleteProject).await?;
    Ok(())
  }
}

fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T> {
  serde_json::from_str(&response.body).map_err(|source| Failure::Decode {
    path: path.to_string(),
    source,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::queue::testing::FakeTransport;

  #[tokio::test]
  async fn test_list_jobs_sends_pagination_parameters() {
    let fake = FakeTransport::new(|_| FakeTransport::json(200, json!([])));
    let client = QueueClient::with_transport(fake.clone());

    client
      .list_jobs(&Auth::new("t"), "c1", 10, 30)
      .await
      .unwrap();

    let sent = fake.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::GET);
    assert_eq!(sent[0].path, "/jobs/");
    assert_eq!(sent[0].query_value("size"), Some("10"));
    assert_eq!(sent[0].query_value("from_index"), Some("30"));
    assert_eq!(sent[0].query_value("collab"), Some("c1"));
    assert!(sent[0].json);
  }

  #[tokio::test]
  async fn test_log_is_plain_text() {
    let fake = FakeTransport::new(|_| FakeTransport::text(200, "step 1\nstep 2\n"));
    let client = QueueClient::with_transport(fake.clone());

    let log = client.get_log(&Auth::new("t"), 5).await.unwrap();
    assert_eq!(log, "step 1\nstep 2\n");
    let sent = &fake.requests()[0];
    assert_eq!(sent.path, "/jobs/5/log");
    assert!(!sent.json);
    assert_eq!(sent.auth.bearer(), "Bearer t");
  }

  #[tokio::test]
  async fn test_read_failure_reports_status() {
    let fake = FakeTransport::new(|_| FakeTransport::text(503, "unavailable"));
    let client = QueueClient::with_transport(fake);

    let err = client.list_tags(&Auth::new("t"), "c1").await.unwrap_err();
    assert!(matches!(err, Failure::Status { status: 503, .. }));
  }

  #[tokio::test]
  async fn test_tag_body_is_single_element_array() {
    let fake = FakeTransport::new(|_| FakeTransport::json(200, json!({})));
    let client = QueueClient::with_transport(fake.clone());

    client.remove_tag(&Auth::new("t"), 8, "old").await.unwrap();

    let sent = &fake.requests()[0];
    assert_eq!(sent.method, Method::DELETE);
    assert_eq!(sent.path, "/jobs/8/tags/");
    assert_eq!(sent.body, Some(json!(["old"])));
  }

  #[tokio::test]
  async fn test_output_repository_body() {
    let fake = FakeTransport::new(|_| {
      FakeTransport::json(200, json!({"repository": "EBRAINS Drive", "files": []}))
    });
    let client = QueueClient::with_transport(fake.clone());

    let output = client
      .set_output_repository(&Auth::new("t"), 3, "EBRAINS Drive")
      .await
      .unwrap();

    assert_eq!(output.repository.as_deref(), Some("EBRAINS Drive"));
    assert_eq!(
      fake.requests()[0].body,
      Some(json!({"repository": "EBRAINS Drive", "files": []}))
    );
  }

  #[tokio::test]
  async fn test_refused_write_carries_detail() {
    let fake = FakeTransport::new(|_| FakeTransport::json(403, json!({"detail": "not a member"})));
    let client = QueueClient::with_transport(fake);

    let err = client
      .create_job(&Auth::new("t"), Map::new())
      .await
      .unwrap_err();
    assert_eq!(
      err.to_string(),
      "Job creation was not successful. not a member"
    );
  }
}
