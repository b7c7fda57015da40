//! Queue client with an in-memory session cache.

use serde_json::{Map, Value};

use crate::cache::{Cache, Cacheable, JobCursor};
use crate::error::{Failure, Operation, Result};

use super::client::QueueClient;
use super::refresh::{RefreshEvents, Refresher};
use super::types::{
  Auth, Collab, Comment, Job, JobId, NewComment, OutputData, Project, ProjectId,
};

/// Queue client with transparent caching.
///
/// This wraps [`QueueClient`] with the same operations, but memoizes
/// results for the lifetime of the session and patches the cache after
/// every successful write. Clones share the cache.
#[derive(Clone)]
pub struct CachedQueueClient {
  inner: QueueClient,
  cache: Cache,
  refresher: Refresher,
}

impl CachedQueueClient {
  /// Start a session with an empty cache.
  pub fn new(inner: QueueClient) -> Self {
    Self::with_cache(inner, Cache::new())
  }

  pub fn with_cache(inner: QueueClient, cache: Cache) -> Self {
    Self {
      inner,
      cache,
      refresher: Refresher::new(),
    }
  }

  pub fn cache(&self) -> &Cache {
    &self.cache
  }

  /// Drop all cached data, e.g. on logout.
  pub fn clear(&self) {
    tracing::info!("clearing session cache");
    self.cache.clear();
  }

  /// Outcomes of background refreshes started after this call.
  pub fn subscribe_refreshes(&self) -> RefreshEvents {
    self.refresher.subscribe()
  }

  pub fn job_cursor(&self, collab: &str) -> JobCursor {
    self.cache.job_window(collab).1
  }

  // --------------------------------------------------------------------------
  // Queries
  // --------------------------------------------------------------------------

  /// Collaborations of the current user, fetched once per session.
  pub async fn list_collabs(&self, auth: &Auth) -> Result<Vec<Collab>> {
    if let Some(collabs) = self.cache.collabs() {
      return Ok(collabs);
    }
    let collabs = self.inner.list_collabs(auth).await?;
    self.cache.store_collabs(collabs.clone());
    Ok(collabs)
  }

  /// The `requested` newest jobs of a collaboration.
  ///
  /// The server is only asked when `requested` exceeds both the cached
  /// count and the cursor, and then only for the part beyond the cursor.
  /// Incomplete jobs are re-read in the background afterwards.
  pub async fn query_jobs(&self, collab: &str, auth: &Auth, requested: usize) -> Result<Vec<Job>> {
    let (cached, cursor) = self.cache.job_window(collab);

    if requested > cached && requested > cursor.fetched {
      let delta = requested - cursor.fetched;
      let page = self
        .inner
        .list_jobs(auth, collab, delta, cursor.fetched)
        .await?;
      tracing::debug!(
        collab,
        from_index = cursor.fetched,
        size = delta,
        received = page.len(),
        last_fetch = ?cursor.fetched_at,
        "fetched job page"
      );
      self.cache.merge_job_page(collab, page, requested);
    }

    let jobs = self.cache.jobs_descending(collab);
    self.refresh_incomplete(collab, auth, &jobs);

    Ok(jobs.into_iter().take(requested).collect())
  }

  fn refresh_incomplete(&self, collab: &str, auth: &Auth, jobs: &[Job]) {
    for job in jobs.iter().filter(|j| j.is_incomplete()) {
      let this = self.clone();
      let auth = auth.clone();
      let collab_id = collab.to_string();
      let job_id = job.id;
      self.refresher.spawn(collab, job_id, async move {
        this.get_job(job_id, &collab_id, &auth).await
      });
    }
  }

  /// A single job, re-read unless the cached copy is complete and fully
  /// loaded.
  ///
  /// A refused read is logged and answered from the cache, which may
  /// leave the caller with stale data or `None`.
  pub async fn get_job(&self, job_id: JobId, collab: &str, auth: &Auth) -> Result<Option<Job>> {
    let cached = self.cache.job(collab, job_id);
    let needs_fetch = cached
      .as_ref()
      .map_or(true, |job| job.is_almost_empty() || job.is_incomplete());
    if !needs_fetch {
      return Ok(cached);
    }

    match self.inner.get_job(auth, job_id).await {
      Ok(job) => {
        self.cache.store_job(collab, job.clone());
        Ok(Some(job))
      }
      Err(Failure::Status { status: 401, .. }) => {
        tracing::warn!(job_id, "not authorized to read job, serving cached copy");
        Ok(cached)
      }
      Err(Failure::Status { status, .. }) => {
        tracing::warn!(job_id, status, "job read refused, serving cached copy");
        Ok(cached)
      }
      Err(e) => Err(e),
    }
  }

  /// Tags in use in a collaboration, fetched once per session.
  pub async fn query_tags(&self, collab: &str, auth: &Auth) -> Result<Vec<String>> {
    if let Some(tags) = self.cache.tags(collab) {
      return Ok(tags);
    }
    let tags = self.inner.list_tags(auth, collab).await?;
    self.cache.store_tags(collab, tags.clone());
    Ok(tags)
  }

  /// Job log; never re-read once cached.
  pub async fn get_log(&self, job_id: JobId, auth: &Auth) -> Result<String> {
    if let Some(log) = self.cache.log(job_id) {
      return Ok(log);
    }
    let log = self.inner.get_log(auth, job_id).await?;
    self.cache.store_log(job_id, log.clone());
    Ok(log)
  }

  pub async fn get_comments(&self, job_id: JobId, auth: &Auth) -> Result<Vec<Comment>> {
    if let Some(comments) = self.cache.comments(job_id) {
      return Ok(comments);
    }
    let comments = self.inner.list_comments(auth, job_id).await?;
    self.cache.store_comments(job_id, comments.clone());
    Ok(comments)
  }

  /// Projects of a collaboration, fetched only while none are cached.
  pub async fn query_projects(&self, collab: &str, auth: &Auth) -> Result<Vec<Project>> {
    if !self.cache.has_projects(collab) {
      let projects = self.inner.list_projects(auth, collab).await?;
      tracing::debug!(collab, count = projects.len(), "fetched projects");
      self.cache.merge_projects(collab, projects);
    }
    Ok(self.cache.projects_sorted(collab))
  }

  // --------------------------------------------------------------------------
  // Job mutations
  // --------------------------------------------------------------------------

  pub async fn create_job(
    &self,
    collab: &str,
    mut fields: Map<String, Value>,
    auth: &Auth,
  ) -> Result<Job> {
    fields.insert("collab".to_string(), Value::String(collab.to_string()));
    let job = self.inner.create_job(auth, fields).await?;
    tracing::info!(collab, job_id = job.id, "job created");
    self.cache.store_job(collab, job.clone());
    Ok(job)
  }

  pub async fn hide_job(&self, collab: &str, job_id: JobId, auth: &Auth) -> Result<()> {
    self.inner.hide_job(auth, job_id).await?;
    tracing::info!(collab, job_id, "job hidden");
    self.cache.remove_job(collab, job_id);
    Ok(())
  }

  /// Post a comment. It is appended to the cached thread only when the
  /// thread has already been fetched.
  pub async fn create_comment(
    &self,
    job_id: JobId,
    comment: &NewComment,
    auth: &Auth,
  ) -> Result<Comment> {
    let created = self.inner.create_comment(auth, job_id, comment).await?;
    if !self.cache.push_comment(job_id, created.clone()) {
      tracing::debug!(job_id, comment_id = created.id, "comment not appended to cached thread");
    }
    Ok(created)
  }

  pub async fn add_tag(&self, collab: &str, job_id: JobId, tag: &str, auth: &Auth) -> Result<()> {
    if let Err(e) = self.inner.add_tag(auth, job_id, tag).await {
      tracing::error!(job_id, tag, error = %e, "Unable to add tag");
      return Err(e);
    }

    let patched = self.cache.update_job(collab, job_id, |job| {
      job
        .tags
        .get_or_insert_with(Vec::new)
        .push(tag.to_string())
    });
    if !patched {
      tracing::debug!(job_id, "tagged job not cached");
    }
    self.cache.add_collab_tag(collab, tag);
    Ok(())
  }

  /// Remove one occurrence of `tag` from a job.
  pub async fn delete_tag(
    &self,
    collab: &str,
    job_id: JobId,
    tag: &str,
    auth: &Auth,
  ) -> Result<()> {
    if let Err(e) = self.inner.remove_tag(auth, job_id, tag).await {
      tracing::error!(job_id, tag, error = %e, "Unable to remove tag");
      return Err(e);
    }

    self.cache.update_job(collab, job_id, |job| {
      if let Some(tags) = job.tags.as_mut() {
        if let Some(pos) = tags.iter().position(|t| t == tag) {
          tags.remove(pos);
        }
      }
    });
    Ok(())
  }

  pub async fn change_repository(
    &self,
    collab: &str,
    job_id: JobId,
    repository: &str,
    auth: &Auth,
  ) -> Result<OutputData> {
    let output = self
      .inner
      .set_output_repository(auth, job_id, repository)
      .await?;
    let stored = output.clone();
    self
      .cache
      .update_job(collab, job_id, |job| job.output_data = Some(stored));
    Ok(output)
  }

  // --------------------------------------------------------------------------
  // Project mutations
  // --------------------------------------------------------------------------

  pub async fn create_project(
    &self,
    collab: &str,
    mut fields: Map<String, Value>,
    auth: &Auth,
  ) -> Result<Project> {
    fields.insert("collab".to_string(), Value::String(collab.to_string()));
    let project = self.inner.create_project(auth, fields).await?;
    tracing::info!(collab, project_id = project.id, "project created");
    self.cache.store_project(collab, project.clone());
    Ok(project)
  }

  /// Update a project and shallow-merge `fields` into the cached copy.
  pub async fn patch_project(
    &self,
    collab: &str,
    project_id: ProjectId,
    fields: Map<String, Value>,
    auth: &Auth,
  ) -> Result<()> {
    match self.inner.update_project(auth, project_id, &fields).await {
      Ok(()) => {}
      Err(Failure::Transport { message, .. }) => {
        tracing::warn!(project_id, %message, "project update request failed");
        return Err(Failure::Rejected {
          operation: Operation::UpdateProject,
          status: None,
          detail: None,
        });
      }
      Err(e) => return Err(e),
    }

    let Some(cached) = self.cache.project(collab, project_id) else {
      return Ok(());
    };
    match merge_fields(&cached, fields) {
      Ok(merged) => self.cache.store_project(collab, merged),
      Err(e) => {
        tracing::warn!(project_id, error = %e, "cannot merge project update, evicting cached copy");
        self.cache.remove_project(collab, project_id);
      }
    }
    Ok(())
  }

  pub async fn delete_project(&self, collab: &str, project_id: ProjectId, auth: &Auth) -> Result<()> {
    self.inner.delete_project(auth, project_id).await?;
    tracing::info!(collab, project_id, "project deleted");
    self.cache.remove_project(collab, project_id);
    Ok(())
  }
}

/// Overlay `fields` on a record, keeping its id.
fn merge_fields<T: Cacheable>(record: &T, fields: Map<String, Value>) -> serde_json::Result<T> {
  let mut value = serde_json::to_value(record)?;
  if let Value::Object(map) = &mut value {
    map.extend(fields);
    map.insert("id".to_string(), Value::from(record.cache_id()));
  }
  serde_json::from_value(value)
}
