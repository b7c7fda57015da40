//! In-memory cache storage for queue records.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::traits::Cacheable;
use crate::queue::types::{Collab, Comment, Job, JobId, Project, ProjectId};

/// Pagination state of the job listing for one collaboration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCursor {
  /// Number of jobs requested from the server so far
  pub fetched: usize,
  /// When the last page was fetched
  pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Store {
  collabs: Option<Vec<Collab>>,
  jobs: HashMap<String, BTreeMap<JobId, Job>>,
  job_cursor: HashMap<String, JobCursor>,
  projects: HashMap<String, BTreeMap<ProjectId, Project>>,
  tags: HashMap<String, Vec<String>>,
  logs: HashMap<JobId, String>,
  comments: HashMap<JobId, Vec<Comment>>,
}

impl Store {
  fn jobs_mut(&mut self, collab: &str) -> &mut BTreeMap<JobId, Job> {
    if !self.jobs.contains_key(collab) {
      self.job_cursor.insert(collab.to_string(), JobCursor::default());
    }
    self.jobs.entry(collab.to_string()).or_default()
  }

  fn projects_mut(&mut self, collab: &str) -> &mut BTreeMap<ProjectId, Project> {
    self.projects.entry(collab.to_string()).or_default()
  }
}

/// Session cache shared by every clone of a client.
///
/// All accessors lock internally and hand back owned data, so no guard
/// ever outlives a call.
#[derive(Debug, Clone, Default)]
pub struct Cache {
  store: Arc<Mutex<Store>>,
}

impl Cache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Store> {
    // A panic while holding the lock cannot leave a map half-written
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Forget everything, e.g. on logout.
  pub fn clear(&self) {
    *self.lock() = Store::default();
  }

  // --------------------------------------------------------------------------
  // Collaborations
  // --------------------------------------------------------------------------

  /// Cached collaboration list; `None` until a non-empty list was stored.
  pub fn collabs(&self) -> Option<Vec<Collab>> {
    self.lock().collabs.clone().filter(|c| !c.is_empty())
  }

  pub fn store_collabs(&self, collabs: Vec<Collab>) {
    self.lock().collabs = Some(collabs);
  }

  // --------------------------------------------------------------------------
  // Jobs
  // --------------------------------------------------------------------------

  /// Number of cached jobs and the job cursor for a collaboration.
  ///
  /// Registers the collaboration with an empty map and a zero cursor when
  /// it is seen for the first time.
  pub fn job_window(&self, collab: &str) -> (usize, JobCursor) {
    let mut store = self.lock();
    let count = store.jobs_mut(collab).len();
    let cursor = store.job_cursor.get(collab).copied().unwrap_or_default();
    (count, cursor)
  }

  /// Merge a fetched page by id and move the cursor.
  pub fn merge_job_page(&self, collab: &str, jobs: Vec<Job>, fetched: usize) {
    let mut store = self.lock();
    let cached = store.jobs_mut(collab);
    merge_by_id(cached, jobs);
    store.job_cursor.insert(
      collab.to_string(),
      JobCursor {
        fetched,
        fetched_at: Some(Utc::now()),
      },
    );
  }

  /// Cached jobs of a collaboration, highest id first.
  pub fn jobs_descending(&self, collab: &str) -> Vec<Job> {
    self
      .lock()
      .jobs
      .get(collab)
      .map(|jobs| jobs.values().rev().cloned().collect())
      .unwrap_or_default()
  }

  pub fn job(&self, collab: &str, job_id: JobId) -> Option<Job> {
    self.lock().jobs.get(collab)?.get(&job_id).cloned()
  }

  pub fn store_job(&self, collab: &str, job: Job) {
    self.lock().jobs_mut(collab).insert(job.id, job);
  }

  pub fn remove_job(&self, collab: &str, job_id: JobId) -> Option<Job> {
    self.lock().jobs.get_mut(collab)?.remove(&job_id)
  }

  /// Apply `f` to a cached job. Returns false when the job is not cached.
  pub fn update_job(&self, collab: &str, job_id: JobId, f: impl FnOnce(&mut Job)) -> bool {
    let mut store = self.lock();
    match store.jobs.get_mut(collab).and_then(|j| j.get_mut(&job_id)) {
      Some(job) => {
        f(job);
        true
      }
      None => false,
    }
  }

  // --------------------------------------------------------------------------
  // Tags
  // --------------------------------------------------------------------------

  pub fn tags(&self, collab: &str) -> Option<Vec<String>> {
    self.lock().tags.get(collab).cloned()
  }

  pub fn store_tags(&self, collab: &str, tags: Vec<String>) {
    self.lock().tags.insert(collab.to_string(), tags);
  }

  /// Append a tag to the collaboration list unless it is already there.
  pub fn add_collab_tag(&self, collab: &str, tag: &str) {
    let mut store = self.lock();
    let tags = store.tags.entry(collab.to_string()).or_default();
    if !tags.iter().any(|t| t == tag) {
      tags.push(tag.to_string());
    }
  }

  // --------------------------------------------------------------------------
  // Logs and comments
  // --------------------------------------------------------------------------

  pub fn log(&self, job_id: JobId) -> Option<String> {
    self.lock().logs.get(&job_id).cloned()
  }

  pub fn store_log(&self, job_id: JobId, log: String) {
    self.lock().logs.insert(job_id, log);
  }

  pub fn comments(&self, job_id: JobId) -> Option<Vec<Comment>> {
    self.lock().comments.get(&job_id).cloned()
  }

  pub fn store_comments(&self, job_id: JobId, comments: Vec<Comment>) {
    self.lock().comments.insert(job_id, comments);
  }

  /// Append to an already fetched comment thread. Returns false when the
  /// thread has not been fetched yet or already holds a comment with the
  /// same id.
  pub fn push_comment(&self, job_id: JobId, comment: Comment) -> bool {
    match self.lock().comments.get_mut(&job_id) {
      Some(thread) => append_unique(thread, comment),
      None => false,
    }
  }

  // --------------------------------------------------------------------------
  // Projects
  // --------------------------------------------------------------------------

  pub fn has_projects(&self, collab: &str) -> bool {
    self
      .lock()
      .projects
      .get(collab)
      .is_some_and(|p| !p.is_empty())
  }

  pub fn merge_projects(&self, collab: &str, projects: Vec<Project>) {
    merge_by_id(self.lock().projects_mut(collab), projects);
  }

  /// Cached projects: unsubmitted first, then newest submission first.
  pub fn projects_sorted(&self, collab: &str) -> Vec<Project> {
    let mut projects: Vec<Project> = self
      .lock()
      .projects
      .get(collab)
      .map(|p| p.values().cloned().collect())
      .unwrap_or_default();
    projects.sort_by(project_order);
    projects
  }

  pub fn project(&self, collab: &str, project_id: ProjectId) -> Option<Project> {
    self.lock().projects.get(collab)?.get(&project_id).cloned()
  }

  pub fn store_project(&self, collab: &str, project: Project) {
    self.lock().projects_mut(collab).insert(project.id, project);
  }

  pub fn remove_project(&self, collab: &str, project_id: ProjectId) -> Option<Project> {
    self.lock().projects.get_mut(collab)?.remove(&project_id)
  }
}

fn merge_by_id<T: Cacheable>(cached: &mut BTreeMap<i64, T>, records: Vec<T>) {
  let received = records.len();
  let mut replaced = 0;
  for record in records {
    if cached.insert(record.cache_id(), record).is_some() {
      replaced += 1;
    }
  }
  tracing::debug!(entity = T::entity_type(), received, replaced, "merged into cache");
}

/// Append `record` unless an entry with the same id is already present.
fn append_unique<T: Cacheable>(thread: &mut Vec<T>, record: T) -> bool {
  let id = record.cache_id();
  if thread.iter().any(|r| r.cache_id() == id) {
    tracing::debug!(entity = T::entity_type(), id, "already cached, not appended");
    return false;
  }
  thread.push(record);
  true
}

/// Unsubmitted projects sort first; submitted ones by descending date.
/// Ties fall back to descending id.
pub fn project_order(a: &Project, b: &Project) -> Ordering {
  match (a.submission_date, b.submission_date) {
    (None, None) => b.id.cmp(&a.id),
    (None, Some(_)) => Ordering::Less,
    (Some(_), None) => Ordering::Greater,
    (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.id.cmp(&a.id)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn job(id: i64) -> Job {
    serde_json::from_value(json!({"id": id, "status": "finished"})).unwrap()
  }

  fn project(id: i64, date: Option<&str>) -> Project {
    serde_json::from_value(json!({"id": id, "submission_date": date})).unwrap()
  }

  #[test]
  fn test_first_sight_registers_zero_cursor() {
    let cache = Cache::new();
    let (count, cursor) = cache.job_window("c1");
    assert_eq!(count, 0);
    assert_eq!(cursor.fetched, 0);
    assert!(cursor.fetched_at.is_none());
  }

  #[test]
  fn test_merge_job_page_dedupes_by_id() {
    let cache = Cache::new();
    cache.merge_job_page("c1", vec![job(1), job(2)], 2);
    cache.merge_job_page("c1", vec![job(2), job(3)], 4);

    let ids: Vec<i64> = cache.jobs_descending("c1").iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let (count, cursor) = cache.job_window("c1");
    assert_eq!(count, 3);
    assert_eq!(cursor.fetched, 4);
    assert!(cursor.fetched_at.is_some());
  }

  #[test]
  fn test_project_order() {
    let cache = Cache::new();
    cache.merge_projects(
      "c1",
      vec![
        project(1, Some("2023-01-01")),
        project(2, None),
        project(3, Some("2024-01-01")),
      ],
    );

    let ids: Vec<i64> = cache.projects_sorted("c1").iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
  }

  #[test]
  fn test_collab_tags_are_deduplicated() {
    let cache = Cache::new();
    cache.add_collab_tag("c1", "spinnaker");
    cache.add_collab_tag("c1", "spinnaker");
    cache.add_collab_tag("c1", "brainscales");
    assert_eq!(
      cache.tags("c1"),
      Some(vec!["spinnaker".to_string(), "brainscales".to_string()])
    );
  }

  #[test]
  fn test_push_comment_requires_fetched_thread() {
    let cache = Cache::new();
    let comment: Comment = serde_json::from_value(json!({"id": 1, "content": "hi"})).unwrap();
    assert!(!cache.push_comment(42, comment.clone()));
    assert!(cache.comments(42).is_none());

    cache.store_comments(42, Vec::new());
    assert!(cache.push_comment(42, comment));
    assert_eq!(cache.comments(42).map(|c| c.len()), Some(1));
  }

  #[test]
  fn test_push_comment_skips_duplicate_id() {
    let cache = Cache::new();
    let first: Comment = serde_json::from_value(json!({"id": 1, "content": "hi"})).unwrap();
    let again: Comment = serde_json::from_value(json!({"id": 1, "content": "hi again"})).unwrap();
    cache.store_comments(42, vec![first]);

    assert!(!cache.push_comment(42, again));
    let thread = cache.comments(42).unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].content, "hi");
  }

  #[test]
  fn test_clear_drops_everything() {
    let cache = Cache::new();
    cache.merge_job_page("c1", vec![job(1)], 1);
    cache.store_log(1, "done".to_string());
    cache.store_collabs(vec![]);
    cache.clear();

    assert!(cache.jobs_descending("c1").is_empty());
    assert!(cache.log(1).is_none());
    assert_eq!(cache.job_window("c1").1.fetched, 0);
  }

  #[test]
  fn test_empty_collab_list_counts_as_unfetched() {
    let cache = Cache::new();
    cache.store_collabs(Vec::new());
    assert!(cache.collabs().is_none());
  }
}
