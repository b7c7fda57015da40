//! Core traits for cached records.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::queue::types::{Comment, Job, Project};

/// Trait for records stored in the cache.
///
/// Implementors provide the id they are keyed by. The almost-empty check
/// is derived from the serialized shape of the record.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier within a collaboration
  fn cache_id(&self) -> i64;

  /// Entity type name used in log output (e.g., "job", "project")
  fn entity_type() -> &'static str;

  /// True when the record carries nothing besides its id.
  fn is_almost_empty(&self) -> bool {
    serde_json::to_value(self)
      .map(|v| is_almost_empty(&v))
      .unwrap_or(true)
  }
}

/// Shape heuristic for partially loaded records: an object whose only
/// non-null field is `id`, or a null/empty value.
pub fn is_almost_empty(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::Object(map) => map
      .iter()
      .all(|(key, v)| key == "id" || v.is_null()),
    Value::Array(items) => items.is_empty(),
    Value::String(s) => s.is_empty(),
    _ => false,
  }
}

impl Cacheable for Job {
  fn cache_id(&self) -> i64 {
    self.id
  }

  fn entity_type() -> &'static str {
    "job"
  }
}

impl Cacheable for Project {
  fn cache_id(&self) -> i64 {
    self.id
  }

  fn entity_type() -> &'static str {
    "project"
  }
}

impl Cacheable for Comment {
  fn cache_id(&self) -> i64 {
    self.id
  }

  fn entity_type() -> &'static str {
    "comment"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_id_only_record_is_almost_empty() {
    assert!(is_almost_empty(&json!({"id": 5})));
    assert!(is_almost_empty(&json!({"id": 5, "status": null})));
    assert!(is_almost_empty(&json!({})));
    assert!(!is_almost_empty(&json!({"id": 5, "status": "finished"})));
  }

  #[test]
  fn test_job_almost_empty() {
    let bare: Job = serde_json::from_value(json!({"id": 9})).unwrap();
    assert!(bare.is_almost_empty());

    let loaded: Job = serde_json::from_value(json!({"id": 9, "code": "run()"})).unwrap();
    assert!(!loaded.is_almost_empty());
  }
}
