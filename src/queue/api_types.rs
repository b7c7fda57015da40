//! Wire types for request bodies and error responses.
//!
//! Records themselves (jobs, projects, ...) deserialize straight into the
//! domain types; only the shapes that exist purely on the wire live here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::DataItem;

/// Body of `PUT /jobs/{id}/output_data`
#[derive(Debug, Serialize)]
pub struct ApiOutputDataUpdate<'a> {
  pub repository: &'a str,
  pub files: Vec<DataItem>,
}

/// Error body returned by the server on refused requests.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub detail: Option<Value>,
}

impl ApiErrorBody {
  /// Human-readable detail. Validation errors arrive as structured JSON
  /// and are rendered compactly.
  pub fn into_detail(self) -> Option<String> {
    match self.detail? {
      Value::Null => None,
      Value::String(s) => Some(s),
      other => Some(other.to_string()),
    }
  }
}

/// Extract the server-supplied detail from an error response body.
pub fn error_detail(body: &str) -> Option<String> {
  match serde_json::from_str::<ApiErrorBody>(body) {
    Ok(parsed) => parsed.into_detail(),
    Err(e) => {
      tracing::debug!(error = %e, "Unable to get error details");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_string_detail() {
    assert_eq!(
      error_detail(r#"{"detail": "quota exceeded"}"#),
      Some("quota exceeded".to_string())
    );
  }

  #[test]
  fn test_structured_detail_is_rendered() {
    let detail = error_detail(r#"{"detail": [{"loc": ["body", "code"]}]}"#).unwrap();
    assert!(detail.contains("code"));
  }

  #[test]
  fn test_unparseable_body_has_no_detail() {
    assert_eq!(error_detail("<html>Bad Gateway</html>"), None);
    assert_eq!(error_detail(r#"{"message": "nope"}"#), None);
  }
}
