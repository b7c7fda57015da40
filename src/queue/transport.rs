//! HTTP transport seam between the API client and the network.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::types::Auth;
use crate::error::{Failure, Result};

/// A single call to the queue API, relative to the server base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
  pub method: Method,
  pub path: String,
  pub query: Vec<(&'static str, String)>,
  pub body: Option<Value>,
  /// Send `Content-Type: application/json`
  pub json: bool,
  pub auth: Auth,
}

impl ApiRequest {
  pub fn new(method: Method, path: impl Into<String>, auth: &Auth) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
      json: true,
      auth: auth.clone(),
    }
  }

  pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
    self.query.push((key, value.to_string()));
    self
  }

  pub fn body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  /// Drop the JSON content type, for plain-text endpoints. The bearer
  /// header is still sent: logs are only readable by collaboration members.
  pub fn plain(mut self) -> Self {
    self.json = false;
    self
  }

  /// Value of the `key` query parameter, if present.
  pub fn query_value(&self, key: &str) -> Option<&str> {
    self
      .query
      .iter()
      .find(|(k, _)| *k == key)
      .map(|(_, v)| v.as_str())
  }
}

/// Status and raw body of a response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub status: u16,
  pub body: String,
}

impl ApiResponse {
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Sends requests to the queue server.
pub trait Transport: Send + Sync {
  fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>>;
}

/// Transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: String,
}

impl HttpTransport {
  pub fn new(base_url: &str) -> Result<Self> {
    // Validate early so a bad config fails before the first request
    Url::parse(base_url).map_err(|e| Failure::Transport {
      path: base_url.to_string(),
      message: format!("invalid server URL: {}", e),
    })?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("jobq/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| Failure::Transport {
        path: base_url.to_string(),
        message: e.to_string(),
      })?;

    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  /// Join the base URL (which may carry a path prefix) with an endpoint.
  fn url_for(&self, request: &ApiRequest) -> Result<Url> {
    let mut url =
      Url::parse(&format!("{}{}", self.base_url, request.path)).map_err(|e| {
        Failure::Transport {
          path: request.path.clone(),
          message: e.to_string(),
        }
      })?;

    if !request.query.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (key, value) in &request.query {
        pairs.append_pair(key, value);
      }
    }

    Ok(url)
  }

  async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
    let url = self.url_for(&request)?;
    let transport_failure = |e: reqwest::Error| Failure::Transport {
      path: request.path.clone(),
      message: e.to_string(),
    };

    tracing::debug!(method = %request.method, %url, "sending request");

    let mut builder = self
      .http
      .request(request.method.clone(), url)
      .header(AUTHORIZATION, request.auth.bearer());
    if request.json {
      builder = builder.header(CONTENT_TYPE, "application/json");
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.to_string());
    }

    let response = builder.send().await.map_err(transport_failure)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport_failure)?;

    tracing::debug!(method = %request.method, path = %request.path, status, "received response");

    Ok(ApiResponse { status, body })
  }
}

impl Transport for HttpTransport {
  fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
    self.execute(request).boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_url_keeps_base_path_prefix() {
    let transport = HttpTransport::new("https://queue.example.org/api/v3/").unwrap();
    let auth = Auth::new("t");
    let request = ApiRequest::new(Method::GET, "/jobs/", &auth)
      .query("size", 10)
      .query("from_index", 0)
      .query("collab", "my collab");

    let url = transport.url_for(&request).unwrap();
    assert_eq!(
      url.as_str(),
      "https://queue.example.org/api/v3/jobs/?size=10&from_index=0&collab=my+collab"
    );
  }

  #[test]
  fn test_invalid_base_url_is_rejected() {
    assert!(HttpTransport::new("not a url").is_err());
  }

  #[test]
  fn test_query_value_lookup() {
    let auth = Auth::new("t");
    let request = ApiRequest::new(Method::GET, "/tags/", &auth).query("collab", "c1");
    assert_eq!(request.query_value("collab"), Some("c1"));
    assert_eq!(request.query_value("size"), None);
  }
}
