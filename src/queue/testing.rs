//! Scripted transport for unit tests.

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::error::Result;

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync;

/// Answers every request through a handler and records what was sent.
pub struct FakeTransport {
  handler: Box<Handler>,
  sent: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
  pub fn new<F>(handler: F) -> Arc<Self>
  where
    F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
  {
    Self::fallible(move |req| Ok(handler(req)))
  }

  /// Handler that may also fail at the transport level.
  pub fn fallible<F>(handler: F) -> Arc<Self>
  where
    F: Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
  {
    Arc::new(Self {
      handler: Box::new(handler),
      sent: Mutex::new(Vec::new()),
    })
  }

  pub fn json(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
      status,
      body: body.to_string(),
    }
  }

  pub fn text(status: u16, body: &str) -> ApiResponse {
    ApiResponse {
      status,
      body: body.to_string(),
    }
  }

  pub fn requests(&self) -> Vec<ApiRequest> {
    self.sent.lock().unwrap().clone()
  }

  /// Requests sent to `path` (query string excluded).
  pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
    self
      .requests()
      .into_iter()
      .filter(|r| r.path == path)
      .collect()
  }

  pub fn reset(&self) {
    self.sent.lock().unwrap().clear();
  }
}

impl Transport for FakeTransport {
  fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
    let response = (self.handler)(&request);
    self.sent.lock().unwrap().push(request);
    future::ready(response).boxed()
  }
}
