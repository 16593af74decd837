//! Shared fixtures for unit tests

use crate::clock::now_millis;
use crate::error::Result;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Unsigned JWT-shaped token expiring at `exp` (Unix seconds)
pub(crate) fn mint_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::json!({ "user_id": 1, "exp": exp, "type": "access" });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    let signature = URL_SAFE_NO_PAD.encode(b"not-a-real-signature");
    format!("{header}.{payload}.{signature}")
}

/// Token expiring `secs` seconds from now
pub(crate) fn mint_token_in(secs: i64) -> String {
    mint_token(now_millis() / 1000 + secs)
}

pub(crate) fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap();
    let mut response = ApiResponse::new(status, body.to_string());
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync;

/// In-memory transport answering from a closure and recording every request
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Every response takes `latency` of (tokio) time to arrive
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Recorded requests whose URL ends with `path`
    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(path))
            .cloned()
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().push(request.clone());
        // Suspend like a real network call so concurrent callers interleave
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        (self.handler)(&request)
    }
}
