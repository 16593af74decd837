//! Wire bodies exchanged with the renewal and resource endpoints

use serde::{Deserialize, Serialize};

/// Body of `POST /api/refresh`
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Successful renewal response. Extra fields (`success`, `message`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Error body returned alongside non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Parse an error body, tolerating anything that isn't JSON.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Message text, or an empty string when the server sent none
    pub fn message_or_default(body: &[u8]) -> String {
        Self::parse(body)
            .and_then(|b| b.message)
            .unwrap_or_default()
    }
}
