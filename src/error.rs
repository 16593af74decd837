//! Error types for the renewal client

use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Credential renewal failed: {0}")]
    Renewal(#[from] RenewalFailure),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Failed to parse stored state: {0}")]
    StateParse(#[from] toml::de::Error),

    #[error("Failed to write stored state: {0}")]
    StateWrite(#[from] toml::ser::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Why a renewal attempt did not produce a new access credential.
///
/// Cloneable because every caller waiting on a shared renewal receives the
/// same outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalFailure {
    #[error("no renewal credential stored")]
    NoRenewalCredential,

    #[error("renewal rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("renewal transport error: {0}")]
    Transport(String),

    #[error("malformed renewal response: {0}")]
    MalformedResponse(String),
}
