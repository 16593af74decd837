//! Client configuration

use crate::clock::ExpirationClock;
use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const BASE_URL_ENV: &str = "TOKEN_RENEWAL_BASE_URL";
pub const BUFFER_SECS_ENV: &str = "TOKEN_RENEWAL_BUFFER_SECS";

/// Configuration for the credential manager
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// API origin, e.g. `http://localhost:5000`
    pub base_url: Url,

    /// Renewal endpoint path
    /// Default: `/api/refresh`
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Logout endpoint path
    /// Default: `/api/logout`
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Renew this many seconds before the access credential expires
    /// Default: 300 seconds
    #[serde(default = "default_renewal_buffer_secs")]
    pub renewal_buffer_secs: u64,

    /// Substring of a 401 `message` that marks an expired access credential
    /// Default: `expired`
    #[serde(default = "default_expired_marker")]
    pub expired_marker: String,

    /// Timeout for each HTTP request made by the reqwest transport
    /// Default: 30 seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_refresh_path() -> String {
    "/api/refresh".to_string()
}

fn default_logout_path() -> String {
    "/api/logout".to_string()
}

fn default_renewal_buffer_secs() -> u64 {
    300
}

fn default_expired_marker() -> String {
    "expired".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            renewal_buffer_secs: default_renewal_buffer_secs(),
            expired_marker: default_expired_marker(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Build from `TOKEN_RENEWAL_BASE_URL` and, optionally, `TOKEN_RENEWAL_BUFFER_SECS`
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(BASE_URL_ENV)
            .map_err(|_| ClientError::Configuration(format!("{BASE_URL_ENV} is not set")))?;
        let mut config = Self::new(Url::parse(&base_url)?);

        if let Ok(secs) = std::env::var(BUFFER_SECS_ENV) {
            config.renewal_buffer_secs = secs.parse().map_err(|e| {
                ClientError::Configuration(format!("{BUFFER_SECS_ENV} must be an integer: {e}"))
            })?;
        }

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn refresh_url(&self) -> Result<Url> {
        Ok(self.base_url.join(&self.refresh_path)?)
    }

    pub fn logout_url(&self) -> Result<Url> {
        Ok(self.base_url.join(&self.logout_path)?)
    }

    pub fn renewal_buffer(&self) -> Duration {
        Duration::from_secs(self.renewal_buffer_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn clock(&self) -> ExpirationClock {
        ExpirationClock::new(self.renewal_buffer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new(Url::parse("http://localhost:5000").unwrap());
        assert_eq!(config.refresh_url().unwrap().as_str(), "http://localhost:5000/api/refresh");
        assert_eq!(config.logout_url().unwrap().as_str(), "http://localhost:5000/api/logout");
        assert_eq!(config.renewal_buffer(), Duration::from_secs(300));
        assert_eq!(config.expired_marker, "expired");
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = ClientConfig::from_toml_str(
            r#"
            base_url = "https://api.example.com/app/"
            refresh_path = "auth/refresh"
            renewal_buffer_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(
            config.refresh_url().unwrap().as_str(),
            "https://api.example.com/app/auth/refresh"
        );
        assert_eq!(config.renewal_buffer(), Duration::from_secs(60));
        assert_eq!(config.logout_path, "/api/logout");
    }

    #[test]
    fn test_from_toml_requires_base_url() {
        assert!(ClientConfig::from_toml_str("renewal_buffer_secs = 60").is_err());
    }
}
