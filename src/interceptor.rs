//! Expired-credential retry decorator
//!
//! [`Interceptor`] wraps a [`Transport`]. When a response is a 401 whose
//! `message` mentions expiry, it renews the access credential and replays the
//! original request once with the new bearer token. The replay goes straight
//! to the wrapped transport, so its own 401 is returned as-is.

use crate::error::{RenewalFailure, Result};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::ErrorBody;
use reqwest::StatusCode;
use std::future::Future;
use tracing::{debug, info, warn};

pub const DEFAULT_EXPIRED_MARKER: &str = "expired";

/// Something that can produce a fresh access credential
pub trait Renew: Send + Sync + 'static {
    fn renew(&self) -> impl Future<Output = std::result::Result<String, RenewalFailure>> + Send;
}

impl<T, S> Renew for crate::manager::CredentialManager<T, S>
where
    T: Transport,
    S: crate::token_store::CredentialStore,
{
    async fn renew(&self) -> std::result::Result<String, RenewalFailure> {
        self.refresh().await
    }
}

/// True for a 401 whose JSON `message` contains `marker`
pub fn is_expiry_rejection(response: &ApiResponse, marker: &str) -> bool {
    if response.status != StatusCode::UNAUTHORIZED {
        return false;
    }
    ErrorBody::parse(&response.body)
        .and_then(|body| body.message)
        .is_some_and(|message| message.contains(marker))
}

/// Transport decorator adding renew-and-retry-once on expired credentials
pub struct Interceptor<T, R> {
    transport: T,
    renewer: R,
    expired_marker: String,
}

impl<T: Transport, R: Renew> Interceptor<T, R> {
    pub fn new(transport: T, renewer: R) -> Self {
        Self {
            transport,
            renewer,
            expired_marker: DEFAULT_EXPIRED_MARKER.to_string(),
        }
    }

    pub fn with_expired_marker(mut self, marker: impl Into<String>) -> Self {
        self.expired_marker = marker.into();
        self
    }
}

impl<T: Transport, R: Renew> Transport for Interceptor<T, R> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = self.transport.send(request.clone()).await?;
        if !is_expiry_rejection(&response, &self.expired_marker) {
            return Ok(response);
        }

        info!(url = %request.url, "Access token expired, attempting renewal");
        match self.renewer.renew().await {
            Ok(token) => {
                let mut retry = request;
                if let Err(e) = retry.set_bearer(&token) {
                    warn!(url = %retry.url, error = %e, "Renewed token is not a valid header, returning original response");
                    return Ok(response);
                }
                debug!(url = %retry.url, "Retrying request with renewed access token");
                self.transport.send(retry).await
            }
            Err(failure) => {
                warn!(url = %request.url, error = %failure, "Renewal failed, returning original response");
                Ok(response)
            }
        }
    }
}
