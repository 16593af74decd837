//! Token Renewal Client
//!
//! A self-renewing bearer credential layer for HTTP API clients: decodes the
//! access token's expiry, renews it ahead of time, renews and retries once when
//! a request is rejected as expired, and clears the session when renewal is
//! no longer possible.

pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod interceptor;
pub mod manager;
pub mod scheduler;
pub mod token_store;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{ExpirationClock, RENEWAL_BUFFER};
pub use config::ClientConfig;
pub use decoder::{decode, Claims, DecodeError};
pub use error::{ClientError, RenewalFailure, Result};
pub use interceptor::{is_expiry_rejection, Interceptor, Renew};
pub use manager::{CredentialManager, SessionEvent};
pub use scheduler::{RenewalScheduler, SchedulerState};
pub use token_store::{CredentialStore, FileTokenStore, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
