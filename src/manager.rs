//! Credential lifecycle manager
//!
//! Holds the persisted credential pair, renews the access credential ahead of
//! expiry and tears the session down when renewal is impossible. Proactive
//! (timer) and reactive (interceptor) renewals share one single-flight
//! executor, so concurrent triggers collapse into a single network call.

use crate::clock::{now_millis, ExpirationClock};
use crate::config::ClientConfig;
use crate::decoder::decode;
use crate::error::{RenewalFailure, Result};
use crate::interceptor::Interceptor;
use crate::scheduler::{RenewalScheduler, SchedulerState};
use crate::token_store::{CredentialStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ROLE_KEY};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{ErrorBody, RefreshRequest, RefreshResponse};
use async_singleflight::UnaryGroup;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

/// Every renewal shares this key; there is only one credential pair.
const RENEWAL_FLIGHT_KEY: &str = "renewal";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session changes observable by the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A fresh access credential was persisted
    Renewed,
    /// Credentials were cleared because renewal is impossible; log in again
    ReauthRequired,
    /// The user logged out
    LoggedOut,
}

struct Inner<T, S> {
    config: ClientConfig,
    refresh_url: Url,
    logout_url: Url,
    clock: ExpirationClock,
    transport: T,
    store: S,
    scheduler: RenewalScheduler,
    /// Singleflight group so proactive and reactive renewals never race.
    /// The whole outcome is the shared value: waiters see the leader's
    /// failure too, not just its token.
    renewal_singleflight: UnaryGroup<std::result::Result<String, RenewalFailure>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Owns the renewal lifecycle for one credential pair.
///
/// Cheap to clone; clones share state. Construct one per process.
pub struct CredentialManager<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for CredentialManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport, S: CredentialStore> CredentialManager<T, S> {
    /// Create a manager over `transport` and `store`. Nothing is scheduled until [`start`](Self::start).
    ///
    /// `transport` is the undecorated primitive: renewal and logout calls must
    /// not pass through the interceptor.
    pub fn new(config: ClientConfig, transport: T, store: S) -> Result<Self> {
        let refresh_url = config.refresh_url()?;
        let logout_url = config.logout_url()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                clock: config.clock(),
                config,
                refresh_url,
                logout_url,
                transport,
                store,
                scheduler: RenewalScheduler::new(),
                renewal_singleflight: UnaryGroup::new(),
                events,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.scheduler.state()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.scheduler.has_pending_timer()
    }

    /// A usable session exists when an access credential is stored
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.contains(ACCESS_TOKEN_KEY)
    }

    pub fn role(&self) -> Option<String> {
        self.inner.store.get(USER_ROLE_KEY)
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.store.get(ACCESS_TOKEN_KEY)
    }

    /// Attach the current access credential to `request`, if there is one
    pub fn authorize(&self, mut request: ApiRequest) -> Result<ApiRequest> {
        if let Some(token) = self.access_token() {
            request.set_bearer(&token)?;
        }
        Ok(request)
    }

    /// Wrap a copy of the base transport so expired-credential rejections are
    /// renewed and retried once.
    pub fn interceptor(&self) -> Interceptor<T, Self>
    where
        T: Clone,
    {
        Interceptor::new(self.inner.transport.clone(), self.clone())
            .with_expired_marker(self.inner.config.expired_marker.clone())
    }

    /// Persist a credential pair handed over by the login flow and start renewal.
    pub fn establish_session(&self, access_token: String, refresh_token: String, role: Option<String>) {
        let store = &self.inner.store;
        store.set(ACCESS_TOKEN_KEY, access_token);
        store.set(REFRESH_TOKEN_KEY, refresh_token);
        match role {
            Some(role) => store.set(USER_ROLE_KEY, role),
            None => store.remove(USER_ROLE_KEY),
        }
        info!("Session established");
        self.start();
    }

    /// Begin managing the stored credential.
    ///
    /// Renews right away when the credential is due soon (or unreadable),
    /// otherwise arms the timer for the due instant. Without an access
    /// credential the scheduler stays idle.
    pub fn start(&self) {
        self.inner.scheduler.reset();

        let Some(access_token) = self.inner.store.get(ACCESS_TOKEN_KEY) else {
            debug!("No access credential, renewal idle");
            return;
        };

        let decoded = decode(&access_token);
        if let Err(e) = &decoded {
            warn!(error = %e, "Access credential payload unreadable, treating as due");
        }

        let now = now_millis();
        if self.inner.clock.is_due_soon(&decoded, now) {
            info!("Access credential due for renewal, renewing now");
            self.inner.scheduler.begin_refresh();
            let manager = self.clone();
            tokio::spawn(async move {
                let _ = manager.refresh().await;
            });
        } else {
            self.arm(self.inner.clock.time_until_due(&decoded, now));
        }
    }

    /// Cancel the pending timer. An in-flight renewal still completes.
    pub fn stop(&self) {
        self.inner.scheduler.stop();
        debug!("Credential manager stopped");
    }

    /// Trade the renewal credential for a fresh access credential.
    ///
    /// Concurrent callers share one network exchange and its outcome, success
    /// or failure. Any failure clears the session before returning.
    ///
    /// The exchange runs on its own task: dropping a caller never abandons a
    /// renewal halfway, and a waiter whose leader was dropped takes over.
    pub async fn refresh(&self) -> std::result::Result<String, RenewalFailure> {
        let manager = self.clone();
        let (outcome, leader) = self
            .inner
            .renewal_singleflight
            .work(RENEWAL_FLIGHT_KEY, async move {
                let executor = manager.clone();
                match tokio::spawn(async move { executor.do_refresh().await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(error = %e, "Renewal task did not complete");
                        manager.on_expired();
                        Err(RenewalFailure::Transport(e.to_string()))
                    }
                }
            })
            .await;

        if !leader {
            debug!("Renewal outcome shared with concurrent callers");
        }
        outcome
    }

    async fn do_refresh(&self) -> std::result::Result<String, RenewalFailure> {
        self.inner.scheduler.begin_refresh();

        let Some(refresh_token) = self.inner.store.get(REFRESH_TOKEN_KEY) else {
            warn!("No renewal credential available");
            self.on_expired();
            return Err(RenewalFailure::NoRenewalCredential);
        };

        match self.exchange(&refresh_token).await {
            Ok(access_token) => {
                self.inner
                    .store
                    .set(ACCESS_TOKEN_KEY, access_token.clone());
                info!("Access token renewed");
                self.schedule_next();
                let _ = self.inner.events.send(SessionEvent::Renewed);
                Ok(access_token)
            }
            Err(failure) => {
                warn!(error = %failure, "Credential renewal failed");
                self.on_expired();
                Err(failure)
            }
        }
    }

    async fn exchange(&self, refresh_token: &str) -> std::result::Result<String, RenewalFailure> {
        let request = ApiRequest::post(self.inner.refresh_url.as_str())
            .json(&RefreshRequest { refresh_token })
            .map_err(|e| RenewalFailure::Transport(e.to_string()))?;

        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|e| RenewalFailure::Transport(e.to_string()))?;

        if !response.status.is_success() {
            return Err(RenewalFailure::Rejected {
                status: response.status.as_u16(),
                message: ErrorBody::message_or_default(&response.body),
            });
        }

        let body: RefreshResponse = response
            .json()
            .map_err(|e| RenewalFailure::MalformedResponse(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(RenewalFailure::MalformedResponse(
                "empty access_token".to_string(),
            ));
        }

        Ok(body.access_token)
    }

    /// Re-arm from whatever access credential is stored now.
    fn schedule_next(&self) {
        let Some(access_token) = self.inner.store.get(ACCESS_TOKEN_KEY) else {
            self.inner.scheduler.settle();
            return;
        };
        let delay = self
            .inner
            .clock
            .time_until_due(&decode(&access_token), now_millis());
        self.arm(delay);
    }

    fn arm(&self, delay: Duration) {
        let manager = Arc::downgrade(&self.inner);
        let armed = self.inner.scheduler.arm(delay, move || async move {
            if let Some(inner) = manager.upgrade() {
                let _ = CredentialManager { inner }.refresh().await;
            }
        });

        if armed {
            info!(
                delay_secs = %delay.as_secs(),
                "Access token renewal scheduled"
            );
        } else {
            self.inner.scheduler.settle();
        }
    }

    /// Clear the session and ask the user to log in again. Safe to repeat.
    pub fn on_expired(&self) {
        warn!("Session expired or renewal failed, re-authentication required");
        self.inner.store.clear();
        self.inner.scheduler.stop();
        let _ = self.inner.events.send(SessionEvent::ReauthRequired);
    }

    /// Best-effort server-side logout, then local teardown.
    pub async fn logout(&self) {
        if let Some(access_token) = self.inner.store.get(ACCESS_TOKEN_KEY) {
            match self.send_logout(&access_token).await {
                Ok(response) => debug!(status = %response.status, "Logout call completed"),
                Err(e) => warn!(error = %e, "Logout call failed, clearing session anyway"),
            }
        }

        self.inner.store.clear();
        self.inner.scheduler.stop();
        let _ = self.inner.events.send(SessionEvent::LoggedOut);
        info!("Logged out");
    }

    async fn send_logout(&self, access_token: &str) -> Result<ApiResponse> {
        let request = ApiRequest::post(self.inner.logout_url.as_str()).bearer_auth(access_token)?;
        self.inner.transport.send(request).await
    }
}
