//! Session manager: owns the token pair and its lifecycle

use crate::api::{AuthApi, Credentials, TokenPair};
use crate::claims::SessionIdentity;
use crate::config::{AuthConfig, SessionConfig};
use crate::error::{AuthApiError, SessionError, SessionResult};
use crate::request::{Attempt, AuthorizeRequest, ResponseFailure, bearer_token, set_bearer};
use crate::storage::{self, TokenStorage};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Whether a usable session is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationState {
    Unauthenticated,
    Authenticated,
}

#[derive(Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    identity: Option<SessionIdentity>,
    last_error: Option<String>,
}

impl SessionState {
    fn authentication(&self) -> AuthenticationState {
        if self.tokens.is_some() && self.identity.is_some() {
            AuthenticationState::Authenticated
        } else {
            AuthenticationState::Unauthenticated
        }
    }
}

type RefreshFuture = Shared<BoxFuture<'static, SessionResult<String>>>;

/// A refresh in progress, keyed by the refresh token it was started with
struct InFlight {
    refresh: String,
    pending: RefreshFuture,
}

struct SessionInner {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn TokenStorage>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    state_tx: watch::Sender<AuthenticationState>,
    in_flight: Mutex<Option<InFlight>>,
}

/// Owner of the access/refresh token pair
///
/// Cloning is cheap and every clone refers to the same session. Consumers
/// read through the accessors; only `login`, the refresh path and `logout`
/// mutate the pair.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Create an unauthenticated manager; call [`Self::initialize`] to restore
    /// a persisted session
    pub fn new(
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn TokenStorage>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(AuthenticationState::Unauthenticated);
        Self {
            inner: Arc::new(SessionInner {
                api,
                storage,
                config,
                state: RwLock::new(SessionState::default()),
                state_tx,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Restore the session persisted in storage, without touching the network
    pub fn initialize(&self) -> AuthenticationState {
        let stored = match storage::load_pair(self.inner.storage.as_ref()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, logging out");
                self.inner.teardown();
                return AuthenticationState::Unauthenticated;
            }
        };

        let Some(tokens) = stored else {
            debug!("No stored session");
            return self.state();
        };

        match SessionIdentity::decode(&tokens.access) {
            Ok(identity) => {
                info!(subject = ?identity.subject(), "Restored stored session");
                self.inner.establish(tokens, identity);
                AuthenticationState::Authenticated
            }
            Err(e) => {
                warn!(error = %e, "Stored access token invalid, logging out");
                self.inner.teardown();
                AuthenticationState::Unauthenticated
            }
        }
    }

    /// Exchange credentials for a new session
    ///
    /// On failure any prior session is left as it was.
    pub async fn login(&self, credentials: &Credentials) -> SessionResult<SessionIdentity> {
        debug!(username = %credentials.username, "Logging in");

        let tokens = match self.inner.api.obtain_token_pair(credentials).await {
            Ok(tokens) => tokens,
            Err(e) => {
                let message = e
                    .detail()
                    .map_or_else(|| AuthConfig::LOGIN_FAILED_MESSAGE.to_string(), str::to_string);
                warn!(error = %e, "Login rejected");
                self.inner.write_state().last_error = Some(message.clone());
                return Err(SessionError::CredentialsRejected(message));
            }
        };

        let identity = SessionIdentity::decode(&tokens.access).inspect_err(|e| {
            warn!(error = %e, "Identity endpoint returned an undecodable access token");
            self.inner.write_state().last_error = Some(e.to_string());
        })?;

        storage::store_pair(self.inner.storage.as_ref(), &tokens)?;
        info!(subject = ?identity.subject(), "Logged in");
        self.inner.establish(tokens, identity.clone());
        Ok(identity)
    }

    /// End the session; safe to call repeatedly and never fails
    ///
    /// A storage failure is logged and recorded in [`Self::last_error`], and
    /// the in-memory session is dropped regardless.
    pub fn logout(&self) {
        self.inner.teardown();
        info!("Logged out");
    }

    /// Attach the access token to an outgoing request
    ///
    /// Tokens within the refresh margin of expiry are refreshed first. Without
    /// a session the request passes through untouched. When the refresh fails
    /// the session has been torn down and the error is returned.
    pub async fn decorate_request<R: AuthorizeRequest>(&self, mut request: R) -> SessionResult<R> {
        let current = {
            let state = self.inner.read_state();
            match (&state.tokens, &state.identity) {
                (Some(tokens), Some(identity)) => Some((tokens.access.clone(), identity.clone())),
                _ => None,
            }
        };

        let Some((access, identity)) = current else {
            return Ok(request);
        };

        if !identity.expires_within(self.inner.config.refresh_margin(), Utc::now()) {
            set_bearer(&mut request, &access)?;
            return Ok(request);
        }

        debug!("Access token near expiry, refreshing before send");
        let access = Arc::clone(&self.inner).refresh_from(Some(access)).await?;
        set_bearer(&mut request, &access)?;
        Ok(request)
    }

    /// Exchange the refresh token for a new access token
    ///
    /// Concurrent callers share one in-flight refresh. Any failure ends the
    /// session; callers must not retry.
    pub async fn refresh_access_token(&self) -> SessionResult<String> {
        Arc::clone(&self.inner).refresh_from(None).await
    }

    /// Recover from a failed response
    ///
    /// A first 401 on a request triggers one refresh, after which `resend`
    /// reissues the request with the new token and its outcome is returned.
    /// Anything else (another status, a request already retried, no refresh
    /// token, a failed refresh) returns `error` unchanged.
    pub async fn handle_response_error<R, T, E, F, Fut>(
        &self,
        mut attempt: Attempt<R>,
        error: E,
        resend: F,
    ) -> Result<T, E>
    where
        R: AuthorizeRequest,
        E: ResponseFailure,
        F: FnOnce(Attempt<R>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !error.is_unauthorized() {
            return Err(error);
        }
        if attempt.is_retry() {
            debug!("Request already retried after refresh, giving up");
            return Err(error);
        }
        if !self.has_refresh_token() {
            debug!("Unauthorized without a refresh token");
            return Err(error);
        }

        attempt.mark_retried();
        let stale = bearer_token(attempt.request_mut());
        let access = match Arc::clone(&self.inner).refresh_from(stale).await {
            Ok(access) => access,
            Err(e) => {
                debug!(error = %e, "Refresh after 401 failed");
                return Err(error);
            }
        };

        if set_bearer(attempt.request_mut(), &access).is_err() {
            return Err(error);
        }
        debug!("Retrying request with refreshed token");
        resend(attempt).await
    }

    /// Current authentication state
    pub fn state(&self) -> AuthenticationState {
        self.inner.read_state().authentication()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthenticationState::Authenticated
    }

    /// Claims of the current access token
    pub fn identity(&self) -> Option<SessionIdentity> {
        self.inner.read_state().identity.clone()
    }

    /// Current access token, as held; may be near expiry
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .read_state()
            .tokens
            .as_ref()
            .map(|tokens| tokens.access.clone())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.inner.read_state().tokens.is_some()
    }

    /// Most recent user-facing error message
    pub fn last_error(&self) -> Option<String> {
        self.inner.read_state().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.write_state().last_error = None;
    }

    /// Watch authentication state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthenticationState> {
        self.inner.state_tx.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

impl SessionInner {
    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, next: AuthenticationState) {
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn establish(&self, tokens: TokenPair, identity: SessionIdentity) {
        {
            let mut state = self.write_state();
            state.tokens = Some(tokens);
            state.identity = Some(identity);
            state.last_error = None;
        }
        self.publish(AuthenticationState::Authenticated);
    }

    fn teardown(&self) {
        let cleared = storage::clear_pair(self.storage.as_ref());
        {
            let mut state = self.write_state();
            state.tokens = None;
            state.identity = None;
            if let Err(e) = &cleared {
                warn!(error = %e, "Failed to clear stored tokens");
                state.last_error = Some(AuthConfig::LOGOUT_FAILED_MESSAGE.to_string());
            }
        }
        self.publish(AuthenticationState::Unauthenticated);
    }

    fn holds_refresh(&self, refresh: &str) -> bool {
        self.read_state()
            .tokens
            .as_ref()
            .is_some_and(|tokens| tokens.refresh == refresh)
    }

    /// Join the in-flight refresh or start one
    ///
    /// `stale` is the access token the caller found unusable. If it has
    /// already been replaced by a token outside the refresh margin, that
    /// token is returned without another round trip.
    async fn refresh_from(self: Arc<Self>, stale: Option<String>) -> SessionResult<String> {
        let pending = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            let (refresh, current) = {
                let state = self.read_state();
                match (&state.tokens, &state.identity) {
                    (Some(tokens), Some(identity)) => (
                        tokens.refresh.clone(),
                        Some((tokens.access.clone(), identity.clone())),
                    ),
                    (Some(tokens), None) => (tokens.refresh.clone(), None),
                    (None, _) => return Err(SessionError::NotAuthenticated),
                }
            };

            let joinable = slot
                .as_ref()
                .filter(|in_flight| in_flight.refresh == refresh)
                .map(|in_flight| in_flight.pending.clone());

            if let Some(pending) = joinable {
                debug!("Joining in-flight token refresh");
                pending
            } else {
                if let (Some(stale), Some((access, identity))) = (&stale, current)
                    && *stale != access
                    && !identity.expires_within(self.config.refresh_margin(), Utc::now())
                {
                    debug!("Access token already refreshed");
                    return Ok(access);
                }

                // A refresh left over from an earlier session is not joined
                let pending = Arc::clone(&self)
                    .perform_refresh(refresh.clone())
                    .boxed()
                    .shared();
                *slot = Some(InFlight {
                    refresh,
                    pending: pending.clone(),
                });
                pending
            }
        };

        pending.await
    }

    async fn perform_refresh(self: Arc<Self>, refresh: String) -> SessionResult<String> {
        debug!("Refreshing access token");
        let outcome = self.api.refresh_access_token(&refresh).await;
        let result = self.apply_refresh(&refresh, outcome);
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|in_flight| in_flight.refresh == refresh) {
            *slot = None;
        }
        result
    }

    fn apply_refresh(
        &self,
        refresh: &str,
        outcome: Result<String, AuthApiError>,
    ) -> SessionResult<String> {
        let access = match outcome {
            Ok(access) => access,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                if self.holds_refresh(refresh) {
                    self.teardown();
                }
                let reason = e.detail().map_or_else(|| e.to_string(), str::to_string);
                return Err(SessionError::RefreshRejected(reason));
            }
        };

        let identity = match SessionIdentity::decode(&access) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Refreshed access token invalid, ending session");
                if self.holds_refresh(refresh) {
                    self.teardown();
                }
                return Err(e);
            }
        };

        {
            let mut guard = self.write_state();
            let state = &mut *guard;
            match state.tokens.as_mut() {
                Some(tokens) if tokens.refresh == refresh => {
                    tokens.access.clone_from(&access);
                    state.identity = Some(identity);
                }
                _ => {
                    debug!("Session changed while refreshing, discarding new token");
                    return Err(SessionError::RefreshRejected(
                        "session changed during refresh".to_string(),
                    ));
                }
            }
        }

        if let Err(e) = self
            .storage
            .set_item(AuthConfig::ACCESS_TOKEN_KEY, &access)
        {
            warn!(error = %e, "Failed to persist refreshed access token");
        }
        self.publish(AuthenticationState::Authenticated);
        info!("Access token refreshed");
        Ok(access)
    }
}
