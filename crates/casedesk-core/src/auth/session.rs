use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, AuthGateway, ErrorKind};
use crate::models::{Identity, Membership, User};

use super::tokens::{TokenPair, TokenStore};

const MSG_MISSING_CREDENTIALS: &str = "Email and password are required";
const MSG_LOGIN_FAILED: &str = "Unable to sign in";
const MSG_UNREACHABLE: &str = "Unable to reach the server. Check your connection.";
const MSG_STORAGE_FAILED: &str = "Unable to save session credentials";

/// Where the session currently stands.
///
/// The identity lives inside `Authenticated`, so "has an identity" and
/// "is authenticated" cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Unauthenticated,
    Authenticated(Identity),
}

/// What to do when the stored access token is refused while restoring a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HydrationPolicy {
    /// Try one token refresh on an authentication failure, then give up.
    #[default]
    RefreshOnce,
    /// Discard the stored credentials on any failure.
    DiscardOnError,
}

/// Result of a login attempt. Login never fails with an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failed { message: String },
}

impl LoginOutcome {
    fn failed(message: impl Into<String>) -> Self {
        LoginOutcome::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoginOutcome::Success => None,
            LoginOutcome::Failed { message } => Some(message),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Session expired - please sign in again")]
    Expired(#[source] ApiError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Credential storage failed: {0}")]
    Storage(#[source] anyhow::Error),
}

/// Read-only view handed to pages and routing.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub memberships: Vec<Membership>,
    pub loading: bool,
    pub is_authenticated: bool,
}

/// Session store shared between tasks. The mutex serializes login/logout/refresh.
pub type SharedSession = Arc<Mutex<SessionStore>>;

/// Owns the signed-in identity and the persisted credential pair.
///
/// Starts in `Loading`; call [`SessionStore::init`] once at startup to
/// restore a stored session.
pub struct SessionStore {
    gateway: Arc<dyn AuthGateway>,
    tokens: Box<dyn TokenStore>,
    policy: HydrationPolicy,
    state: SessionState,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn AuthGateway>, tokens: Box<dyn TokenStore>) -> Self {
        Self {
            gateway,
            tokens,
            policy: HydrationPolicy::default(),
            state: SessionState::Loading,
        }
    }

    pub fn with_policy(mut self, policy: HydrationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.identity().map(|i| &i.user)
    }

    pub fn memberships(&self) -> &[Membership] {
        self.identity()
            .map(|i| i.memberships.as_slice())
            .unwrap_or(&[])
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user().cloned(),
            memberships: self.memberships().to_vec(),
            loading: self.is_loading(),
            is_authenticated: self.is_authenticated(),
        }
    }

    /// The persisted credential pair, if any. Read failures are logged and reported as `None`.
    pub fn stored_tokens(&self) -> Option<TokenPair> {
        match self.tokens.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                None
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore the session from stored credentials.
    ///
    /// Always ends in `Authenticated` or `Unauthenticated`. Failures are
    /// logged, never returned; a session that cannot be restored has its
    /// stored credentials removed.
    pub async fn init(&mut self) {
        self.state = SessionState::Loading;

        let Some(tokens) = self.stored_tokens() else {
            debug!("No stored credentials");
            self.state = SessionState::Unauthenticated;
            return;
        };

        let result = match self.gateway.fetch_current_identity(&tokens.access).await {
            Ok(identity) => Ok(identity),
            Err(e) if e.kind() == ErrorKind::Authentication
                && self.policy == HydrationPolicy::RefreshOnce =>
            {
                debug!(error = %e, "Stored access token rejected, attempting refresh");
                self.identity_after_refresh(&tokens).await
            }
            Err(e) => Err(SessionError::Api(e)),
        };

        match result {
            Ok(identity) => {
                info!(user_id = identity.user.id, "Session restored");
                self.state = SessionState::Authenticated(identity);
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore session, discarding credentials");
                self.discard_session();
            }
        }
    }

    async fn identity_after_refresh(&self, tokens: &TokenPair) -> Result<Identity, SessionError> {
        let next = self.exchange_refresh(tokens).await?;
        Ok(self.gateway.fetch_current_identity(&next.access).await?)
    }

    // =========================================================================
    // Login / Logout
    // =========================================================================

    /// Sign in. On success the credential pair is persisted and the identity replaced.
    /// On failure the state is left as it was.
    pub async fn login(&mut self, email: &str, password: &str) -> LoginOutcome {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return LoginOutcome::failed(MSG_MISSING_CREDENTIALS);
        }

        match self.gateway.login(email, password).await {
            Ok(response) => {
                let (identity, access, refresh) = response.into_parts();
                if let Err(e) = self.tokens.save(&TokenPair::new(access, refresh)) {
                    error!(error = %e, "Failed to persist credentials after login");
                    return LoginOutcome::failed(MSG_STORAGE_FAILED);
                }
                info!(
                    user_id = identity.user.id,
                    memberships = identity.memberships.len(),
                    "Login successful"
                );
                self.state = SessionState::Authenticated(identity);
                LoginOutcome::Success
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                LoginOutcome::failed(login_error_message(&e))
            }
        }
    }

    /// Sign out. The remote call is best effort; local teardown always happens.
    ///
    /// When the authority rejects an expired access token, the pair is
    /// refreshed once so the refresh token can still be revoked remotely.
    pub async fn logout(&mut self) {
        if let Some(tokens) = self.stored_tokens() {
            self.revoke_remote(&tokens).await;
        }
        self.discard_session();
        info!("Logged out");
    }

    async fn revoke_remote(&self, tokens: &TokenPair) {
        match self.gateway.logout(&tokens.access, &tokens.refresh).await {
            Ok(()) => return,
            Err(e) if !e.is_authentication() => {
                warn!(error = %e, "Remote logout failed");
                return;
            }
            Err(e) => debug!(error = %e, "Logout rejected the access token, refreshing"),
        }

        let next = match self.exchange_refresh(tokens).await {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "Refresh before logout failed, refresh token not revoked");
                return;
            }
        };
        if let Err(e) = self.gateway.logout(&next.access, &next.refresh).await {
            warn!(error = %e, "Remote logout failed after refresh");
        }
    }

    // =========================================================================
    // Token refresh
    // =========================================================================

    /// Exchange the stored refresh token for a new pair.
    ///
    /// A rejected refresh token ends the session locally.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let tokens = self.stored_tokens().ok_or(SessionError::NotAuthenticated)?;
        match self.exchange_refresh(&tokens).await {
            Ok(_) => {
                info!("Access token refreshed");
                Ok(())
            }
            Err(SessionError::Api(e)) if e.is_authentication() => {
                self.discard_session();
                Err(SessionError::Expired(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Run an authenticated call with the current access token.
    ///
    /// If the authority rejects the token, one refresh is attempted and the
    /// call retried once. A rejected refresh or a rejected retry logs the
    /// session out locally and returns [`SessionError::Expired`]. Other
    /// failures are returned unchanged and keep the session.
    pub async fn authorized<T, F, Fut>(&mut self, mut call: F) -> Result<T, SessionError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        let Some(tokens) = self.stored_tokens() else {
            warn!("Authenticated session has no stored credentials");
            self.discard_session();
            return Err(SessionError::NotAuthenticated);
        };

        match call(tokens.access.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_authentication() => return Err(e.into()),
            Err(e) => debug!(error = %e, "Access token rejected, refreshing"),
        }

        let next = match self.exchange_refresh(&tokens).await {
            Ok(next) => next,
            Err(SessionError::Api(e)) if e.is_authentication() => {
                warn!(error = %e, "Refresh token rejected, ending session");
                self.discard_session();
                return Err(SessionError::Expired(e));
            }
            Err(e) => return Err(e),
        };

        match call(next.access).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_authentication() => {
                warn!(error = %e, "Refreshed token rejected, ending session");
                self.discard_session();
                Err(SessionError::Expired(e))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-fetch the current identity and replace it wholesale.
    pub async fn reload_identity(&mut self) -> Result<(), SessionError> {
        let gateway = Arc::clone(&self.gateway);
        let identity = self
            .authorized(|access| {
                let gateway = Arc::clone(&gateway);
                async move { gateway.fetch_current_identity(&access).await }
            })
            .await?;
        self.state = SessionState::Authenticated(identity);
        Ok(())
    }

    async fn exchange_refresh(&self, tokens: &TokenPair) -> Result<TokenPair, SessionError> {
        let response = self.gateway.refresh_access_token(&tokens.refresh).await?;
        let next = tokens.refreshed(response);
        self.tokens.save(&next).map_err(SessionError::Storage)?;
        Ok(next)
    }

    fn discard_session(&mut self) {
        if let Err(e) = self.tokens.clear() {
            error!(error = %e, "Failed to clear stored credentials");
        }
        self.state = SessionState::Unauthenticated;
    }
}

/// User-facing message for a failed login
fn login_error_message(e: &ApiError) -> String {
    if let Some(detail) = e.detail() {
        return detail;
    }
    match e.kind() {
        ErrorKind::Network => MSG_UNREACHABLE.to_string(),
        _ => MSG_LOGIN_FAILED.to_string(),
    }
}
