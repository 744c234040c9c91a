use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use reqwest::Url;
use serde::Deserialize;

use crate::{
    errors::{AuthError, StorageError},
    pkce::{self, PkcePair},
    session::{AuthSession, PendingAuthorization, TokenStore},
};

use super::proxy::ProxyClient;

/// Scopes needed to stream and control playback.
pub const DEFAULT_SCOPES: &[&str] = &[
    "streaming",
    "user-read-email",
    "user-read-private",
    "user-read-playback-state",
    "user-modify-playback-state",
];

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Missing client id is reported when the login URL is built.
    pub client_id: Option<String>,
    pub redirect_uri: String,
    pub auth_url: String,
    /// Base URL of the token-exchange proxy.
    pub proxy_url: String,
    pub scopes: Vec<String>,
    pub show_dialog: bool,
}

impl AuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        proxy_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            redirect_uri: redirect_uri.into(),
            auth_url: crate::config::DEFAULT_AUTH_URL.to_string(),
            proxy_url: proxy_url.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            show_dialog: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoginInitiated,
    CallbackPending,
    LoggedIn,
    Refreshing,
}

/// Query parameters of the OAuth redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Owns the Spotify authorization lifecycle: login URL, callback
/// validation, token exchange through the proxy, transparent refresh and
/// logout.
///
/// One controller is constructed per process (or per test) and shared via
/// `Arc`. All persisted state lives in the [`TokenStore`]; the controller
/// only adds the in-memory state machine and the refresh coalescing.
pub struct AuthController {
    config: AuthConfig,
    store: TokenStore,
    proxy: ProxyClient,
    state: Mutex<AuthState>,
    callback_lock: tokio::sync::Mutex<()>,
    refresh_lock: tokio::sync::Mutex<()>,
    refresh_epoch: AtomicU64,
    logout_epoch: AtomicU64,
}

impl AuthController {
    pub fn new(config: AuthConfig, store: TokenStore) -> Self {
        let proxy = ProxyClient::new(config.proxy_url.clone());
        Self::with_proxy(config, store, proxy)
    }

    pub fn with_proxy(config: AuthConfig, store: TokenStore, proxy: ProxyClient) -> Self {
        let initial = Self::derive_state(&store).unwrap_or(AuthState::LoggedOut);
        Self {
            config,
            store,
            proxy,
            state: Mutex::new(initial),
            callback_lock: tokio::sync::Mutex::new(()),
            refresh_lock: tokio::sync::Mutex::new(()),
            refresh_epoch: AtomicU64::new(0),
            logout_epoch: AtomicU64::new(0),
        }
    }

    fn derive_state(store: &TokenStore) -> Result<AuthState, StorageError> {
        if store.stored()?.is_some() {
            Ok(AuthState::LoggedIn)
        } else if store.pending()?.is_some() {
            Ok(AuthState::LoginInitiated)
        } else {
            Ok(AuthState::LoggedOut)
        }
    }

    fn set_state(&self, next: AuthState) {
        if let Ok(mut state) = self.state.lock() {
            if *state != next {
                tracing::debug!(from = ?*state, to = ?next, "auth state transition");
            }
            *state = next;
        }
    }

    fn settle_state(&self) {
        let next = Self::derive_state(&self.store).unwrap_or(AuthState::LoggedOut);
        self.set_state(next);
    }

    pub fn state(&self) -> AuthState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(AuthState::LoggedOut)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Builds the Spotify authorization URL for the PKCE flow.
    ///
    /// Generates a fresh `state` nonce and PKCE pair, persists both as the
    /// pending authorization (replacing any previous attempt) and returns the
    /// URL the user must visit.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Config`] if the client id is missing or the
    ///   authorization endpoint is not a valid URL. Nothing is persisted.
    /// - [`AuthError::Crypto`] if no secure random source is available.
    ///
    /// # Example
    ///
    /// ```
    /// let url = controller.build_login_url()?;
    /// webbrowser::open(&url)?;
    /// ```
    pub fn build_login_url(&self) -> Result<String, AuthError> {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::Config("SPOTIFY_API_AUTH_CLIENT_ID is not set".into()))?;

        let state = pkce::generate_state()?;
        let pair = PkcePair::generate()?;
        let scope = self.config.scopes.join(" ");

        let mut params = vec![
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("state", state.as_str()),
            ("scope", scope.as_str()),
            ("code_challenge_method", "S256"),
            ("code_challenge", pair.code_challenge.as_str()),
        ];
        if self.config.show_dialog {
            params.push(("show_dialog", "true"));
        }

        let url = Url::parse_with_params(&self.config.auth_url, &params).map_err(|e| {
            AuthError::Config(format!(
                "invalid authorization URL {}: {}",
                self.config.auth_url, e
            ))
        })?;

        self.store.save_pending(&PendingAuthorization {
            state,
            code_verifier: pair.code_verifier,
            created_at: chrono::Utc::now(),
        })?;
        self.set_state(AuthState::LoginInitiated);

        Ok(url.to_string())
    }

    /// Validates the OAuth redirect and exchanges the code for tokens.
    ///
    /// Checks are applied in order:
    /// 1. `error` present → [`AuthError::AuthDenied`] with the provider's
    ///    description; the login attempt is abandoned.
    /// 2. No pending authorization, or its `state` differs from the returned
    ///    one → [`AuthError::StateMismatch`]. Nothing is exchanged and the
    ///    pending authorization is left untouched.
    /// 3. `code` absent → [`AuthError::MissingCode`].
    /// 4. Code and stored verifier are exchanged through the proxy.
    ///
    /// Once the state check passes, the pending `state`/verifier pair is
    /// consumed: it is erased together with saving the session on success,
    /// and erased on any later failure. A second callback with the same code
    /// therefore always fails.
    ///
    /// Callbacks are processed one at a time.
    pub async fn handle_callback(&self, query: &CallbackQuery) -> Result<AuthSession, AuthError> {
        let _guard = self.callback_lock.lock().await;

        if let Some(error) = query.error.as_deref() {
            let description = query
                .error_description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| error.to_string());
            tracing::warn!(error, "authorization was denied");
            self.store.clear_pending()?;
            self.settle_state();
            return Err(AuthError::AuthDenied(description));
        }

        let pending = self
            .store
            .pending()?
            .filter(|p| query.state.as_deref() == Some(p.state.as_str()));
        let Some(pending) = pending else {
            tracing::warn!("callback state does not match the pending authorization");
            return Err(AuthError::StateMismatch);
        };

        let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
            self.store.clear_pending()?;
            self.settle_state();
            return Err(AuthError::MissingCode);
        };

        self.set_state(AuthState::CallbackPending);
        let exchanged = self
            .proxy
            .exchange_code(code, &self.config.redirect_uri, &pending.code_verifier)
            .await;

        match exchanged {
            Ok(tokens) => {
                let session =
                    AuthSession::new(tokens.access_token, tokens.expires_in, tokens.refresh_token);
                self.store.complete_authorization(&session)?;
                self.set_state(AuthState::LoggedIn);
                tracing::debug!(expires_at = %session.expires_at, "authorization completed");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "code exchange failed");
                self.store.clear_pending()?;
                self.settle_state();
                Err(e)
            }
        }
    }

    /// Returns an access token that is valid right now, if the user is
    /// logged in.
    ///
    /// - Unexpired token → returned as-is.
    /// - Expired token with a refresh token → refreshed first. Concurrent
    ///   callers share one in-flight refresh.
    /// - Expired token without a refresh token → logged out, `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`AuthError::RefreshFailed`] when the refresh was attempted and
    /// failed; the session has been cleared by then.
    pub async fn get_valid_token(&self) -> Result<Option<String>, AuthError> {
        let observed = self.refresh_epoch.load(Ordering::Acquire);

        let Some(session) = self.store.stored()? else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session.access_token));
        }
        if session.refresh_token.is_none() {
            tracing::debug!("access token expired without refresh token");
            self.logout()?;
            return Ok(None);
        }

        let refreshed = self.refresh_coalesced(observed).await?;
        Ok(Some(refreshed.access_token))
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// If another refresh completes while this call waits for its turn, its
    /// outcome is returned instead of issuing a second request.
    ///
    /// # Errors
    ///
    /// [`AuthError::RefreshFailed`] if there is nothing to refresh or the
    /// proxy rejects the refresh token. The user is logged out in both cases.
    pub async fn refresh(&self) -> Result<AuthSession, AuthError> {
        let observed = self.refresh_epoch.load(Ordering::Acquire);
        self.refresh_coalesced(observed).await
    }

    async fn refresh_coalesced(&self, observed: u64) -> Result<AuthSession, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_epoch.load(Ordering::Acquire) != observed {
            return self
                .store
                .load()?
                .ok_or_else(|| AuthError::RefreshFailed("session ended during refresh".into()));
        }

        let result = self.perform_refresh().await;
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        result
    }

    async fn perform_refresh(&self) -> Result<AuthSession, AuthError> {
        let Some(session) = self.store.stored()? else {
            return Err(AuthError::RefreshFailed("not logged in".into()));
        };
        let Some(refresh_token) = session.refresh_token.clone() else {
            self.logout()?;
            return Err(AuthError::RefreshFailed("no refresh token available".into()));
        };

        let logout_epoch = self.logout_epoch.load(Ordering::Acquire);
        self.set_state(AuthState::Refreshing);

        match self.proxy.exchange_refresh(&refresh_token).await {
            Ok(tokens) => {
                if self.logout_epoch.load(Ordering::Acquire) != logout_epoch {
                    return Err(AuthError::RefreshFailed("logged out during refresh".into()));
                }
                let refreshed = AuthSession::new(
                    tokens.access_token,
                    tokens.expires_in,
                    tokens.refresh_token.or(Some(refresh_token)),
                );
                self.store.save(&refreshed)?;
                self.set_state(AuthState::LoggedIn);
                tracing::debug!(expires_at = %refreshed.expires_at, "access token refreshed");
                Ok(refreshed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, logging out");
                self.logout()?;
                let message = match e {
                    AuthError::Exchange { message, .. } => message,
                    other => other.to_string(),
                };
                Err(AuthError::RefreshFailed(message))
            }
        }
    }

    /// Clears the session and any pending login. Safe to call repeatedly.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        self.logout_epoch.fetch_add(1, Ordering::AcqRel);
        self.set_state(AuthState::LoggedOut);
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.store.load(), Ok(Some(_)))
    }
}
