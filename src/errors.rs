//! Error types and the error classifier.
//!
//! Each layer has its own `thiserror` enum. At the presentation boundary every
//! failure is lowered into a [`RawError`] (a code, a message and an optional
//! HTTP status) and then mapped by [`classify`] into a [`ClassifiedError`]:
//! a kind, a user-facing message and the single most relevant recovery
//! action. The classifier is a pure function.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("secure random source unavailable: {0}")]
    CryptoUnavailable(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("authorization denied: {0}")]
    AuthDenied(String),
    #[error("state verification failed")]
    StateMismatch,
    #[error("no authorization code received")]
    MissingCode,
    #[error("token exchange failed: {message}")]
    Exchange {
        status: Option<u16>,
        message: String,
    },
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("session expired")]
    Unauthorized,
    #[error("playback device not found")]
    DeviceNotFound,
    #[error("Spotify Premium required")]
    PremiumRequired,
    #[error("Spotify API error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures reported by a playback SDK implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdkError {
    #[error("player SDK unavailable: {0}")]
    Unavailable(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("account error: {0}")]
    Account(String),
    #[error("playback error: {0}")]
    Playback(String),
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("player SDK did not become ready within {0:?}")]
    SdkLoadTimeout(Duration),
    #[error("player SDK unavailable: {0}")]
    SdkUnavailable(SdkError),
    #[error("failed to connect player")]
    ConnectFailed,
    #[error("player not ready")]
    NotReady,
    #[error("player not initialized")]
    NotInitialized,
    #[error("volume must be between 0 and 100, got {0}")]
    InvalidVolume(u8),
    #[error("missing track id")]
    MissingTrack,
    #[error("no track found for \"{0}\"")]
    TrackNotFound(String),
    #[error("{operation} failed: {source}")]
    Sdk {
        operation: &'static str,
        source: SdkError,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid server address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An error payload before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawError {
    pub code: Option<String>,
    pub message: String,
    pub status: Option<u16>,
}

impl RawError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.to_string()),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Auth,
    Player,
    Account,
    Playback,
    Device,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    Login,
    Refresh,
    Upgrade,
    Retry,
    Wait,
    /// Fatal: nothing the user can click will fix it.
    None,
}

impl RecoveryAction {
    /// Label for the recovery button, if there is one.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            RecoveryAction::Login => Some("Reconnect to Spotify"),
            RecoveryAction::Refresh => Some("Refresh"),
            RecoveryAction::Upgrade => Some("Upgrade to Premium"),
            RecoveryAction::Retry => Some("Try again"),
            RecoveryAction::Wait => Some("Wait and retry"),
            RecoveryAction::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub action: RecoveryAction,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, message: impl Into<String>, action: RecoveryAction) -> Self {
        Self {
            kind,
            message: message.into(),
            action,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action.label() {
            Some(label) => write!(f, "{} [{}]", self.message, label),
            None => f.write_str(&self.message),
        }
    }
}

const SESSION_EXPIRED: &str = "Session expired. Please reconnect to Spotify.";

/// Maps a raw error payload into a user-facing classification.
pub fn classify(raw: &RawError) -> ClassifiedError {
    use ErrorKind as K;
    use RecoveryAction as A;

    if raw.status == Some(401) {
        return ClassifiedError::new(K::Auth, SESSION_EXPIRED, A::Login);
    }

    match raw.code.as_deref() {
        Some("config_error") => {
            return ClassifiedError::new(
                K::Auth,
                "Spotify login is not configured. Set SPOTIFY_API_AUTH_CLIENT_ID.",
                A::None,
            );
        }
        Some("crypto_unavailable") => {
            return ClassifiedError::new(
                K::Auth,
                "Secure login is not supported on this platform.",
                A::None,
            );
        }
        Some("not_logged_in") => {
            return ClassifiedError::new(K::Auth, "Please log in to Spotify.", A::Login);
        }
        Some("no_token" | "unauthorized" | "refresh_failed" | "authentication_error") => {
            return ClassifiedError::new(K::Auth, SESSION_EXPIRED, A::Login);
        }
        Some("auth_denied" | "token_exchange_failed") => {
            let message = if raw.message.is_empty() {
                "Spotify login failed. Please try again.".to_string()
            } else {
                format!("Spotify login failed: {}", raw.message)
            };
            return ClassifiedError::new(K::Auth, message, A::Login);
        }
        Some("state_mismatch") => {
            return ClassifiedError::new(
                K::Auth,
                "Login could not be verified. Please log in again.",
                A::Login,
            );
        }
        Some("missing_code") => {
            return ClassifiedError::new(
                K::Auth,
                "No authorization code received. Please log in again.",
                A::Login,
            );
        }
        Some("sdk_not_available" | "sdk_load_error" | "sdk_timeout") => {
            return ClassifiedError::new(
                K::Player,
                "Spotify player could not be loaded. Please refresh the page.",
                A::Refresh,
            );
        }
        Some("initialization_error") if raw.message.to_lowercase().contains("device") => {
            return ClassifiedError::new(K::Device, raw.message.clone(), A::Retry);
        }
        Some("initialization_error") if !raw.message.is_empty() => {
            return ClassifiedError::new(
                K::Player,
                format!("Failed to connect to Spotify: {}", raw.message),
                A::Refresh,
            );
        }
        Some("connection_failed" | "initialization_error") => {
            return ClassifiedError::new(
                K::Player,
                "Failed to connect to Spotify. Please refresh and try again.",
                A::Refresh,
            );
        }
        Some("player_not_ready" | "player_not_initialized") => {
            return ClassifiedError::new(
                K::Player,
                "Player not ready. Please wait a moment and try again.",
                A::Wait,
            );
        }
        Some("account_error" | "premium_required") => {
            return ClassifiedError::new(
                K::Account,
                "Spotify Premium is required for playback.",
                A::Upgrade,
            );
        }
        Some("device_not_found") => {
            return ClassifiedError::new(
                K::Device,
                "Device not found. Please refresh and try again.",
                A::Refresh,
            );
        }
        Some("playback_error") => {
            return ClassifiedError::new(
                K::Playback,
                "Failed to play track. Please try again.",
                A::Retry,
            );
        }
        Some("api_error" | "invalid_volume" | "missing_track" | "track_not_found")
            if !raw.message.is_empty() =>
        {
            return ClassifiedError::new(K::Playback, raw.message.clone(), A::Retry);
        }
        Some("network_error") => {
            return ClassifiedError::new(
                K::Unknown,
                "Network error. Please check your connection and try again.",
                A::Retry,
            );
        }
        _ => {}
    }

    let lowered = raw.message.to_lowercase();
    if lowered.contains("premium") {
        return ClassifiedError::new(
            K::Account,
            "Spotify Premium is required for playback.",
            A::Upgrade,
        );
    }
    if lowered.contains("device") {
        return ClassifiedError::new(
            K::Device,
            "Device not found. Please refresh and try again.",
            A::Refresh,
        );
    }

    ClassifiedError::new(K::Unknown, "Something went wrong. Please try again.", A::Retry)
}

/// Lowering of a typed error into a [`RawError`].
pub trait Classify {
    fn to_raw(&self) -> RawError;

    fn classify(&self) -> ClassifiedError {
        classify(&self.to_raw())
    }
}

impl Classify for RawError {
    fn to_raw(&self) -> RawError {
        self.clone()
    }
}

impl Classify for CryptoError {
    fn to_raw(&self) -> RawError {
        RawError::new("crypto_unavailable", self.to_string())
    }
}

impl Classify for StorageError {
    fn to_raw(&self) -> RawError {
        RawError::new("storage_error", self.to_string())
    }
}

impl Classify for AuthError {
    fn to_raw(&self) -> RawError {
        match self {
            AuthError::Config(m) => RawError::new("config_error", m.clone()),
            AuthError::Crypto(e) => e.to_raw(),
            AuthError::AuthDenied(m) => RawError::new("auth_denied", m.clone()),
            AuthError::StateMismatch => RawError::new("state_mismatch", self.to_string()),
            AuthError::MissingCode => RawError::new("missing_code", self.to_string()),
            AuthError::Exchange { status, message } => RawError {
                code: Some("token_exchange_failed".into()),
                message: message.clone(),
                status: *status,
            },
            AuthError::RefreshFailed(m) => RawError::new("refresh_failed", m.clone()),
            AuthError::Storage(e) => e.to_raw(),
        }
    }
}

impl Classify for ApiError {
    fn to_raw(&self) -> RawError {
        match self {
            ApiError::NotLoggedIn => RawError::new("not_logged_in", self.to_string()),
            ApiError::Unauthorized => {
                RawError::new("unauthorized", self.to_string()).with_status(401)
            }
            ApiError::DeviceNotFound => {
                RawError::new("device_not_found", self.to_string()).with_status(404)
            }
            ApiError::PremiumRequired => {
                RawError::new("premium_required", self.to_string()).with_status(403)
            }
            ApiError::Status { status, message } => {
                RawError::new("api_error", message.clone()).with_status(*status)
            }
            ApiError::Auth(e) => e.to_raw(),
            ApiError::Http(e) => RawError::new("network_error", e.to_string()),
        }
    }
}

impl Classify for SdkError {
    fn to_raw(&self) -> RawError {
        match self {
            SdkError::Unavailable(m) => RawError::new("sdk_not_available", m.clone()),
            SdkError::Authentication(m) => RawError::new("authentication_error", m.clone()),
            SdkError::Account(m) => RawError::new("account_error", m.clone()),
            SdkError::Playback(m) => RawError::new("playback_error", m.clone()),
        }
    }
}

impl Classify for PlayerError {
    fn to_raw(&self) -> RawError {
        match self {
            PlayerError::NotLoggedIn => RawError::new("not_logged_in", self.to_string()),
            PlayerError::SdkLoadTimeout(_) => RawError::new("sdk_timeout", self.to_string()),
            PlayerError::SdkUnavailable(_) => RawError::new("sdk_not_available", self.to_string()),
            PlayerError::ConnectFailed => RawError::new("connection_failed", self.to_string()),
            PlayerError::NotReady => RawError::new("player_not_ready", self.to_string()),
            PlayerError::NotInitialized => {
                RawError::new("player_not_initialized", self.to_string())
            }
            PlayerError::InvalidVolume(_) => RawError::new("invalid_volume", self.to_string()),
            PlayerError::MissingTrack => RawError::new("missing_track", "No track selected."),
            PlayerError::TrackNotFound(query) => RawError::new(
                "track_not_found",
                format!("No matching track found on Spotify for \"{query}\"."),
            ),
            PlayerError::Sdk { source, .. } => source.to_raw(),
            PlayerError::Api(e) => e.to_raw(),
            PlayerError::Auth(e) => e.to_raw(),
        }
    }
}
