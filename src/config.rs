//! Configuration management for jazzplay.
//!
//! This module loads configuration values from environment variables and an
//! optional `.env` file in the user's local data directory. It provides one
//! accessor per setting plus helpers that assemble the typed configuration
//! used by the authentication controller, the token proxy and the player.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults
//!
//! Only the client id is genuinely required, and only for logging in. Its
//! absence is reported as a configuration error when the login URL is
//! built, never as a panic.

use std::{env, path::PathBuf, time::Duration};

use crate::{
    server::ProxyCredentials,
    spotify::{AuthConfig, DEFAULT_SCOPES},
};

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_PLAYER_NAME: &str = "Jazz Standards Player";
pub const DEFAULT_SDK_LOAD_TIMEOUT_SECS: u64 = 10;

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the jazzplay directory inside the platform's local data directory.
///
/// - Linux: `~/.local/share/jazzplay`
/// - macOS: `~/Library/Application Support/jazzplay`
/// - Windows: `%LOCALAPPDATA%/jazzplay`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("jazzplay");
    path
}

/// Loads environment variables from `.env` in the local data directory.
///
/// Creates the data directory if it doesn't exist. A missing `.env` file is
/// not an error: every setting can also come from the process environment,
/// which always wins over the file.
///
/// # Errors
///
/// Returns an error string if the directory cannot be created or the file
/// exists but cannot be parsed.
///
/// # Example
///
/// ```
/// use jazzplay::config;
///
/// #[tokio::main]
/// async fn main() {
///     if let Err(e) = config::load_env().await {
///         eprintln!("Configuration error: {}", e);
///     }
/// }
/// ```
pub async fn load_env() -> Result<(), String> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| e.to_string())?;

    let path = dir.join(".env");
    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

/// Address the local callback and token proxy server binds to
/// (`SERVER_ADDRESS`, default `127.0.0.1:8888`).
pub fn server_addr() -> String {
    var("SERVER_ADDRESS").unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string())
}

/// Spotify application client id (`SPOTIFY_API_AUTH_CLIENT_ID`).
pub fn spotify_client_id() -> Option<String> {
    var("SPOTIFY_API_AUTH_CLIENT_ID")
}

/// Spotify application client secret (`SPOTIFY_API_AUTH_CLIENT_SECRET`).
///
/// Only the token proxy reads it. It is never sent to the player or logged.
pub fn spotify_client_secret() -> Option<String> {
    var("SPOTIFY_API_AUTH_CLIENT_SECRET")
}

/// OAuth redirect URI (`SPOTIFY_API_REDIRECT_URI`).
///
/// Defaults to the `/callback` route of the local server. It must match a
/// redirect URI registered for the Spotify application.
pub fn spotify_redirect_uri() -> String {
    var("SPOTIFY_API_REDIRECT_URI").unwrap_or_else(|| format!("http://{}/callback", server_addr()))
}

/// Requested scopes (`SPOTIFY_API_AUTH_SCOPE`, space separated).
pub fn spotify_scope() -> Vec<String> {
    match var("SPOTIFY_API_AUTH_SCOPE") {
        Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
        None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Authorization endpoint (`SPOTIFY_API_AUTH_URL`).
pub fn spotify_apiauth_url() -> String {
    var("SPOTIFY_API_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string())
}

/// Token endpoint used by the proxy (`SPOTIFY_API_TOKEN_URL`).
pub fn spotify_apitoken_url() -> String {
    var("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string())
}

/// Web API base URL (`SPOTIFY_API_URL`).
pub fn spotify_apiurl() -> String {
    var("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Base URL of the token-exchange proxy (`SPOTIFY_TOKEN_PROXY_URL`).
///
/// Defaults to the local server, which serves the proxy routes itself.
pub fn token_proxy_url() -> String {
    var("SPOTIFY_TOKEN_PROXY_URL").unwrap_or_else(|| format!("http://{}", server_addr()))
}

/// Player name announced to the SDK, or the Connect device to attach to
/// (`SPOTIFY_PLAYER_NAME`).
pub fn player_name() -> String {
    var("SPOTIFY_PLAYER_NAME").unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_string())
}

/// Upper bound for loading the player SDK (`SPOTIFY_SDK_LOAD_TIMEOUT_SECS`).
pub fn sdk_load_timeout() -> Duration {
    let secs = var("SPOTIFY_SDK_LOAD_TIMEOUT_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SDK_LOAD_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Assembles the authentication controller configuration.
pub fn auth_config() -> AuthConfig {
    AuthConfig {
        client_id: spotify_client_id(),
        redirect_uri: spotify_redirect_uri(),
        auth_url: spotify_apiauth_url(),
        proxy_url: token_proxy_url(),
        scopes: spotify_scope(),
        show_dialog: true,
    }
}

/// Assembles the credentials the token proxy forwards to the accounts
/// service.
pub fn proxy_credentials() -> ProxyCredentials {
    ProxyCredentials {
        client_id: spotify_client_id(),
        client_secret: spotify_client_secret(),
        token_url: spotify_apitoken_url(),
    }
}
