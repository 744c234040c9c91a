//! # Spotify Integration Module
//!
//! This module is the integration layer between jazzplay and Spotify's
//! accounts service and Web API. It owns the authorization lifecycle and the
//! REST calls the player needs; the Web Playback side lives in
//! [`crate::player`].
//!
//! ## Architecture
//!
//! ```text
//! AuthController (login URL, callback, refresh, logout)
//!     ├── TokenStore (session, pending authorization, market)
//!     └── ProxyClient (code / refresh exchange via the backend proxy)
//!          ↓
//! WebApi (profile, search, start playback)
//!          ↓
//! http::send (429 / 502 retry)
//!          ↓
//! Spotify Web API
//! ```
//!
//! ## Authentication Strategy
//!
//! Authorization Code with PKCE:
//! 1. **Login URL**: a `state` nonce and a code verifier are generated from
//!    OS randomness and persisted as the pending authorization; the S256
//!    challenge goes into the URL.
//! 2. **Callback**: the provider's `error`, the `state` match and the
//!    presence of `code` are checked in that order.
//! 3. **Exchange**: code and verifier are posted to the token proxy, which
//!    adds the client secret. The client never talks to the token endpoint.
//! 4. **Storage**: the session is saved and the one-time secrets erased in
//!    a single write batch.
//!
//! ## Token Lifecycle
//!
//! - [`AuthController::get_valid_token`] refreshes an expired token before
//!   returning it; concurrent callers share one refresh request.
//! - A failed refresh, a missing refresh token or a 401 from any endpoint
//!   logs the user out.
//!
//! ## Error Types
//!
//! - [`crate::errors::AuthError`] for the authorization flow.
//! - [`crate::errors::ApiError`] for Web API calls.
//!
//! Both lower into the classifier in [`crate::errors`].

pub mod api;
pub mod auth;
pub(crate) mod http;
pub mod proxy;

pub use api::WebApi;
pub use auth::AuthConfig;
pub use auth::AuthController;
pub use auth::AuthState;
pub use auth::CallbackQuery;
pub use auth::DEFAULT_SCOPES;
pub use proxy::ProxyClient;
