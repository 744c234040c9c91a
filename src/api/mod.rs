//! # API Module
//!
//! HTTP endpoints of the local jazzplay server.
//!
//! ## Endpoints
//!
//! ### Token proxy
//!
//! - [`token`] - `POST /api/spotify/token`, authorization code + PKCE
//!   verifier exchange.
//! - [`refresh`] - `POST /api/spotify/refresh`, refresh token exchange.
//!
//! Both add the client secret and HTTP Basic credentials before forwarding
//! to the accounts service, so the secret never reaches the client side.
//! Errors are always `{"error": "<message>"}`.
//!
//! ### Authentication
//!
//! - [`callback`] - `GET /callback`, the OAuth redirect target. Runs the
//!   callback checks and the code exchange, then renders a short page.
//!
//! ### Monitoring
//!
//! - [`health`] - `GET /health`, version and whether the proxy has
//!   credentials.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use jazzplay::{config, server};
//!
//! let app = server::router(config::proxy_credentials(), web_api);
//! server::serve(server::bind().await?, app).await?;
//! ```

mod callback;
mod forward;
mod health;
mod refresh;
mod token;

pub use callback::callback;
pub use health::health;
pub use refresh::refresh;
pub use token::token;
