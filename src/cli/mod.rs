//! # CLI Module
//!
//! User-facing commands of the `jazzplay` binary. Each command builds on the
//! library layers and reports failures as the classified message plus its
//! recovery hint; provider error codes never reach the terminal.
//!
//! ## Command Categories
//!
//! ### Authentication
//!
//! - [`login`] - Runs the PKCE login through the local callback server
//! - [`logout`] - Clears the session, keeps the market preference
//! - [`status`] - Session expiry, profile, account tier and market
//! - [`market`] - Shows or changes the market used for search and playback
//!
//! ### Catalog
//!
//! - [`search`] - Searches tracks, optionally narrowed to a composer
//!
//! ### Playback
//!
//! - [`play`] - Plays a track by id/URI/URL or by search, optionally
//!   following its progress
//! - [`pause`], [`seek`], [`volume`] - Remote control of the player
//!
//! ### Server
//!
//! - [`serve`] - Runs the token proxy and callback server in the foreground
//!
//! ## Architecture Design
//!
//! ```text
//! CLI Layer (User Interface)
//!     ↓
//! Player Layer (PlaybackAdapter + ConnectSdk)
//!     ↓
//! Spotify Layer (AuthController, WebApi)
//!     ↓
//! Session Layer (TokenStore on FileStorage)
//! ```

mod auth;
mod player;
mod search;
mod serve;

use std::sync::Arc;

pub use auth::login;
pub use auth::logout;
pub use auth::market;
pub use auth::status;
pub use player::pause;
pub use player::play;
pub use player::seek;
pub use player::volume;
pub use search::search;
pub use serve::serve;

use crate::{
    config, error,
    errors::{Classify, StorageError},
    session::{FileStorage, TokenStore},
    spotify::{AuthController, WebApi},
};

/// Wires the Web API client to the session file in the data directory.
pub fn web_api() -> Result<Arc<WebApi>, StorageError> {
    let storage = FileStorage::open_default()?;
    let store = TokenStore::new(Arc::new(storage));
    let auth = Arc::new(AuthController::new(config::auth_config(), store));
    Ok(Arc::new(WebApi::new(config::spotify_apiurl(), auth)))
}

/// Prints the classified form of an error and exits.
pub(crate) fn fail(err: &dyn Classify) -> ! {
    let classified = err.classify();
    error!("{}", classified)
}
