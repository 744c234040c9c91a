//! Jazz standards player library
//!
//! Client-side state for a Spotify-backed player: the PKCE authorization
//! flow, token persistence and refresh, a playback adapter over the vendor
//! SDK with progress polling, and an error classifier that turns every
//! failure into a user-facing message with one recovery action.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints of the local server (token proxy, OAuth callback)
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `errors` - Error types and the error classifier
//! - `pkce` - PKCE verifier, challenge and state nonce generation
//! - `player` - Playback SDK seam, adapter and progress poller
//! - `server` - Local HTTP server wiring
//! - `session` - Token store and its storage backends
//! - `spotify` - Authorization controller and Web API client
//! - `types` - Wire data structures
//! - `utils` - Formatting and parsing helpers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jazzplay::{config, session::{FileStorage, TokenStore}, spotify::AuthController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     config::load_env().await?;
//!     let store = TokenStore::new(Arc::new(FileStorage::open_default()?));
//!     let auth = AuthController::new(config::auth_config(), store);
//!     println!("{}", auth.build_login_url()?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod pkce;
pub mod player;
pub mod server;
pub mod session;
pub mod spotify;
pub mod types;
pub mod utils;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```ignore
/// info!("Waiting for Spotify authorization...");
/// info!("Found {} tracks", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for the command line: library code returns errors instead.
///
/// # Example
///
/// ```ignore
/// error!("Cannot load environment. Err: {}", e);
/// // Program exits here
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for recoverable issues the user should notice.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
