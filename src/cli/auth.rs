use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::{Instant, sleep};

use crate::{
    config, error, info, server,
    spotify::{AuthController, AuthState, WebApi},
    success, utils, warning,
};

use super::fail;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);
const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

enum LoginOutcome {
    LoggedIn,
    Failed,
    TimedOut,
}

/// Runs the authorization flow end to end.
///
/// The callback server is started before the browser opens so the redirect
/// always has somewhere to land. The same server also acts as token proxy
/// unless `SPOTIFY_TOKEN_PROXY_URL` points elsewhere.
pub async fn login(api: Arc<WebApi>) {
    let auth = api.auth().clone();
    if auth.is_logged_in() {
        info!("Already logged in. Run `jazzplay logout` first to switch accounts.");
        return;
    }

    let url = match auth.build_login_url() {
        Ok(url) => url,
        Err(e) => fail(&e),
    };

    let listener = match server::bind().await {
        Ok(listener) => listener,
        Err(e) => error!(
            "Cannot start callback server on {}. Err: {}",
            config::server_addr(),
            e
        ),
    };
    let app = server::router(config::proxy_credentials(), api.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, app).await {
            tracing::error!(error = %e, "callback server stopped");
        }
    });

    if webbrowser::open(&url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            url
        )
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Waiting for Spotify authorization...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = wait_for_login(&auth).await;
    spinner.finish_and_clear();
    server.abort();

    match outcome {
        LoginOutcome::LoggedIn => {
            success!("Authentication successful!");
            if let Ok(market) = api.market() {
                info!("Market: {}", market);
            }
        }
        LoginOutcome::Failed => {
            error!("Spotify login failed. See the browser window for details.")
        }
        LoginOutcome::TimedOut => {
            if let Err(e) = auth.store().clear_pending() {
                tracing::warn!(error = %e, "could not discard pending login");
            }
            error!("Authentication timed out.")
        }
    }
}

/// Waits until the callback either stores a session or abandons the login.
/// A callback with a foreign `state` leaves the login pending.
async fn wait_for_login(auth: &AuthController) -> LoginOutcome {
    let deadline = Instant::now() + LOGIN_TIMEOUT;

    while Instant::now() < deadline {
        if auth.is_logged_in() {
            return LoginOutcome::LoggedIn;
        }
        if auth.state() == AuthState::LoggedOut {
            return LoginOutcome::Failed;
        }
        sleep(LOGIN_POLL_INTERVAL).await;
    }

    LoginOutcome::TimedOut
}

pub async fn logout(api: Arc<WebApi>) {
    if let Err(e) = api.auth().logout() {
        fail(&e)
    }
    success!("Logged out.");
}

pub async fn status(api: Arc<WebApi>) {
    let session = match api.auth().store().stored() {
        Ok(Some(session)) => session,
        Ok(None) => {
            warning!("Not logged in. Run `jazzplay login`.");
            return;
        }
        Err(e) => fail(&e),
    };

    if session.is_expired() {
        info!("Access token expired at {}", session.expires_at.to_rfc3339());
    } else {
        info!("Access token valid until {}", session.expires_at.to_rfc3339());
    }

    let profile = match api.current_user().await {
        Ok(profile) => profile,
        Err(e) => fail(&e),
    };
    info!(
        "User: {}",
        profile.display_name.as_deref().unwrap_or(&profile.id)
    );
    if profile.is_premium() {
        success!("Account: Premium");
    } else {
        warning!(
            "Account: {} (Premium is required for playback)",
            profile.product.as_deref().unwrap_or("free")
        );
    }

    match api.market() {
        Ok(market) => info!("Market: {}", market),
        Err(e) => fail(&e),
    }
}

/// Shows the market, sets it to `code`, or re-reads it from the profile.
pub async fn market(api: Arc<WebApi>, code: Option<String>, from_profile: bool) {
    if from_profile {
        match api.update_user_market().await {
            Ok(Some(market)) => success!("Market set to {} from your profile.", market),
            Ok(None) => warning!("Your profile has no country; market unchanged."),
            Err(e) => fail(&e),
        }
        return;
    }

    let Some(code) = code else {
        match api.market() {
            Ok(market) => info!("Market: {}", market),
            Err(e) => fail(&e),
        }
        return;
    };

    if !utils::is_market_code(&code) {
        error!("Invalid market \"{}\". Use a two-letter country code like US or DE.", code)
    }
    if let Err(e) = api.set_market(&code) {
        fail(&e)
    }
    success!("Market set to {}.", code.to_uppercase());
}
