use std::sync::Arc;

use axum::{Extension, extract::Query, response::Html};

use crate::{
    errors::Classify,
    spotify::{CallbackQuery, WebApi},
};

/// `GET /callback`: completes the authorization started by `login`.
///
/// On success the preferred market is refreshed from the user's profile.
/// That step is best effort and never fails the login.
pub async fn callback(
    Query(query): Query<CallbackQuery>,
    Extension(api): Extension<Arc<WebApi>>,
) -> Html<String> {
    match api.auth().handle_callback(&query).await {
        Ok(_) => {
            if let Err(e) = api.update_user_market().await {
                tracing::warn!(error = %e, "could not update market from profile");
            }
            Html(page(
                "Connected to Spotify",
                "You can close this window and return to the terminal.",
            ))
        }
        Err(e) => {
            tracing::warn!(error = %e, "authorization callback failed");
            let classified = e.classify();
            Html(page("Login failed", &classified.to_string()))
        }
    }
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><h2>{title}</h2><p>{}</p></body></html>",
        escape(message)
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
