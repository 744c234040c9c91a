use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{
    server::ProxyState,
    types::{OAuthErrorBody, ProxyErrorBody},
};

pub(crate) const INTERNAL_ERROR: &str = "Internal server error";

pub(crate) fn proxy_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ProxyErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Posts a token grant to the accounts service with the client's Basic
/// credentials and relays the answer.
///
/// A successful body is passed through untouched. A failure keeps the
/// upstream status and carries `error_description`, or `default_message`.
pub(crate) async fn forward_grant(
    state: &ProxyState,
    form: &[(&str, &str)],
    default_message: &str,
) -> Response {
    let credentials = &state.credentials;
    let (Some(client_id), Some(client_secret)) = (
        credentials.client_id.as_deref(),
        credentials.client_secret.as_deref(),
    ) else {
        tracing::error!("token proxy called without client credentials");
        return proxy_error(StatusCode::INTERNAL_SERVER_ERROR, "Missing Spotify credentials");
    };

    let response = match state
        .http
        .post(&credentials.token_url)
        .basic_auth(client_id, Some(client_secret))
        .form(form)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "token endpoint unreachable");
            return proxy_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        let description = serde_json::from_str::<OAuthErrorBody>(&body)
            .ok()
            .and_then(|b| b.error_description)
            .filter(|d| !d.is_empty());
        tracing::warn!(status = status.as_u16(), "token endpoint rejected grant");
        return proxy_error(status, description.as_deref().unwrap_or(default_message));
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(json) => (StatusCode::OK, Json(json)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "token endpoint returned invalid JSON");
            proxy_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

/// Reads a JSON request body, treating an unreadable body as a server
/// error like the accounts proxy always has.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "invalid token proxy request body");
        proxy_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
    })
}
