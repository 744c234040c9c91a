use std::sync::Arc;

use axum::{Extension, body::Bytes, http::StatusCode, response::Response};

use crate::{server::ProxyState, types::CodeExchangeRequest};

use super::forward::{forward_grant, parse_body, proxy_error};

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// `POST /api/spotify/token`: exchanges an authorization code and its PKCE
/// verifier for tokens.
pub async fn token(Extension(state): Extension<Arc<ProxyState>>, body: Bytes) -> Response {
    let request: CodeExchangeRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (Some(code), Some(redirect_uri), Some(code_verifier)) = (
        present(&request.code),
        present(&request.redirect_uri),
        present(&request.code_verifier),
    ) else {
        return proxy_error(StatusCode::BAD_REQUEST, "Missing required parameters");
    };

    let client_id = state.credentials.client_id.clone().unwrap_or_default();
    forward_grant(
        &state,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
            ("client_id", client_id.as_str()),
        ],
        "Failed to get access token",
    )
    .await
}
