use std::sync::Arc;

use axum::{Extension, body::Bytes, http::StatusCode, response::Response};

use crate::{server::ProxyState, types::RefreshExchangeRequest};

use super::forward::{forward_grant, parse_body, proxy_error};

/// `POST /api/spotify/refresh`: trades a refresh token for a new access
/// token.
pub async fn refresh(Extension(state): Extension<Arc<ProxyState>>, body: Bytes) -> Response {
    let request: RefreshExchangeRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let Some(refresh_token) = request.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
        return proxy_error(StatusCode::BAD_REQUEST, "Missing refresh token");
    };

    forward_grant(
        &state,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ],
        "Failed to refresh token",
    )
    .await
}
