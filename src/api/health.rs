use std::sync::Arc;

use axum::{Extension, response::Json};
use serde_json::{Value, json};

use crate::server::ProxyState;

/// `GET /health`. `proxy` is `false` while the client id or secret is
/// missing, in which case both token routes answer 500.
pub async fn health(Extension(state): Extension<Arc<ProxyState>>) -> Json<Value> {
    let credentials = &state.credentials;
    let configured = credentials.client_id.is_some() && credentials.client_secret.is_some();

    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "proxy": configured,
    }))
}
