use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Extension, Router,
    routing::{get, post},
};
use reqwest::Client;
use tokio::net::TcpListener;

use crate::{
    api, config,
    errors::ServerError,
    spotify::{
        WebApi,
        proxy::{REFRESH_PATH, TOKEN_PATH},
    },
};

/// Credentials the token proxy adds to requests it forwards to the accounts
/// service. Missing values are reported per request.
#[derive(Debug, Clone)]
pub struct ProxyCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
}

pub struct ProxyState {
    pub credentials: ProxyCredentials,
    pub http: Client,
}

/// Routes for the token proxy, the OAuth callback and the health check.
pub fn router(credentials: ProxyCredentials, web_api: Arc<WebApi>) -> Router {
    let proxy = Arc::new(ProxyState {
        credentials,
        http: Client::new(),
    });

    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback))
        .route(TOKEN_PATH, post(api::token))
        .route(REFRESH_PATH, post(api::refresh))
        .layer(Extension(proxy))
        .layer(Extension(web_api))
}

pub async fn bind() -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from_str(&config::server_addr())?;
    Ok(TcpListener::bind(addr).await?)
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "server listening");
    }
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn start_api_server(
    credentials: ProxyCredentials,
    web_api: Arc<WebApi>,
) -> Result<(), ServerError> {
    let listener = bind().await?;
    serve(listener, router(credentials, web_api)).await
}
