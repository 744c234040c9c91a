use reqwest::Client;
use serde::Serialize;

use crate::{
    errors::AuthError,
    types::{CodeExchangeRequest, ProxyErrorBody, RefreshExchangeRequest, TokenResponse},
};

pub const TOKEN_PATH: &str = "/api/spotify/token";
pub const REFRESH_PATH: &str = "/api/spotify/refresh";

/// Client for the backend token-exchange proxy.
///
/// The proxy owns the client secret; this side only ever sends the
/// authorization code, the PKCE verifier or the refresh token.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchanges an authorization code and its PKCE verifier for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let body = CodeExchangeRequest {
            code: Some(code.to_string()),
            redirect_uri: Some(redirect_uri.to_string()),
            code_verifier: Some(code_verifier.to_string()),
        };
        self.post(TOKEN_PATH, &body, "Failed to exchange code for token")
            .await
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn exchange_refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let body = RefreshExchangeRequest {
            refresh_token: Some(refresh_token.to_string()),
        };
        self.post(REFRESH_PATH, &body, "Failed to refresh token")
            .await
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        default_message: &str,
    ) -> Result<TokenResponse, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Exchange {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProxyErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| default_message.to_string());
            return Err(AuthError::Exchange {
                status: Some(status.as_u16()),
                message,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Exchange {
                status: Some(status.as_u16()),
                message: format!("invalid token response: {e}"),
            })
    }
}
