use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};

use crate::{
    errors::{ApiError, AuthError},
    types::{PlayRequest, SearchResponse, Track, UserProfile},
};

use super::{AuthController, http};

/// Thin client for the Spotify Web API endpoints the player needs.
///
/// Every request asks the [`AuthController`] for a currently valid token, so
/// an expired token is refreshed before the request goes out. A 401 from any
/// endpoint logs the user out.
pub struct WebApi {
    http: Client,
    base_url: String,
    auth: Arc<AuthController>,
}

impl WebApi {
    pub fn new(base_url: impl Into<String>, auth: Arc<AuthController>) -> Self {
        Self::with_client(Client::new(), base_url, auth)
    }

    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        auth: Arc<AuthController>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            auth,
        }
    }

    pub fn auth(&self) -> &Arc<AuthController> {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn bearer(&self) -> Result<String, ApiError> {
        self.auth
            .get_valid_token()
            .await?
            .ok_or(ApiError::NotLoggedIn)
    }

    async fn check(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("Spotify rejected the access token, logging out");
            if let Err(e) = self.auth.logout() {
                tracing::warn!(error = %e, "failed to clear session");
            }
            return Err(ApiError::Unauthorized);
        }

        let info = http::error_info(response).await;
        if info.status == 403 && info.reason.as_deref() == Some("PREMIUM_REQUIRED") {
            return Err(ApiError::PremiumRequired);
        }
        Err(ApiError::Status {
            status: info.status,
            message: info.message,
        })
    }

    /// Fetches the profile of the logged-in user (`GET /me`).
    ///
    /// The profile carries the account tier (`product`) and the country used
    /// as the default market.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let token = self.bearer().await?;
        let request = self
            .http
            .get(format!("{}/me", self.base_url))
            .bearer_auth(token);
        let response = self.check(http::send(request).await?).await?;
        Ok(response.json::<UserProfile>().await?)
    }

    pub async fn is_premium(&self) -> Result<bool, ApiError> {
        Ok(self.current_user().await?.is_premium())
    }

    /// Stores the profile country as the preferred market.
    ///
    /// Returns the stored market, or `None` when the profile has no country.
    pub async fn update_user_market(&self) -> Result<Option<String>, ApiError> {
        let profile = self.current_user().await?;
        match profile.country {
            Some(country) if !country.is_empty() => {
                self.set_market(&country)?;
                tracing::debug!(market = %country, "user market updated from profile");
                Ok(Some(country.to_uppercase()))
            }
            _ => Ok(None),
        }
    }

    pub fn market(&self) -> Result<String, ApiError> {
        self.auth
            .store()
            .market()
            .map_err(|e| ApiError::Auth(AuthError::Storage(e)))
    }

    pub fn set_market(&self, market: &str) -> Result<(), ApiError> {
        self.auth
            .store()
            .set_market(market)
            .map_err(|e| ApiError::Auth(AuthError::Storage(e)))
    }

    /// Searches tracks in the user's market (`GET /search`).
    pub async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Track>, ApiError> {
        let token = self.bearer().await?;
        let market = self.market()?;
        let limit = limit.clamp(1, 50).to_string();

        let request = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", limit.as_str()),
                ("market", market.as_str()),
            ])
            .bearer_auth(token);
        let response = self.check(http::send(request).await?).await?;
        let result = response.json::<SearchResponse>().await?;

        Ok(result.tracks.map(|t| t.items).unwrap_or_default())
    }

    /// Returns the best match for a search string, if any.
    pub async fn search_track(&self, query: &str) -> Result<Option<Track>, ApiError> {
        Ok(self.search_tracks(query, 1).await?.into_iter().next())
    }

    /// Starts playback of one track on a device
    /// (`PUT /me/player/play?device_id=`).
    ///
    /// # Errors
    ///
    /// - [`ApiError::Unauthorized`] on 401, after logging out.
    /// - [`ApiError::DeviceNotFound`] on 404.
    /// - [`ApiError::PremiumRequired`] when the account cannot stream.
    /// - [`ApiError::Status`] with the provider message otherwise.
    pub async fn start_playback(&self, device_id: &str, track_id: &str) -> Result<(), ApiError> {
        let token = self.bearer().await?;
        let market = self.market().ok();

        let body = PlayRequest {
            uris: vec![format!("spotify:track:{track_id}")],
            market,
        };
        let request = self
            .http
            .put(format!("{}/me/player/play", self.base_url))
            .query(&[("device_id", device_id)])
            .bearer_auth(token)
            .json(&body);

        let response = http::send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::DeviceNotFound);
        }
        self.check(response).await?;
        Ok(())
    }
}
