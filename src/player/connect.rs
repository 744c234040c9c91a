use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::{
    errors::SdkError,
    spotify::http,
    types::{CurrentPlayback, Device, DevicesResponse},
};

use super::{
    sdk::{
        EventKind, Listener, PlaybackSdk, PlayerOptions, ReadySignal, SdkEvent, SdkPlaybackState,
        SdkPlayer, TokenProvider,
    },
    state::TrackRef,
};

const NO_DEVICE: &str =
    "No Spotify Connect device available. Open Spotify on one of your devices first.";

/// Playback SDK backed by the Web API player endpoints.
///
/// Instead of becoming a playback device itself, each player attaches to an
/// existing Spotify Connect device and drives it remotely.
#[derive(Debug, Clone)]
pub struct ConnectSdk {
    http: Client,
    api_url: String,
    ready: Arc<ReadySignal>,
}

impl ConnectSdk {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_url)
    }

    pub fn with_client(http: Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            api_url,
            ready: Arc::new(ReadySignal::new()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Any HTTP answer from the Web API counts as ready; only transport
    /// failures do not.
    async fn probe(&self) -> Result<(), SdkError> {
        self.http
            .get(&self.api_url)
            .send()
            .await
            .map_err(|e| SdkError::Unavailable(format!("Spotify Web API unreachable: {e}")))?;
        if self.ready.fire() {
            tracing::debug!(api_url = %self.api_url, "Web API reachable");
        }
        Ok(())
    }
}

#[async_trait]
impl PlaybackSdk for ConnectSdk {
    async fn load(&self) -> Result<(), SdkError> {
        if self.ready.is_ready() {
            return Ok(());
        }
        tokio::select! {
            result = self.probe() => result,
            _ = self.ready.wait() => Ok(()),
        }
    }

    fn create_player(&self, options: PlayerOptions) -> Result<Arc<dyn SdkPlayer>, SdkError> {
        Ok(Arc::new(ConnectPlayer::new(
            self.http.clone(),
            self.api_url.clone(),
            options,
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Observed {
    paused: bool,
    track_id: Option<String>,
}

/// A player attached to one Spotify Connect device.
///
/// Connect devices keep their own volume, so the initial volume from
/// [`PlayerOptions`] is not pushed to the device.
pub struct ConnectPlayer {
    http: Client,
    api_url: String,
    name: String,
    tokens: Arc<dyn TokenProvider>,
    listeners: Mutex<HashMap<EventKind, Listener>>,
    device_id: Mutex<Option<String>>,
    observed: Mutex<Option<Observed>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConnectPlayer {
    fn new(http: Client, api_url: String, options: PlayerOptions) -> Self {
        Self {
            http,
            api_url,
            name: options.name,
            tokens: options.token_provider,
            listeners: Mutex::new(HashMap::new()),
            device_id: Mutex::new(None),
            observed: Mutex::new(None),
        }
    }

    pub fn device_id(&self) -> Option<String> {
        lock(&self.device_id).clone()
    }

    fn emit(&self, event: SdkEvent) {
        let listener = lock(&self.listeners).get(&event.kind()).cloned();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    async fn token(&self) -> Result<String, SdkError> {
        match self.tokens.access_token().await {
            Some(token) => Ok(token),
            None => {
                let message = "Authentication expired".to_string();
                self.emit(SdkEvent::AuthenticationError {
                    message: message.clone(),
                });
                Err(SdkError::Authentication(message))
            }
        }
    }

    fn attached_device(&self) -> Result<String, SdkError> {
        self.device_id()
            .ok_or_else(|| SdkError::Unavailable("player is not connected".into()))
    }

    /// Sends a request and turns a failed response into the matching event.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, SdkError> {
        let response = match http::send(request).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                self.emit(SdkEvent::PlaybackError {
                    message: message.clone(),
                });
                return Err(SdkError::Playback(message));
            }
        };
        if response.status().is_success() {
            return Ok(response);
        }

        let info = http::error_info(response).await;
        if info.status == StatusCode::UNAUTHORIZED.as_u16() {
            self.emit(SdkEvent::AuthenticationError {
                message: info.message.clone(),
            });
            return Err(SdkError::Authentication(info.message));
        }
        if info.reason.as_deref() == Some("PREMIUM_REQUIRED") {
            self.emit(SdkEvent::AccountError {
                message: info.message.clone(),
            });
            return Err(SdkError::Account(info.message));
        }
        self.emit(SdkEvent::PlaybackError {
            message: info.message.clone(),
        });
        Err(SdkError::Playback(info.message))
    }

    async fn command(&self, path: &str, query: &[(&str, String)]) -> Result<(), SdkError> {
        let token = self.token().await?;
        let device_id = self.attached_device()?;

        let mut params: Vec<(&str, String)> = query.to_vec();
        params.push(("device_id", device_id));
        let request = self
            .http
            .put(format!("{}{}", self.api_url, path))
            .query(&params)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.execute(request).await?;

        // Commands produce no state event on their own.
        if let Err(e) = self.get_current_state().await {
            tracing::debug!(error = %e, "state query after command failed");
        }
        Ok(())
    }

    /// Emits `player_state_changed` when the paused flag or the track differ
    /// from the last observation.
    fn observe(&self, state: Option<&SdkPlaybackState>) {
        let current = state.map(|s| Observed {
            paused: s.paused,
            track_id: s.track.as_ref().and_then(|t| t.id.clone()),
        });

        let changed = {
            let mut last = lock(&self.observed);
            if *last == current {
                false
            } else {
                *last = current;
                true
            }
        };
        if changed {
            self.emit(SdkEvent::PlayerStateChanged(state.cloned()));
        }
    }
}

/// Picks the device named like the player, else the active device, else
/// the first one. Devices without an id cannot be controlled.
pub(crate) fn pick_device(devices: &[Device], name: &str) -> Option<String> {
    let controllable = || devices.iter().filter(|d| d.id.is_some());

    controllable()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .or_else(|| controllable().find(|d| d.is_active))
        .or_else(|| controllable().next())
        .and_then(|d| d.id.clone())
}

fn playback_state(playback: CurrentPlayback) -> SdkPlaybackState {
    let duration_ms = playback.item.as_ref().map(|t| t.duration_ms).unwrap_or(0);
    let track = playback.item.map(|t| TrackRef {
        artists: t.artists.iter().map(|a| a.name.clone()).collect(),
        id: Some(t.id),
        uri: t.uri,
        name: t.name,
    });

    SdkPlaybackState {
        paused: !playback.is_playing,
        position_ms: playback.progress_ms.unwrap_or(0),
        duration_ms,
        track,
    }
}

#[async_trait]
impl SdkPlayer for ConnectPlayer {
    fn add_listener(&self, kind: EventKind, listener: Listener) {
        lock(&self.listeners).insert(kind, listener);
    }

    fn remove_listener(&self, kind: EventKind) {
        lock(&self.listeners).remove(&kind);
    }

    async fn connect(&self) -> bool {
        let Ok(token) = self.token().await else {
            return false;
        };

        let request = self
            .http
            .get(format!("{}/me/player/devices", self.api_url))
            .bearer_auth(token);
        let Ok(response) = self.execute(request).await else {
            return false;
        };
        let devices = match response.json::<DevicesResponse>().await {
            Ok(body) => body.devices,
            Err(e) => {
                self.emit(SdkEvent::InitializationError {
                    message: e.to_string(),
                });
                return false;
            }
        };

        match pick_device(&devices, &self.name) {
            Some(device_id) => {
                *lock(&self.device_id) = Some(device_id.clone());
                self.emit(SdkEvent::Ready { device_id });
                true
            }
            None => {
                self.emit(SdkEvent::InitializationError {
                    message: NO_DEVICE.to_string(),
                });
                false
            }
        }
    }

    async fn pause(&self) -> Result<(), SdkError> {
        self.command("/me/player/pause", &[]).await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), SdkError> {
        self.command("/me/player/seek", &[("position_ms", position_ms.to_string())])
            .await
    }

    async fn set_volume(&self, volume: f32) -> Result<(), SdkError> {
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round() as u8;
        self.command("/me/player/volume", &[("volume_percent", percent.to_string())])
            .await
    }

    async fn get_current_state(&self) -> Result<Option<SdkPlaybackState>, SdkError> {
        let token = self.token().await?;
        let request = self
            .http
            .get(format!("{}/me/player", self.api_url))
            .bearer_auth(token);
        let response = self.execute(request).await?;

        if response.status() == StatusCode::NO_CONTENT {
            self.observe(None);
            return Ok(None);
        }

        let playback = response
            .json::<CurrentPlayback>()
            .await
            .map_err(|e| SdkError::Playback(e.to_string()))?;
        let state = playback_state(playback);
        self.observe(Some(&state));
        Ok(Some(state))
    }

    fn disconnect(&self) {
        lock(&self.listeners).clear();
        *lock(&self.device_id) = None;
        *lock(&self.observed) = None;
    }
}
