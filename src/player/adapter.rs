use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
};

use crate::{
    config,
    errors::{ClassifiedError, Classify, PlayerError, RawError, SdkError},
    spotify::{AuthController, WebApi},
    types::Track,
};

use super::{
    poller::{POLL_INTERVAL, ProgressPoller},
    sdk::{
        EventKind, Listener, PlayerOptions, SdkEvent, SdkLoader, SdkPlaybackState, SdkPlayer,
        TokenProvider,
    },
    state::{PlaybackDevice, PlaybackState},
};

/// Playback errors mentioning this host come from the SDK's telemetry
/// endpoint and do not affect playback.
const BENIGN_PLAYBACK_ERROR: &str = "cpapi.spotify.com";

const PLAY_SYNC_ATTEMPTS: u32 = 3;
const PLAY_SYNC_DELAY: Duration = Duration::from_millis(500);
const ERROR_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    SdkLoading,
    SdkReady,
    PlayerConnecting,
    PlayerReady,
    PlayerNotReady,
    /// The SDK rejected the session; a new login is needed.
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub name: String,
    /// Initial volume, 0.0 to 1.0.
    pub volume: f32,
    pub poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            name: config::DEFAULT_PLAYER_NAME.to_string(),
            volume: 0.7,
            poll_interval: POLL_INTERVAL,
        }
    }
}

struct Inner {
    auth: Arc<AuthController>,
    state: watch::Sender<AdapterState>,
    device: Mutex<Option<PlaybackDevice>>,
    player: Mutex<Option<Arc<dyn SdkPlayer>>>,
    playback: Arc<watch::Sender<PlaybackState>>,
    errors: broadcast::Sender<ClassifiedError>,
    poller: ProgressPoller,
    runtime: Mutex<Option<Handle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn set_state(&self, next: AdapterState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "player state changed");
        }
    }

    fn current_player(&self) -> Option<Arc<dyn SdkPlayer>> {
        lock(&self.player).clone()
    }

    fn publish(&self, error: ClassifiedError) {
        tracing::warn!(kind = ?error.kind, action = ?error.action, "{}", error.message);
        // No subscribers is fine.
        let _ = self.errors.send(error);
    }

    fn handle_event(&self, event: SdkEvent) {
        match event {
            SdkEvent::Ready { device_id } => {
                tracing::info!(device_id = %device_id, "player ready");
                *lock(&self.device) = Some(PlaybackDevice {
                    device_id,
                    is_ready: true,
                });
                self.set_state(AdapterState::PlayerReady);
            }
            SdkEvent::NotReady { device_id } => {
                tracing::warn!(device_id = %device_id, "player went offline");
                *lock(&self.device) = None;
                self.poller.stop();
                self.set_state(AdapterState::PlayerNotReady);
            }
            SdkEvent::PlayerStateChanged(state) => self.apply_state(state),
            SdkEvent::InitializationError { message } => {
                self.publish(RawError::new("initialization_error", message).classify());
            }
            SdkEvent::AuthenticationError { message } => {
                tracing::warn!("player authentication failed: {message}");
                if let Err(e) = self.auth.logout() {
                    tracing::warn!(error = %e, "failed to clear session");
                }
                self.poller.stop();
                *lock(&self.device) = None;
                self.set_state(AdapterState::Disconnected);
                self.publish(RawError::new("authentication_error", message).classify());
            }
            SdkEvent::AccountError { message } => {
                self.publish(RawError::new("account_error", message).classify());
            }
            SdkEvent::PlaybackError { message } => {
                if message.contains(BENIGN_PLAYBACK_ERROR) {
                    tracing::debug!("ignoring telemetry playback error: {message}");
                    return;
                }
                self.publish(RawError::new("playback_error", message).classify());
            }
        }
    }

    /// Mirrors an SDK state report and starts or stops progress polling to
    /// match it. An empty report means nothing changed.
    fn apply_state(&self, state: Option<SdkPlaybackState>) {
        let Some(state) = state else {
            return;
        };

        let next = PlaybackState::from_sdk(&state);
        let playing = next.is_playing;
        self.playback.send_replace(next);

        if !playing {
            self.poller.stop();
            return;
        }

        let runtime = lock(&self.runtime).clone();
        if let (Some(runtime), Some(player)) = (runtime, self.current_player()) {
            self.poller.start(&runtime, player, self.playback.clone());
        }
    }
}

/// Hands the player a fresh token for every request. A player without a
/// token reports `authentication_error` itself.
struct SessionTokens {
    auth: Arc<AuthController>,
}

#[async_trait]
impl TokenProvider for SessionTokens {
    async fn access_token(&self) -> Option<String> {
        match self.auth.get_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "no access token for the player");
                None
            }
        }
    }
}

/// Drives one SDK player through its lifecycle and mirrors its state.
///
/// ```text
/// Uninitialized → SdkLoading → SdkReady → PlayerConnecting → PlayerReady
///                                                              ↕
///                                                       PlayerNotReady
/// any → Disconnected (authentication_error)
/// any → Uninitialized (disconnect)
/// ```
///
/// Listeners hold only a weak reference to the adapter, and dropping the
/// adapter disconnects the player.
pub struct PlaybackAdapter {
    inner: Arc<Inner>,
    api: Arc<WebApi>,
    loader: Arc<SdkLoader>,
    config: PlayerConfig,
    init_lock: tokio::sync::Mutex<()>,
}

impl PlaybackAdapter {
    pub fn new(api: Arc<WebApi>, loader: Arc<SdkLoader>, config: PlayerConfig) -> Self {
        let (state, _) = watch::channel(AdapterState::Uninitialized);
        let (playback, _) = watch::channel(PlaybackState::default());
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            auth: api.auth().clone(),
            state,
            device: Mutex::new(None),
            player: Mutex::new(None),
            playback: Arc::new(playback),
            errors,
            poller: ProgressPoller::new(config.poll_interval),
            runtime: Mutex::new(None),
        });

        Self {
            inner,
            api,
            loader,
            config,
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> AdapterState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AdapterState> {
        self.inner.state.subscribe()
    }

    pub fn playback(&self) -> PlaybackState {
        self.inner.playback.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.playback.subscribe()
    }

    /// Errors reported asynchronously by the SDK, already classified.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ClassifiedError> {
        self.inner.errors.subscribe()
    }

    pub fn device(&self) -> Option<PlaybackDevice> {
        lock(&self.inner.device).clone()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_running()
    }

    /// Loads the SDK through the shared loader.
    pub async fn load_sdk(&self) -> Result<(), PlayerError> {
        if self.state() == AdapterState::Uninitialized {
            self.inner.set_state(AdapterState::SdkLoading);
        }

        match self.loader.load().await {
            Ok(()) => {
                if self.state() == AdapterState::SdkLoading {
                    self.inner.set_state(AdapterState::SdkReady);
                }
                Ok(())
            }
            Err(e) => {
                self.inner.set_state(AdapterState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Creates the player, registers its listeners and connects it.
    ///
    /// Does nothing when a live player already exists; a player whose session
    /// was rejected is replaced. Readiness arrives later
    /// through the `ready` event; see [`PlaybackAdapter::wait_until_ready`].
    ///
    /// # Errors
    ///
    /// - [`PlayerError::NotLoggedIn`] without a valid token. The SDK is not
    ///   loaded in that case.
    /// - [`PlayerError::SdkLoadTimeout`] / [`PlayerError::SdkUnavailable`]
    ///   when the SDK cannot be loaded.
    /// - [`PlayerError::ConnectFailed`] when the player refuses to connect.
    pub async fn initialize_player(&self) -> Result<(), PlayerError> {
        let _guard = self.init_lock.lock().await;
        if self.inner.current_player().is_some() {
            if self.state() != AdapterState::Disconnected {
                return Ok(());
            }
            self.disconnect();
        }

        if self.inner.auth.get_valid_token().await?.is_none() {
            return Err(PlayerError::NotLoggedIn);
        }

        self.load_sdk().await?;
        *lock(&self.inner.runtime) = Some(Handle::current());

        let options = PlayerOptions {
            name: self.config.name.clone(),
            volume: self.config.volume.clamp(0.0, 1.0),
            token_provider: Arc::new(SessionTokens {
                auth: self.inner.auth.clone(),
            }),
        };
        let player = self
            .loader
            .sdk()
            .create_player(options)
            .map_err(PlayerError::SdkUnavailable)?;

        let weak = Arc::downgrade(&self.inner);
        let listener: Listener = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        });
        for kind in EventKind::ALL {
            player.add_listener(kind, listener.clone());
        }

        *lock(&self.inner.player) = Some(player.clone());
        self.inner.set_state(AdapterState::PlayerConnecting);

        if !player.connect().await {
            tracing::warn!(name = %self.config.name, "player failed to connect");
            self.disconnect();
            return Err(PlayerError::ConnectFailed);
        }

        tracing::debug!(name = %self.config.name, "player connected");
        Ok(())
    }

    /// Waits for the `ready` event and returns the device it announced.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<PlaybackDevice, PlayerError> {
        let mut rx = self.inner.state.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| {
                matches!(
                    s,
                    AdapterState::PlayerReady
                        | AdapterState::Disconnected
                        | AdapterState::Uninitialized
                )
            }),
        )
        .await;

        let reached = match waited {
            Ok(Ok(state)) => *state,
            Ok(Err(_)) => AdapterState::Uninitialized,
            Err(_) => return Err(PlayerError::NotReady),
        };

        match reached {
            AdapterState::PlayerReady => self.device().ok_or(PlayerError::NotReady),
            AdapterState::Disconnected => Err(PlayerError::NotLoggedIn),
            _ => Err(PlayerError::NotInitialized),
        }
    }

    fn ready_device(&self) -> Result<String, PlayerError> {
        if self.state() != AdapterState::PlayerReady {
            return Err(PlayerError::NotReady);
        }
        match self.device() {
            Some(device) if device.is_ready => Ok(device.device_id),
            _ => Err(PlayerError::NotReady),
        }
    }

    /// Starts playback of a track on this player's device.
    ///
    /// # Errors
    ///
    /// - [`PlayerError::MissingTrack`] for an empty track id.
    /// - [`PlayerError::NotReady`] before the `ready` event.
    /// - [`PlayerError::Api`] for Web API failures. A 401 has already logged
    ///   the user out by the time it is returned.
    pub async fn play_track(&self, track_id: &str) -> Result<(), PlayerError> {
        let track_id = track_id.trim();
        if track_id.is_empty() {
            return Err(PlayerError::MissingTrack);
        }
        let device_id = self.ready_device()?;

        tracing::info!(track_id, device_id = %device_id, "starting playback");
        self.api.start_playback(&device_id, track_id).await?;

        self.sync_after_play(track_id).await;
        Ok(())
    }

    /// Searches for a track and plays the best match.
    pub async fn play_search(&self, query: &str) -> Result<Track, PlayerError> {
        self.ready_device()?;
        let track = self
            .api
            .search_track(query)
            .await?
            .ok_or_else(|| PlayerError::TrackNotFound(query.to_string()))?;

        self.play_track(&track.id).await?;
        Ok(track)
    }

    /// Queries the player until it reports the requested track, so the
    /// mirror does not lag behind a REST-started playback.
    async fn sync_after_play(&self, track_id: &str) {
        let Some(player) = self.inner.current_player() else {
            return;
        };

        for attempt in 1..=PLAY_SYNC_ATTEMPTS {
            match player.get_current_state().await {
                Ok(state) => {
                    let started = state.as_ref().is_some_and(|s| {
                        !s.paused
                            && s.track.as_ref().and_then(|t| t.id.as_deref()) == Some(track_id)
                    });
                    self.inner.apply_state(state);
                    if started {
                        return;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "state query after play failed"),
            }
            if attempt < PLAY_SYNC_ATTEMPTS {
                tokio::time::sleep(PLAY_SYNC_DELAY).await;
            }
        }
    }

    fn require_player(&self) -> Result<Arc<dyn SdkPlayer>, PlayerError> {
        self.inner
            .current_player()
            .ok_or(PlayerError::NotInitialized)
    }

    pub async fn pause(&self) -> Result<(), PlayerError> {
        let player = self.require_player()?;
        player.pause().await.map_err(|source| PlayerError::Sdk {
            operation: "pause",
            source,
        })
    }

    pub async fn seek(&self, position_ms: u64) -> Result<(), PlayerError> {
        let player = self.require_player()?;
        player
            .seek(position_ms)
            .await
            .map_err(|source| PlayerError::Sdk {
                operation: "seek",
                source,
            })
    }

    /// Sets the volume in percent (0-100).
    pub async fn set_volume(&self, percent: u8) -> Result<(), PlayerError> {
        if percent > 100 {
            return Err(PlayerError::InvalidVolume(percent));
        }
        let player = self.require_player()?;
        player
            .set_volume(f32::from(percent) / 100.0)
            .await
            .map_err(|source| PlayerError::Sdk {
                operation: "set_volume",
                source,
            })
    }

    /// Asks the player for its current state and mirrors the answer.
    pub async fn current_state(&self) -> Result<Option<PlaybackState>, PlayerError> {
        let player = self.require_player()?;
        let state = player
            .get_current_state()
            .await
            .map_err(|source: SdkError| PlayerError::Sdk {
                operation: "get_current_state",
                source,
            })?;

        let mirrored = state.as_ref().map(PlaybackState::from_sdk);
        self.inner.apply_state(state);
        Ok(mirrored)
    }

    /// Stops polling, removes every listener and disconnects the player.
    ///
    /// Safe to call more than once.
    pub fn disconnect(&self) {
        self.inner.poller.stop();

        let player = lock(&self.inner.player).take();
        if let Some(player) = player {
            for kind in EventKind::ALL {
                player.remove_listener(kind);
            }
            player.disconnect();
            tracing::debug!(name = %self.config.name, "player disconnected");
        }

        *lock(&self.inner.device) = None;
        self.inner.playback.send_replace(PlaybackState::default());
        self.inner.set_state(AdapterState::Uninitialized);
    }
}

impl Drop for PlaybackAdapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}
