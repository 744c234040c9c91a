use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{OnceCell, watch};

use crate::errors::{PlayerError, SdkError};

use super::state::TrackRef;

/// Events a player emits, named after the vendor SDK's event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    NotReady,
    PlayerStateChanged,
    InitializationError,
    AuthenticationError,
    AccountError,
    PlaybackError,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Ready,
        EventKind::NotReady,
        EventKind::PlayerStateChanged,
        EventKind::InitializationError,
        EventKind::AuthenticationError,
        EventKind::AccountError,
        EventKind::PlaybackError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::NotReady => "not_ready",
            EventKind::PlayerStateChanged => "player_state_changed",
            EventKind::InitializationError => "initialization_error",
            EventKind::AuthenticationError => "authentication_error",
            EventKind::AccountError => "account_error",
            EventKind::PlaybackError => "playback_error",
        }
    }
}

/// Playback state as reported by the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkPlaybackState {
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub track: Option<TrackRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    Ready { device_id: String },
    NotReady { device_id: String },
    PlayerStateChanged(Option<SdkPlaybackState>),
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
}

impl SdkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SdkEvent::Ready { .. } => EventKind::Ready,
            SdkEvent::NotReady { .. } => EventKind::NotReady,
            SdkEvent::PlayerStateChanged(_) => EventKind::PlayerStateChanged,
            SdkEvent::InitializationError { .. } => EventKind::InitializationError,
            SdkEvent::AuthenticationError { .. } => EventKind::AuthenticationError,
            SdkEvent::AccountError { .. } => EventKind::AccountError,
            SdkEvent::PlaybackError { .. } => EventKind::PlaybackError,
        }
    }
}

pub type Listener = Arc<dyn Fn(SdkEvent) + Send + Sync>;

/// Supplies access tokens to a player on demand.
///
/// Players must call this for every request instead of caching a token, so
/// refreshes that happen mid-session are picked up.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

pub struct PlayerOptions {
    pub name: String,
    /// 0.0 to 1.0
    pub volume: f32,
    pub token_provider: Arc<dyn TokenProvider>,
}

/// The vendor playback SDK: loading its runtime and constructing players.
#[async_trait]
pub trait PlaybackSdk: Send + Sync {
    /// Loads the SDK runtime and resolves once it signals readiness.
    async fn load(&self) -> Result<(), SdkError>;

    fn create_player(&self, options: PlayerOptions) -> Result<Arc<dyn SdkPlayer>, SdkError>;
}

/// One player instance created by a [`PlaybackSdk`].
#[async_trait]
pub trait SdkPlayer: Send + Sync {
    /// Registers the listener for an event, replacing a previous one.
    fn add_listener(&self, kind: EventKind, listener: Listener);

    fn remove_listener(&self, kind: EventKind);

    /// Returns `false` when the player could not connect.
    async fn connect(&self) -> bool;

    async fn pause(&self) -> Result<(), SdkError>;

    async fn seek(&self, position_ms: u64) -> Result<(), SdkError>;

    /// `volume` ranges from 0.0 to 1.0.
    async fn set_volume(&self, volume: f32) -> Result<(), SdkError>;

    async fn get_current_state(&self) -> Result<Option<SdkPlaybackState>, SdkError>;

    fn disconnect(&self);
}

/// One-shot readiness flag for SDK implementations whose runtime announces
/// itself through a callback.
///
/// Firing is idempotent; every waiter resolves once, no matter how many
/// times the callback runs.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Marks the runtime ready. Returns `true` only for the first call.
    pub fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

/// Loads a [`PlaybackSdk`] at most once, however many players ask for it.
///
/// Share one loader per process. Concurrent callers wait on the same load;
/// a failed or timed out load may be retried by the next caller.
pub struct SdkLoader {
    sdk: Arc<dyn PlaybackSdk>,
    timeout: Duration,
    loaded: OnceCell<()>,
}

impl SdkLoader {
    pub fn new(sdk: Arc<dyn PlaybackSdk>, timeout: Duration) -> Self {
        Self {
            sdk,
            timeout,
            loaded: OnceCell::new(),
        }
    }

    pub fn sdk(&self) -> &Arc<dyn PlaybackSdk> {
        &self.sdk
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    pub async fn load(&self) -> Result<(), PlayerError> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::debug!(timeout_ms = self.timeout.as_millis() as u64, "loading player SDK");
                match tokio::time::timeout(self.timeout, self.sdk.load()).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(PlayerError::SdkUnavailable(e)),
                    Err(_) => Err(PlayerError::SdkLoadTimeout(self.timeout)),
                }
            })
            .await
            .map(|_| ())
    }
}
