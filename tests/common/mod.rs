//! Shared test helpers and a scriptable playback SDK.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use jazzplay::{
    errors::SdkError,
    player::{
        EventKind, Listener, PlaybackSdk, PlayerOptions, SdkEvent, SdkPlaybackState, SdkPlayer,
        TokenProvider, TrackRef,
    },
    session::{AuthSession, MemoryStorage, TokenStore},
    spotify::{AuthConfig, AuthController, WebApi},
};

pub const CLIENT_ID: &str = "client-123";
pub const REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

pub fn memory_store() -> TokenStore {
    TokenStore::new(Arc::new(MemoryStorage::new()))
}

pub fn auth_config(proxy_url: &str) -> AuthConfig {
    AuthConfig::new(CLIENT_ID, REDIRECT_URI, proxy_url)
}

pub fn controller(proxy_url: &str, store: TokenStore) -> Arc<AuthController> {
    Arc::new(AuthController::new(auth_config(proxy_url), store))
}

/// A store holding an unexpired session for `access_token`.
pub fn logged_in_store(access_token: &str) -> TokenStore {
    let store = memory_store();
    store
        .save(&AuthSession::new(access_token, Some(3600), Some("refresh-1".into())))
        .unwrap();
    store
}

/// A store whose session expired a minute ago.
pub fn expired_store(refresh_token: Option<&str>) -> TokenStore {
    let store = memory_store();
    store
        .save(&AuthSession::new(
            "stale-token",
            Some(-60),
            refresh_token.map(str::to_string),
        ))
        .unwrap();
    store
}

pub fn web_api(base_url: &str, store: TokenStore) -> Arc<WebApi> {
    Arc::new(WebApi::new(base_url, controller(base_url, store)))
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    let url = reqwest::Url::parse(url).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn playing(track_id: &str, position_ms: u64) -> SdkPlaybackState {
    SdkPlaybackState {
        paused: false,
        position_ms,
        duration_ms: 200_000,
        track: Some(TrackRef {
            id: Some(track_id.to_string()),
            uri: format!("spotify:track:{track_id}"),
            name: "Autumn Leaves".into(),
            artists: vec!["Cannonball Adderley".into()],
        }),
    }
}

/// Player whose behaviour is fixed at construction and whose events are
/// emitted by the test.
pub struct FakePlayer {
    listeners: Mutex<HashMap<EventKind, Listener>>,
    connect_result: bool,
    ready_on_connect: bool,
    pub state: Mutex<Option<SdkPlaybackState>>,
    pub volume: Mutex<Option<f32>>,
    pub seeks: Mutex<Vec<u64>>,
    pub pauses: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub fail_pause: AtomicBool,
    pub tokens: Mutex<Option<Arc<dyn TokenProvider>>>,
}

impl FakePlayer {
    pub fn new(connect_result: bool, ready_on_connect: bool) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            connect_result,
            ready_on_connect,
            state: Mutex::new(None),
            volume: Mutex::new(None),
            seeks: Mutex::new(Vec::new()),
            pauses: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            fail_pause: AtomicBool::new(false),
            tokens: Mutex::new(None),
        }
    }

    pub fn emit(&self, event: SdkEvent) {
        let listener = self.listeners.lock().unwrap().get(&event.kind()).cloned();
        if let Some(listener) = listener {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[async_trait]
impl SdkPlayer for FakePlayer {
    fn add_listener(&self, kind: EventKind, listener: Listener) {
        self.listeners.lock().unwrap().insert(kind, listener);
    }

    fn remove_listener(&self, kind: EventKind) {
        self.listeners.lock().unwrap().remove(&kind);
    }

    async fn connect(&self) -> bool {
        if self.ready_on_connect {
            self.emit(SdkEvent::Ready {
                device_id: "fake-device".into(),
            });
        }
        self.connect_result
    }

    async fn pause(&self) -> Result<(), SdkError> {
        if self.fail_pause.load(Ordering::SeqCst) {
            return Err(SdkError::Playback("Player command failed: Restriction violated".into()));
        }
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), SdkError> {
        self.seeks.lock().unwrap().push(position_ms);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), SdkError> {
        *self.volume.lock().unwrap() = Some(volume);
        Ok(())
    }

    async fn get_current_state(&self) -> Result<Option<SdkPlaybackState>, SdkError> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeSdk {
    pub player: Arc<FakePlayer>,
    pub loads: AtomicUsize,
    pub players_created: AtomicUsize,
    load_delay: Duration,
}

impl FakeSdk {
    pub fn new(player: Arc<FakePlayer>) -> Self {
        Self::with_load_delay(player, Duration::ZERO)
    }

    pub fn with_load_delay(player: Arc<FakePlayer>, load_delay: Duration) -> Self {
        Self {
            player,
            loads: AtomicUsize::new(0),
            players_created: AtomicUsize::new(0),
            load_delay,
        }
    }
}

#[async_trait]
impl PlaybackSdk for FakeSdk {
    async fn load(&self) -> Result<(), SdkError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok(())
    }

    fn create_player(&self, options: PlayerOptions) -> Result<Arc<dyn SdkPlayer>, SdkError> {
        self.players_created.fetch_add(1, Ordering::SeqCst);
        *self.player.tokens.lock().unwrap() = Some(options.token_provider);
        Ok(self.player.clone())
    }
}

/// Token provider handing out a fixed token.
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}
