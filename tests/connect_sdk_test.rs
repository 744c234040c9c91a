//! Spotify Connect backed player against a mocked Web API.

mod common;

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

use jazzplay::{
    errors::{Classify, ErrorKind, RawError, RecoveryAction, SdkError},
    player::{ConnectSdk, EventKind, PlaybackSdk, PlayerOptions, SdkEvent, SdkPlayer},
};

use common::*;

type Events = Arc<Mutex<Vec<SdkEvent>>>;

fn player(server: &MockServer, token: Option<&str>) -> (Arc<dyn SdkPlayer>, Events) {
    let sdk = ConnectSdk::new(server.uri());
    let player = sdk
        .create_player(PlayerOptions {
            name: "Jazz Standards Player".into(),
            volume: 0.7,
            token_provider: Arc::new(StaticToken(token.map(str::to_string))),
        })
        .unwrap();

    let events: Events = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let events = events.clone();
        player.add_listener(
            kind,
            Arc::new(move |event: SdkEvent| events.lock().unwrap().push(event)),
        );
    }
    (player, events)
}

async fn mount_devices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                {"id": "kitchen", "name": "Kitchen", "is_active": true, "type": "Speaker"},
                {
                    "id": "desk",
                    "name": "jazz standards player",
                    "is_active": false,
                    "type": "Computer"
                }
            ]
        })))
        .mount(server)
        .await;
}

fn current_playback(is_playing: bool, progress_ms: u64) -> serde_json::Value {
    json!({
        "is_playing": is_playing,
        "progress_ms": progress_ms,
        "item": {
            "id": "t1",
            "name": "Autumn Leaves",
            "uri": "spotify:track:t1",
            "duration_ms": 200000,
            "artists": [{"name": "Cannonball Adderley"}]
        }
    })
}

#[tokio::test]
async fn connect_attaches_to_the_named_device() {
    let server = MockServer::start().await;
    mount_devices(&server).await;

    let (player, events) = player(&server, Some("tok"));

    assert!(player.connect().await);
    assert_eq!(
        *events.lock().unwrap(),
        vec![SdkEvent::Ready {
            device_id: "desk".into()
        }]
    );
}

#[tokio::test]
async fn connect_without_devices_fails_initialization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"devices": []})))
        .mount(&server)
        .await;

    let (player, events) = player(&server, Some("tok"));

    assert!(!player.connect().await);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let SdkEvent::InitializationError { message } = &events[0] else {
        panic!("expected initialization error, got {:?}", events[0]);
    };

    // Reported as a missing device, with the hint to open Spotify.
    let classified = RawError::new("initialization_error", message.clone()).classify();
    assert_eq!(classified.kind, ErrorKind::Device);
    assert_eq!(classified.action, RecoveryAction::Retry);
    assert!(classified.message.contains("Open Spotify"));
}

#[tokio::test]
async fn load_checks_the_web_api_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sdk = ConnectSdk::new(server.uri());
    assert!(!sdk.is_ready());

    sdk.load().await.unwrap();
    sdk.load().await.unwrap();

    assert!(sdk.is_ready());
}

#[tokio::test]
async fn load_fails_when_web_api_is_unreachable() {
    let sdk = ConnectSdk::new("http://127.0.0.1:1");

    let err = sdk.load().await.unwrap_err();

    assert!(matches!(err, SdkError::Unavailable(_)));
    assert!(!sdk.is_ready());
}

#[tokio::test]
async fn connect_without_token_reports_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (player, events) = player(&server, None);

    assert!(!player.connect().await);
    assert!(matches!(
        events.lock().unwrap()[0],
        SdkEvent::AuthenticationError { .. }
    ));
}

#[tokio::test]
async fn rejected_token_reports_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"status": 401, "message": "The access token expired"}
        })))
        .mount(&server)
        .await;

    let (player, events) = player(&server, Some("tok"));

    assert!(!player.connect().await);
    assert_eq!(
        *events.lock().unwrap(),
        vec![SdkEvent::AuthenticationError {
            message: "The access token expired".into()
        }]
    );
}

#[tokio::test]
async fn state_changes_are_emitted_once() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_playback(true, 1_000)))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_playback(false, 2_000)))
        .mount(&server)
        .await;

    let (player, events) = player(&server, Some("tok"));
    assert!(player.connect().await);

    let first = player.get_current_state().await.unwrap().unwrap();
    assert!(!first.paused);
    assert_eq!(first.position_ms, 1_000);
    assert_eq!(first.duration_ms, 200_000);
    assert_eq!(first.track.as_ref().unwrap().artists, vec!["Cannonball Adderley"]);

    // Same track, still playing: only the position moved.
    player.get_current_state().await.unwrap();
    let paused = player.get_current_state().await.unwrap().unwrap();
    assert!(paused.paused);

    let events = events.lock().unwrap();
    let changes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SdkEvent::PlayerStateChanged(state) => Some(state.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![Some(first), Some(paused)]);
}

#[tokio::test]
async fn nothing_playing_is_an_empty_state() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (player, _) = player(&server, Some("tok"));
    assert!(player.connect().await);

    assert_eq!(player.get_current_state().await.unwrap(), None);
}

#[tokio::test]
async fn pause_targets_the_attached_device() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    Mock::given(method("PUT"))
        .and(path("/me/player/pause"))
        .and(query_param("device_id", "desk"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_playback(false, 3_000)))
        .mount(&server)
        .await;

    let (player, events) = player(&server, Some("tok"));
    assert!(player.connect().await);

    player.pause().await.unwrap();

    // The follow-up state query reports the pause.
    assert!(events.lock().unwrap().iter().any(|e| matches!(
        e,
        SdkEvent::PlayerStateChanged(Some(state)) if state.paused
    )));
}

#[tokio::test]
async fn volume_and_seek_are_sent_as_query_parameters() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    Mock::given(method("PUT"))
        .and(path("/me/player/volume"))
        .and(query_param("volume_percent", "35"))
        .and(query_param("device_id", "desk"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/player/seek"))
        .and(query_param("position_ms", "90000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (player, _) = player(&server, Some("tok"));
    assert!(player.connect().await);

    player.set_volume(0.35).await.unwrap();
    player.seek(90_000).await.unwrap();
}

#[tokio::test]
async fn premium_restriction_reports_account_error() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    Mock::given(method("PUT"))
        .and(path("/me/player/pause"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "status": 403,
                "message": "Player command failed: Premium required",
                "reason": "PREMIUM_REQUIRED"
            }
        })))
        .mount(&server)
        .await;

    let (player, events) = player(&server, Some("tok"));
    assert!(player.connect().await);

    let err = player.pause().await.unwrap_err();

    assert!(matches!(err, SdkError::Account(_)));
    assert!(matches!(
        events.lock().unwrap().last(),
        Some(SdkEvent::AccountError { .. })
    ));
}

#[tokio::test]
async fn commands_before_connect_fail_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let (player, _) = player(&server, Some("tok"));

    assert!(matches!(
        player.pause().await,
        Err(SdkError::Unavailable(_))
    ));
}

#[tokio::test]
async fn disconnect_drops_listeners_and_device() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let (player, events) = player(&server, Some("tok"));
    assert!(player.connect().await);
    player.disconnect();

    assert!(player.pause().await.is_err());
    // Only the ready event from connect was delivered.
    assert_eq!(events.lock().unwrap().len(), 1);
}
