//! Authorization flow against a mocked token proxy: login URL, callback
//! validation, refresh coalescing and logout.

mod common;

use std::{sync::Arc, time::Duration};

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

use jazzplay::{
    errors::{AuthError, Classify, RecoveryAction},
    pkce,
    session::MAX_EXPIRES_IN,
    spotify::{AuthConfig, AuthController, AuthState, CallbackQuery},
};

use common::*;

fn callback(code: Option<&str>, state: Option<&str>) -> CallbackQuery {
    CallbackQuery {
        code: code.map(str::to_string),
        state: state.map(str::to_string),
        ..Default::default()
    }
}

fn token_body(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-1",
        "scope": "streaming"
    })
}

#[tokio::test]
async fn login_url_carries_pkce_parameters() {
    let store = memory_store();
    let auth = controller("http://unused", store.clone());

    let url = auth.build_login_url().unwrap();
    let pending = store.pending().unwrap().expect("pending authorization saved");

    assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
    assert_eq!(query_param(&url, "client_id").as_deref(), Some(CLIENT_ID));
    assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&url, "redirect_uri").as_deref(), Some(REDIRECT_URI));
    assert_eq!(query_param(&url, "code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(query_param(&url, "show_dialog").as_deref(), Some("true"));
    assert_eq!(query_param(&url, "state"), Some(pending.state.clone()));
    assert_eq!(
        query_param(&url, "code_challenge"),
        Some(pkce::generate_code_challenge(&pending.code_verifier))
    );
    assert!(
        query_param(&url, "scope")
            .unwrap()
            .contains("user-modify-playback-state")
    );
    assert_eq!(auth.state(), AuthState::LoginInitiated);
}

#[tokio::test]
async fn every_login_url_uses_fresh_secrets() {
    let store = memory_store();
    let auth = controller("http://unused", store.clone());

    let first = auth.build_login_url().unwrap();
    let first_pending = store.pending().unwrap().unwrap();
    let second = auth.build_login_url().unwrap();
    let second_pending = store.pending().unwrap().unwrap();

    assert_ne!(query_param(&first, "state"), query_param(&second, "state"));
    assert_ne!(first_pending.code_verifier, second_pending.code_verifier);
}

#[tokio::test]
async fn missing_client_id_is_a_config_error() {
    let store = memory_store();
    let config = AuthConfig {
        client_id: None,
        ..auth_config("http://unused")
    };
    let auth = AuthController::new(config, store.clone());

    let err = auth.build_login_url().unwrap_err();

    assert!(matches!(err, AuthError::Config(_)));
    assert_eq!(err.classify().action, RecoveryAction::None);
    assert!(store.pending().unwrap().is_none());
}

#[tokio::test]
async fn mismatched_state_never_reaches_the_proxy() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("never")))
        .expect(0)
        .mount(&proxy)
        .await;

    let store = memory_store();
    let auth = controller(&proxy.uri(), store.clone());
    auth.build_login_url().unwrap();

    let err = auth
        .handle_callback(&callback(Some("code-1"), Some("forged-state")))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch));
    assert!(store.pending().unwrap().is_some());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn callback_without_login_is_a_state_mismatch() {
    let store = memory_store();
    let auth = controller("http://unused", store);

    let err = auth
        .handle_callback(&callback(Some("code-1"), Some("anything")))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn valid_callback_stores_session_and_erases_secrets() {
    let proxy = MockServer::start().await;
    let store = memory_store();
    let auth = controller(&proxy.uri(), store.clone());

    let url = auth.build_login_url().unwrap();
    let pending = store.pending().unwrap().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/spotify/token"))
        .and(body_partial_json(json!({
            "code": "code-1",
            "redirectUri": REDIRECT_URI,
            "codeVerifier": pending.code_verifier,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
        .expect(1)
        .mount(&proxy)
        .await;

    let state = query_param(&url, "state");
    let session = auth
        .handle_callback(&callback(Some("code-1"), state.as_deref()))
        .await
        .unwrap();

    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(store.load().unwrap(), Some(session));
    assert!(store.pending().unwrap().is_none());
    assert_eq!(auth.state(), AuthState::LoggedIn);
}

#[tokio::test]
async fn replayed_callback_fails() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
        .expect(1)
        .mount(&proxy)
        .await;

    let auth = controller(&proxy.uri(), memory_store());
    let url = auth.build_login_url().unwrap();
    let query = callback(Some("code-1"), query_param(&url, "state").as_deref());

    auth.handle_callback(&query).await.unwrap();
    let err = auth.handle_callback(&query).await.unwrap_err();

    assert!(matches!(err, AuthError::StateMismatch));
}

#[tokio::test]
async fn provider_error_is_reported_before_state() {
    let store = memory_store();
    let auth = controller("http://unused", store.clone());
    auth.build_login_url().unwrap();

    let query = CallbackQuery {
        error: Some("access_denied".into()),
        state: Some("not-even-checked".into()),
        ..Default::default()
    };
    let err = auth.handle_callback(&query).await.unwrap_err();

    match err {
        AuthError::AuthDenied(description) => assert_eq!(description, "access_denied"),
        other => panic!("expected AuthDenied, got {other:?}"),
    }
    assert!(store.pending().unwrap().is_none());
    assert_eq!(auth.state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn missing_code_abandons_the_login() {
    let store = memory_store();
    let auth = controller("http://unused", store.clone());
    let url = auth.build_login_url().unwrap();

    let err = auth
        .handle_callback(&callback(None, query_param(&url, "state").as_deref()))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::MissingCode));
    assert!(store.pending().unwrap().is_none());
}

#[tokio::test]
async fn rejected_exchange_clears_pending_and_keeps_message() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "Invalid authorization code"})),
        )
        .mount(&proxy)
        .await;

    let store = memory_store();
    let auth = controller(&proxy.uri(), store.clone());
    let url = auth.build_login_url().unwrap();

    let err = auth
        .handle_callback(&callback(Some("bad"), query_param(&url, "state").as_deref()))
        .await
        .unwrap_err();

    match &err {
        AuthError::Exchange { status, message } => {
            assert_eq!(*status, Some(400));
            assert_eq!(message, "Invalid authorization code");
        }
        other => panic!("expected Exchange, got {other:?}"),
    }
    assert_eq!(err.classify().action, RecoveryAction::Login);
    assert!(store.pending().unwrap().is_none());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn unexpired_token_is_returned_without_network() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&proxy)
        .await;

    let auth = controller(&proxy.uri(), logged_in_store("live-token"));

    assert_eq!(auth.get_valid_token().await.unwrap().as_deref(), Some("live-token"));
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/refresh"))
        .and(body_partial_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh-token", "expires_in": 3600}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    let store = expired_store(Some("refresh-1"));
    let auth = controller(&proxy.uri(), store.clone());

    let (a, b, c, d, e) = tokio::join!(
        auth.get_valid_token(),
        auth.get_valid_token(),
        auth.get_valid_token(),
        auth.get_valid_token(),
        auth.get_valid_token(),
    );

    for token in [a, b, c, d, e] {
        assert_eq!(token.unwrap().as_deref(), Some("fresh-token"));
    }
    let session = store.load().unwrap().unwrap();
    assert_eq!(session.access_token, "fresh-token");
    // The provider did not rotate the refresh token, so the old one stays.
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn failed_refresh_logs_out_but_keeps_market() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/refresh"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid refresh token"})),
        )
        .mount(&proxy)
        .await;

    let store = expired_store(Some("revoked"));
    store.set_market("de").unwrap();
    let auth = controller(&proxy.uri(), store.clone());

    let err = auth.get_valid_token().await.unwrap_err();

    match &err {
        AuthError::RefreshFailed(message) => assert_eq!(message, "Invalid refresh token"),
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
    assert_eq!(err.classify().action, RecoveryAction::Login);
    assert!(store.stored().unwrap().is_none());
    assert_eq!(store.market().unwrap(), "DE");
    assert_eq!(auth.state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn concurrent_callers_share_one_failed_refresh() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/refresh"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "Invalid refresh token"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    let store = expired_store(Some("revoked"));
    let auth = controller(&proxy.uri(), store.clone());

    let (a, b, c, d, e) = tokio::join!(
        auth.get_valid_token(),
        auth.get_valid_token(),
        auth.get_valid_token(),
        auth.get_valid_token(),
        auth.get_valid_token(),
    );

    for result in [a, b, c, d, e] {
        assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
    }
    assert!(store.stored().unwrap().is_none());
    assert_eq!(auth.state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn logout_during_refresh_discards_new_tokens() {
    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/spotify/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh-token", "expires_in": 3600}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    let store = expired_store(Some("refresh-1"));
    let auth = controller(&proxy.uri(), store.clone());

    let (result, _) = tokio::join!(auth.get_valid_token(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        auth.logout().unwrap();
    });

    assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
    assert!(store.stored().unwrap().is_none());
    assert!(!auth.is_logged_in());
    assert_eq!(auth.state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn oversized_token_lifetime_is_capped() {
    let proxy = MockServer::start().await;
    let store = memory_store();
    let auth = controller(&proxy.uri(), store.clone());

    let url = auth.build_login_url().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/spotify/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a",
            "expires_in": 1_000_000_000_000_000_i64
        })))
        .mount(&proxy)
        .await;

    let state = query_param(&url, "state");
    let session = auth
        .handle_callback(&callback(Some("code-1"), state.as_deref()))
        .await
        .unwrap();

    assert!(session.expires_at <= Utc::now() + TimeDelta::seconds(MAX_EXPIRES_IN));
    assert_eq!(store.load().unwrap(), Some(session));
}

#[tokio::test]
async fn expired_session_without_refresh_token_logs_out() {
    let store = expired_store(None);
    let auth = controller("http://unused", store.clone());

    assert_eq!(auth.get_valid_token().await.unwrap(), None);
    assert!(store.stored().unwrap().is_none());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let store = logged_in_store("live-token");
    let auth = Arc::new(AuthController::new(auth_config("http://unused"), store.clone()));

    auth.logout().unwrap();
    auth.logout().unwrap();

    assert!(!auth.is_logged_in());
    assert_eq!(auth.get_valid_token().await.unwrap(), None);
}
