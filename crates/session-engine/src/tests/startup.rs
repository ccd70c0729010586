//! Startup sequence tests.
//!
//! Covers:
//! - Redirect landing: token pickup, identity, access token, URL stripping
//! - Anonymous start makes no calls
//! - URL token is persisted and stripped once across repeated starts
//! - Stale tokens stop after the identity check
//! - Initialization completes even when a step fails

use super::harness::{Reply, TestHarness, APP_URL, START_MILLIS};
use crate::{TOKEN_PATH, USER_INFO_PATH};
use parking_lot::Mutex;
use serde_json::json;
use session_storage::StorageKeys;
use std::sync::Arc;

/// Landing from the issuer's redirect ends fully logged in.
#[tokio::test]
async fn redirect_landing_logs_in() {
    let h = TestHarness::new("https://app.example/callback?token=abc123");
    h.transport
        .set_default(USER_INFO_PATH, Reply::Json(json!({"sub": "u1", "name": "A"})));
    h.transport.set_default(
        TOKEN_PATH,
        Reply::Json(json!({"token": "jwt1", "claims": {"iat": 1000, "exp": 1600}})),
    );

    h.engine.load_initial_data().await.unwrap();

    let state = h.engine.state();
    assert!(state.is_initialized);
    assert!(state.is_logged_in);
    assert_eq!(state.user_info, Some(json!({"sub": "u1", "name": "A"})));
    assert_eq!(state.csrf_token.as_deref(), Some("abc123"));
    assert_eq!(h.navigator.replacements(), vec![APP_URL.to_string()]);
    assert_eq!(
        h.engine.access_token_valid_until(),
        Some(START_MILLIS + 600_000)
    );
    assert_eq!(
        h.engine.get_access_token_string().await.unwrap().as_deref(),
        Some("jwt1")
    );
    assert_eq!(h.transport.calls(TOKEN_PATH), 1);

    let store = h.store();
    assert_eq!(store.session_token().unwrap().as_deref(), Some("abc123"));
    assert!(store.is_logged_in().unwrap());
    assert_eq!(store.user_info().unwrap(), Some(json!({"sub": "u1", "name": "A"})));
}

/// Nothing to pick up, nothing fetched.
#[tokio::test]
async fn anonymous_start_makes_no_calls() {
    let h = TestHarness::new(APP_URL);

    h.engine.load_initial_data().await.unwrap();

    let state = h.engine.state();
    assert!(state.is_initialized);
    assert!(!state.is_logged_in);
    assert_eq!(h.transport.total_calls(), 0);
    assert!(h.navigator.replacements().is_empty());
}

/// Running startup twice persists and strips the redirect token once.
#[tokio::test]
async fn url_token_is_consumed_once() {
    let h = TestHarness::with_issuer(&format!("{APP_URL}?token=X&tab=2"), "u1", 600);

    h.engine.load_initial_data().await.unwrap();
    h.engine.load_initial_data().await.unwrap();

    assert_eq!(h.storage.writes(StorageKeys::CSRF_TOKEN), 1);
    assert_eq!(
        h.navigator.replacements(),
        vec![format!("{APP_URL}?tab=2")]
    );
    // The second run trusts the snapshot and the live access token
    assert_eq!(h.transport.calls(USER_INFO_PATH), 1);
    assert_eq!(h.transport.calls(TOKEN_PATH), 1);
    assert_eq!(h.transport.session_tokens(), vec!["X", "X"]);
}

/// A later page load reuses the persisted token without touching the URL.
#[tokio::test]
async fn reload_reuses_persisted_token() {
    let first = TestHarness::with_issuer(&format!("{APP_URL}?token=X"), "u1", 600);
    first.engine.load_initial_data().await.unwrap();

    let second = first.reload(APP_URL);
    second.engine.load_initial_data().await.unwrap();

    let state = second.engine.state();
    assert!(state.is_logged_in);
    assert_eq!(state.csrf_token.as_deref(), Some("X"));
    assert!(second.navigator.replacements().is_empty());
    // Identity comes from the persisted snapshot; the access token is refetched
    assert_eq!(second.transport.calls(USER_INFO_PATH), 1);
    assert_eq!(second.transport.calls(TOKEN_PATH), 2);
}

/// A token the issuer no longer knows stops after the empty identity.
#[tokio::test]
async fn stale_token_stops_after_empty_user_info() {
    let h = TestHarness::new(&format!("{APP_URL}?token=stale"));
    h.transport.set_default(USER_INFO_PATH, Reply::Json(json!({})));
    h.transport.set_default(TOKEN_PATH, Reply::token("jwt1", 600));

    h.engine.load_initial_data().await.unwrap();

    let state = h.engine.state();
    assert!(state.is_initialized);
    assert!(!state.is_logged_in);
    assert_eq!(state.user_info, None);
    assert_eq!(h.transport.calls(TOKEN_PATH), 0);
    // Stripped regardless of outcome
    assert_eq!(h.navigator.replacements(), vec![APP_URL.to_string()]);
}

/// A 403 on `/userinfo` logs out; other failures leave login alone.
#[tokio::test]
async fn user_info_failures() {
    let h = TestHarness::new(&format!("{APP_URL}?token=sess"));
    h.engine.receive_session_token().unwrap();
    h.transport.set_default(TOKEN_PATH, Reply::token("jwt1", 600));
    h.engine.get_access_token().await.unwrap();
    assert!(h.engine.state().is_logged_in);

    h.transport.queue(USER_INFO_PATH, Reply::Status(500));
    assert_eq!(h.engine.fetch_user_info().await, None);
    assert!(h.engine.state().is_logged_in);

    h.transport.queue(USER_INFO_PATH, Reply::Status(403));
    assert_eq!(h.engine.fetch_user_info().await, None);
    assert!(!h.engine.state().is_logged_in);
    assert!(!h.store().is_logged_in().unwrap());
}

/// Concurrent identity lookups share one fetch.
#[tokio::test]
async fn user_info_fetch_is_shared() {
    let h = TestHarness::with_issuer(&format!("{APP_URL}?token=sess"), "u1", 600);
    h.engine.receive_session_token().unwrap();

    let (first, second) = tokio::join!(
        h.engine.get_user_info_value(),
        h.engine.get_user_info_value()
    );

    assert_eq!(first, second);
    assert_eq!(h.transport.calls(USER_INFO_PATH), 1);

    #[derive(serde::Deserialize)]
    struct User {
        sub: String,
    }
    let user: User = h.engine.get_user_info().await.unwrap().unwrap();
    assert_eq!(user.sub, "u1");
    assert_eq!(h.transport.calls(USER_INFO_PATH), 1);
}

/// A storage failure is reported, but the engine still initializes.
#[tokio::test]
async fn initializes_even_when_storage_fails() {
    let h = TestHarness::with_issuer(&format!("{APP_URL}?token=X"), "u1", 600);
    h.storage.fail_writes(true);

    assert!(h.engine.load_initial_data().await.is_err());

    assert!(h.engine.state().is_initialized);
    assert_eq!(h.transport.total_calls(), 0);
}

/// The callback sees the initialized snapshot.
#[tokio::test]
async fn state_callback_observes_startup() {
    let h = TestHarness::with_issuer(&format!("{APP_URL}?token=X"), "u1", 600);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    h.engine
        .set_state_callback(Box::new(move |state| sink.lock().push(state.clone())));

    h.engine.load_initial_data().await.unwrap();

    let seen = seen.lock();
    let last = seen.last().unwrap();
    assert!(last.is_initialized);
    assert!(last.is_logged_in);
    assert!(seen.iter().any(|state| state.csrf_token.is_some() && !state.is_initialized));
}
