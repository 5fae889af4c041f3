//! Unit tests for the SessionBridge: origin enforcement, message parsing,
//! storage, and the AUTH_COMPLETE notification.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rstest::rstest;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::TryRecvError;

use stashed::config::Config;
use stashed::database::Database;
use stashed::managers::session_store::SessionStore;
use stashed::services::auth_client::StubAuthClient;
use stashed::services::session_bridge::{BridgeOutcome, SessionBridge};
use stashed::types::message::{ExtensionMessage, PageMessage};
use stashed::types::session::Session;

const WEB_APP_ORIGIN: &str = "https://stashed.app";

fn config() -> Config {
    Config::new(WEB_APP_ORIGIN, "https://api.stashed.app", "anon-key", "ext-id-1")
}

fn setup() -> (Arc<SessionStore>, SessionBridge) {
    // Surface bridge warn/error logs when a test fails.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let db = Arc::new(Database::open_in_memory().expect("Failed to open in-memory database"));
    let auth = Arc::new(StubAuthClient::new("user-1"));
    let sessions = Arc::new(SessionStore::new(db, auth).expect("SessionStore init failed"));
    let bridge = SessionBridge::new(sessions.clone(), &config());
    (sessions, bridge)
}

fn session() -> Session {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    Session {
        access_token: "handed-off-access".to_string(),
        refresh_token: "handed-off-refresh".to_string(),
        expires_at: now + 3_600_000,
    }
}

fn handoff_payload() -> Value {
    serde_json::to_value(PageMessage::stashed_auth(session())).unwrap()
}

#[test]
fn test_handoff_wire_format() {
    let payload = handoff_payload();
    assert_eq!(payload["type"], "STASHED_AUTH");
    assert_eq!(payload["session"]["access_token"], "handed-off-access");
    assert_eq!(
        PageMessage::extension_target_origin("ext-id-1"),
        "chrome-extension://ext-id-1"
    );
}

#[tokio::test]
async fn test_configured_origin_stores_session_and_notifies() {
    let (sessions, bridge) = setup();
    let mut rx = bridge.subscribe();

    let outcome = bridge.handle_page_message(WEB_APP_ORIGIN, handoff_payload()).await;

    assert_eq!(outcome, BridgeOutcome::Stored);
    let stored = sessions.get().await.unwrap().expect("session should be stored");
    assert_eq!(stored.access_token, "handed-off-access");
    assert_eq!(rx.try_recv().unwrap(), ExtensionMessage::AuthComplete);
}

#[rstest]
#[case("https://evil.example")]
#[case("https://stashed.app.evil.example")]
#[case("http://stashed.app")]
#[case("")]
#[tokio::test]
async fn test_unauthorized_origin_is_dropped(#[case] origin: &str) {
    let (sessions, bridge) = setup();
    let mut rx = bridge.subscribe();

    let outcome = bridge.handle_page_message(origin, handoff_payload()).await;

    assert_eq!(outcome, BridgeOutcome::RejectedOrigin);
    assert_eq!(sessions.get().await.unwrap(), None);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[cfg(feature = "dev-origins")]
#[rstest]
#[case("http://localhost:3000")]
#[case("https://localhost:3000")]
#[tokio::test]
async fn test_dev_origins_accepted_in_dev_builds(#[case] origin: &str) {
    let (sessions, bridge) = setup();
    let outcome = bridge.handle_page_message(origin, handoff_payload()).await;
    assert_eq!(outcome, BridgeOutcome::Stored);
    assert!(sessions.get().await.unwrap().is_some());
}

#[rstest]
#[case(json!({"type": "SOMETHING_ELSE", "session": {}}))]
#[case(json!({"no_type": true}))]
#[case(json!("just a string"))]
#[case(json!({"type": "STASHED_AUTH"}))]
#[tokio::test]
async fn test_unrecognized_payload_is_ignored(#[case] payload: Value) {
    let (sessions, bridge) = setup();
    let mut rx = bridge.subscribe();

    let outcome = bridge.handle_page_message(WEB_APP_ORIGIN, payload).await;

    assert_eq!(outcome, BridgeOutcome::Ignored);
    assert_eq!(sessions.get().await.unwrap(), None);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    // The platform delivers at-least-once; a redelivered handoff
    // overwrites the stored session with the same value.
    let (sessions, bridge) = setup();

    assert_eq!(
        bridge.handle_page_message(WEB_APP_ORIGIN, handoff_payload()).await,
        BridgeOutcome::Stored
    );
    assert_eq!(
        bridge.handle_page_message(WEB_APP_ORIGIN, handoff_payload()).await,
        BridgeOutcome::Stored
    );

    let stored = sessions.get().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "handed-off-access");
}

#[tokio::test]
async fn test_each_subscriber_receives_auth_complete() {
    let (_sessions, bridge) = setup();
    let mut rx1 = bridge.subscribe();
    let mut rx2 = bridge.subscribe();

    bridge.handle_page_message(WEB_APP_ORIGIN, handoff_payload()).await;

    assert_eq!(rx1.try_recv().unwrap(), ExtensionMessage::AuthComplete);
    assert_eq!(rx2.try_recv().unwrap(), ExtensionMessage::AuthComplete);
}
