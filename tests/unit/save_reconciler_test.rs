//! Unit tests for the SaveReconciler — idempotent saves, removal, listing,
//! partial updates, and session invalidation on 401.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use stashed::database::Database;
use stashed::managers::save_reconciler::SaveReconciler;
use stashed::managers::session_store::SessionStore;
use stashed::services::auth_client::StubAuthClient;
use stashed::services::remote_store::InMemoryRemoteStore;
use stashed::types::errors::ReconcileError;
use stashed::types::save::{PageInfo, SavePatch};
use stashed::types::session::Session;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

struct Fixture {
    sessions: Arc<SessionStore>,
    remote: Arc<InMemoryRemoteStore>,
    saves: SaveReconciler,
}

/// Helper: a reconciler for `user-1` over a fresh in-memory store.
fn setup() -> Fixture {
    let db = Arc::new(Database::open_in_memory().expect("Failed to open in-memory database"));
    let auth = Arc::new(StubAuthClient::new("user-1"));
    let sessions =
        Arc::new(SessionStore::new(db, auth.clone()).expect("SessionStore init failed"));
    let remote = Arc::new(InMemoryRemoteStore::new());
    let saves = SaveReconciler::new(sessions.clone(), remote.clone(), auth);
    Fixture {
        sessions,
        remote,
        saves,
    }
}

async fn sign_in(fixture: &Fixture) {
    fixture
        .sessions
        .set(Session {
            access_token: "token-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: now_ms() + 3_600_000,
        })
        .await
        .unwrap();
}

fn page(url: &str) -> PageInfo {
    PageInfo::new(url, "Example Page")
}

#[tokio::test]
async fn test_ensure_saved_creates_once_and_returns_same_id() {
    let fx = setup();
    sign_in(&fx).await;

    let first = fx.saves.ensure_saved(&page("https://example.com/a")).await.unwrap();
    let second = fx.saves.ensure_saved(&page("https://example.com/a")).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(fx.remote.rows("saves").len(), 1);
}

#[tokio::test]
async fn test_ensure_saved_stamps_owner_and_metadata() {
    let fx = setup();
    sign_in(&fx).await;

    let mut info = page("https://example.com/article");
    info.description = Some("An article".to_string());
    info.favicon_url = Some("https://example.com/favicon.ico".to_string());

    let item = fx.saves.ensure_saved(&info).await.unwrap();
    assert_eq!(item.url, "https://example.com/article");
    assert_eq!(item.title, "Example Page");
    assert_eq!(item.description.as_deref(), Some("An article"));
    assert_eq!(item.user_id, "user-1");
    assert!(item.created_at > 0);
    assert!(!item.id.is_empty());
}

#[tokio::test]
async fn test_ensure_saved_without_session_is_unauthenticated() {
    let fx = setup();
    let err = fx.saves.ensure_saved(&page("https://example.com")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Unauthenticated));
    assert!(fx.remote.rows("saves").is_empty());
}

#[tokio::test]
async fn test_ensure_saved_ignores_other_users_save_for_same_url() {
    let fx = setup();
    sign_in(&fx).await;
    fx.remote.seed(
        "saves",
        json!({
            "url": "https://example.com/shared",
            "title": "Someone else's",
            "created_at": 1,
            "user_id": "user-2",
        }),
    );

    let item = fx.saves.ensure_saved(&page("https://example.com/shared")).await.unwrap();
    assert_eq!(item.user_id, "user-1");
    assert_eq!(fx.remote.rows("saves").len(), 2);
}

#[tokio::test]
async fn test_remove_deletes_the_save() {
    let fx = setup();
    sign_in(&fx).await;

    let item = fx.saves.ensure_saved(&page("https://example.com")).await.unwrap();
    fx.saves.remove(&item.id).await.unwrap();
    assert!(fx.remote.rows("saves").is_empty());
}

#[tokio::test]
async fn test_list_saves_returns_newest_first() {
    let fx = setup();
    sign_in(&fx).await;
    fx.remote.seed(
        "saves",
        json!({"url": "https://a.example", "title": "A", "created_at": 1_000, "user_id": "user-1"}),
    );
    fx.remote.seed(
        "saves",
        json!({"url": "https://b.example", "title": "B", "created_at": 2_000, "user_id": "user-1"}),
    );
    fx.remote.seed(
        "saves",
        json!({"url": "https://c.example", "title": "C", "created_at": 3_000, "user_id": "user-2"}),
    );

    let items = fx.saves.list_saves().await.unwrap();
    let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://b.example", "https://a.example"]);
}

#[tokio::test]
async fn test_update_save_applies_partial_patch() {
    let fx = setup();
    sign_in(&fx).await;

    let item = fx.saves.ensure_saved(&page("https://example.com")).await.unwrap();
    let patch = SavePatch {
        is_favorite: Some(true),
        ..SavePatch::default()
    };
    let updated = fx.saves.update_save(&item.id, &patch).await.unwrap();

    assert_eq!(updated.is_favorite, Some(true));
    assert_eq!(updated.title, item.title);
    assert_eq!(updated.id, item.id);
}

#[tokio::test]
async fn test_remote_401_clears_session_and_surfaces_unauthorized() {
    let fx = setup();
    sign_in(&fx).await;
    // The store stops honoring the cached token, as after a server-side
    // revocation.
    fx.remote.require_token("some-other-token");

    let err = fx.saves.ensure_saved(&page("https://example.com")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Unauthorized));

    // The session is gone; the next attempt asks for login instead.
    let err = fx.saves.ensure_saved(&page("https://example.com")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Unauthenticated));
}
