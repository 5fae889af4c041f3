//! Property-based tests for durable session persistence.
//!
//! For any token material, a session written by one store instance SHALL
//! be read back identically by a fresh instance over the same database —
//! the restart path every context hits after the browser reopens.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use proptest::prelude::*;

use stashed::database::Database;
use stashed::managers::session_store::SessionStore;
use stashed::services::auth_client::StubAuthClient;
use stashed::types::session::Session;

/// Strategy for token strings as auth providers mint them.
fn arb_token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._-]{8,64}"
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn session_survives_store_restart(
        access_token in arb_token(),
        refresh_token in arb_token(),
        lifetime_ms in 10_000i64..10_000_000i64,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime");

        rt.block_on(async {
            let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
            let auth = Arc::new(StubAuthClient::new("user-1"));

            let session = Session {
                access_token,
                refresh_token,
                expires_at: now_ms() + lifetime_ms,
            };

            let store = SessionStore::new(db.clone(), auth.clone()).unwrap();
            store.set(session.clone()).await.unwrap();

            // A fresh store has no in-memory cache; it must decrypt the
            // durable record.
            let fresh = SessionStore::new(db, auth.clone()).unwrap();
            let loaded = fresh.get().await.unwrap();

            prop_assert_eq!(loaded, Some(session));
            // Unexpired sessions never touch the auth provider.
            prop_assert_eq!(auth.refresh_calls(), 0);
            Ok(())
        })?;
    }

    #[test]
    fn clear_leaves_nothing_behind(
        access_token in arb_token(),
        refresh_token in arb_token(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime");

        rt.block_on(async {
            let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
            let auth = Arc::new(StubAuthClient::new("user-1"));

            let store = SessionStore::new(db.clone(), auth.clone()).unwrap();
            store
                .set(Session {
                    access_token,
                    refresh_token,
                    expires_at: now_ms() + 60_000,
                })
                .await
                .unwrap();
            store.clear().await.unwrap();

            let fresh = SessionStore::new(db, auth).unwrap();
            prop_assert_eq!(fresh.get().await.unwrap(), None);
            Ok(())
        })?;
    }
}
