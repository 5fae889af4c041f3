//! Save reconciler for Stashed.
//!
//! Turns "save this page" into an idempotent write: an existing save for
//! the same user and URL is returned unchanged, a missing one is created
//! exactly once. The existence check and the insert are not transactional
//! from the client's perspective, so two racing callers may still
//! duplicate; callers tolerate eventual rather than immediate dedup.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use crate::managers::session_store::SessionStore;
use crate::services::auth_client::AuthClient;
use crate::services::remote_store::{Filter, Order, RemoteStore};
use crate::types::errors::{AuthError, ReconcileError, RemoteError};
use crate::types::save::{PageInfo, SavePatch, SavedItem};
use crate::types::session::{AuthUser, Session};

const TABLE_SAVES: &str = "saves";

/// Reconciles page saves against the remote store.
pub struct SaveReconciler {
    sessions: Arc<SessionStore>,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthClient>,
}

impl SaveReconciler {
    pub fn new(
        sessions: Arc<SessionStore>,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthClient>,
    ) -> Self {
        Self {
            sessions,
            remote,
            auth,
        }
    }

    /// Returns the user's save for `page.url`, creating it if absent.
    ///
    /// Calling twice with the same URL yields records with the same id;
    /// the second call performs no write.
    pub async fn ensure_saved(&self, page: &PageInfo) -> Result<SavedItem, ReconcileError> {
        let (session, user) = self.authenticated().await?;

        let filter = Filter::new()
            .eq("url", page.url.as_str())
            .eq("user_id", user.id.as_str());
        let existing = match self
            .remote
            .select(&session.access_token, TABLE_SAVES, &filter, None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.remote_failure(e).await),
        };

        if let Some(row) = existing.into_iter().next() {
            return parse_item(row);
        }

        let row = json!({
            "url": page.url,
            "title": page.title,
            "description": page.description,
            "favicon_url": page.favicon_url,
            "og_image_url": page.og_image_url,
            "user_id": user.id,
            "created_at": now_ms(),
        });
        match self
            .remote
            .insert(&session.access_token, TABLE_SAVES, vec![row])
            .await
        {
            Ok(inserted) => {
                tracing::info!(url = %page.url, "created save");
                parse_item(inserted)
            }
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    /// Deletes a save by id. Tag links are not cleaned up here; the store
    /// collaborator owns cascading.
    pub async fn remove(&self, save_id: &str) -> Result<(), ReconcileError> {
        let session = self.session().await?;
        let filter = Filter::new().eq("id", save_id);
        match self
            .remote
            .delete(&session.access_token, TABLE_SAVES, &filter)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    /// All of the user's saves, newest first.
    pub async fn list_saves(&self) -> Result<Vec<SavedItem>, ReconcileError> {
        let (session, user) = self.authenticated().await?;
        let filter = Filter::new().eq("user_id", user.id.as_str());
        let order = Order::desc("created_at");
        let rows = match self
            .remote
            .select(&session.access_token, TABLE_SAVES, &filter, Some(&order))
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        rows.into_iter().map(parse_item).collect()
    }

    /// Applies a partial update (title, description, archive/favorite
    /// flags) to an existing save. Last write wins.
    pub async fn update_save(
        &self,
        save_id: &str,
        patch: &SavePatch,
    ) -> Result<SavedItem, ReconcileError> {
        let session = self.session().await?;
        let fields = serde_json::to_value(patch)
            .map_err(|e| ReconcileError::InvalidRecord(e.to_string()))?;
        match self
            .remote
            .update(&session.access_token, TABLE_SAVES, save_id, fields)
            .await
        {
            Ok(updated) => parse_item(updated),
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    /// The current session, or `Unauthenticated` when absent.
    async fn session(&self) -> Result<Session, ReconcileError> {
        match self.sessions.get().await? {
            Some(session) => Ok(session),
            None => Err(ReconcileError::Unauthenticated),
        }
    }

    /// The current session plus the identity it belongs to.
    async fn authenticated(&self) -> Result<(Session, AuthUser), ReconcileError> {
        let session = self.session().await?;
        let user = match self.auth.current_user(&session.access_token).await {
            Ok(user) => user,
            Err(AuthError::InvalidAccessToken) => return Err(ReconcileError::Unauthenticated),
            Err(e) => return Err(ReconcileError::RemoteFailure(e.to_string())),
        };
        Ok((session, user))
    }

    /// Maps a remote failure, clearing the session on 401 so the UI
    /// boundary redirects to login. The operation is not retried.
    async fn remote_failure(&self, e: RemoteError) -> ReconcileError {
        match e {
            RemoteError::Unauthorized => {
                tracing::warn!("remote store rejected the session; clearing it");
                if let Err(clear_err) = self.sessions.clear().await {
                    tracing::error!(error = %clear_err, "failed to clear rejected session");
                }
                ReconcileError::Unauthorized
            }
            other => ReconcileError::RemoteFailure(other.to_string()),
        }
    }
}

fn parse_item(row: serde_json::Value) -> Result<SavedItem, ReconcileError> {
    serde_json::from_value(row).map_err(|e| ReconcileError::InvalidRecord(e.to_string()))
}

/// Current UNIX timestamp in milliseconds.
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
