//! Tag reconciler for Stashed.
//!
//! Resolves free-text tag input against the user's existing tags, creates
//! what's missing while tolerating concurrent creates, and links tags to
//! saves through a single ownership-filtered path. Links are upserted on
//! `(save_id, tag_id)` so every step is safe to repeat.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::managers::session_store::SessionStore;
use crate::services::auth_client::AuthClient;
use crate::services::remote_store::{Filter, Order, RemoteStore};
use crate::types::errors::{AuthError, ReconcileError, RemoteError};
use crate::types::session::{AuthUser, Session};
use crate::types::tag::{SaveTagLink, Tag};

const TABLE_TAGS: &str = "tags";
const TABLE_LINKS: &str = "saves_tags";
const TABLE_SAVES: &str = "saves";

/// Splits free-text tag input into candidate names.
///
/// Tokens are separated by commas and whitespace, trimmed, and
/// deduplicated case-insensitively keeping the first occurrence's
/// spelling. `"work, Work travel"` yields `["work", "travel"]`.
pub fn parse_tag_input(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            names.push(trimmed.to_string());
        }
    }
    names
}

/// Reconciles tags and save↔tag links against the remote store.
pub struct TagReconciler {
    sessions: Arc<SessionStore>,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthClient>,
}

impl TagReconciler {
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

    /// Applies typed tag input plus UI-selected existing tags to a save.
    ///
    /// Candidate names matching an existing tag (case-sensitive exact
    /// match) reuse its id; the rest are created. A creation conflict —
    /// the same name racing in from another caller — is skipped rather
    /// than surfaced: the tag exists regardless of who created it. The
    /// resulting ids are unioned with `selected_tag_ids` and linked
    /// through the ownership-filtered link path.
    pub async fn apply_tags(
        &self,
        save_id: &str,
        raw_input: &str,
        selected_tag_ids: &[String],
    ) -> Result<(), ReconcileError> {
        let (session, user) = self.authenticated().await?;

        let existing: HashMap<String, String> = self
            .fetch_tags(&session, &user)
            .await?
            .into_iter()
            .map(|tag| (tag.name, tag.id))
            .collect();

        let mut link_ids: Vec<String> = Vec::new();
        for name in parse_tag_input(raw_input) {
            if let Some(id) = existing.get(&name) {
                link_ids.push(id.clone());
                continue;
            }
            let row = json!({ "name": name, "user_id": user.id });
            match self
                .remote
                .insert(&session.access_token, TABLE_TAGS, vec![row])
                .await
            {
                Ok(created) => link_ids.push(parse_tag(created)?.id),
                Err(RemoteError::Conflict(message)) => {
                    // Lost a creation race; the tag exists regardless of
                    // which caller created it.
                    tracing::debug!(name = %name, message = %message, "tag create conflict ignored");
                }
                Err(e) => return Err(self.remote_failure(e).await),
            }
        }

        for id in selected_tag_ids {
            if !link_ids.contains(id) {
                link_ids.push(id.clone());
            }
        }

        let pairs = link_ids
            .into_iter()
            .map(|tag_id| SaveTagLink::new(save_id, tag_id))
            .collect();
        self.link_pairs(&session, &user, pairs).await
    }

    /// Upserts a batch of save↔tag links for the current user.
    ///
    /// Every link-creating path goes through here, and through the
    /// ownership filter: pairs whose save belongs to another user are
    /// dropped, because the link call is authorized only by the caller's
    /// identity, not by a server-enforced join.
    pub async fn link_tags(&self, pairs: Vec<SaveTagLink>) -> Result<(), ReconcileError> {
        let (session, user) = self.authenticated().await?;
        self.link_pairs(&session, &user, pairs).await
    }

    async fn link_pairs(
        &self,
        session: &Session,
        user: &AuthUser,
        pairs: Vec<SaveTagLink>,
    ) -> Result<(), ReconcileError> {
        if pairs.is_empty() {
            return Ok(());
        }

        let save_ids: Vec<Value> = pairs
            .iter()
            .map(|p| p.save_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .map(Value::String)
            .collect();
        let filter = Filter::new().is_in("id", save_ids);
        let saves = match self
            .remote
            .select(&session.access_token, TABLE_SAVES, &filter, None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.remote_failure(e).await),
        };

        let owned: HashSet<&str> = saves
            .iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(user.id.as_str()))
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .collect();

        let total = pairs.len();
        let allowed: Vec<SaveTagLink> = pairs
            .into_iter()
            .filter(|p| owned.contains(p.save_id.as_str()))
            .collect();
        if allowed.len() < total {
            tracing::warn!(
                dropped = total - allowed.len(),
                "dropped tag links targeting saves not owned by the current user"
            );
        }
        if allowed.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = allowed
            .iter()
            .map(|p| json!({ "save_id": p.save_id, "tag_id": p.tag_id }))
            .collect();
        match self
            .remote
            .upsert(
                &session.access_token,
                TABLE_LINKS,
                rows,
                &["save_id", "tag_id"],
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    /// Removes the given tags from a save. No ownership re-check: deletion
    /// is already scoped by a save id from the caller's own query context.
    pub async fn remove_tags(
        &self,
        save_id: &str,
        tag_ids: &[String],
    ) -> Result<(), ReconcileError> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let session = self.session().await?;
        let filter = Filter::new().eq("save_id", save_id).is_in(
            "tag_id",
            tag_ids.iter().cloned().map(Value::String).collect(),
        );
        match self
            .remote
            .delete(&session.access_token, TABLE_LINKS, &filter)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    /// The tags linked to a save: link rows first, then the tag records —
    /// the store contract has no join primitive.
    pub async fn tags_for(&self, save_id: &str) -> Result<Vec<Tag>, ReconcileError> {
        let session = self.session().await?;

        let filter = Filter::new().eq("save_id", save_id);
        let links = match self
            .remote
            .select(&session.access_token, TABLE_LINKS, &filter, None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        let tag_ids: Vec<Value> = links
            .iter()
            .filter_map(|row| row.get("tag_id").cloned())
            .collect();
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new().is_in("id", tag_ids);
        let rows = match self
            .remote
            .select(&session.access_token, TABLE_TAGS, &filter, None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        rows.into_iter().map(parse_tag).collect()
    }

    /// All of the user's tags, sorted by name.
    pub async fn list_tags(&self) -> Result<Vec<Tag>, ReconcileError> {
        let (session, user) = self.authenticated().await?;
        self.fetch_tags(&session, &user).await
    }

    /// Creates a tag. A duplicate name surfaces as `RemoteFailure` here;
    /// only the apply path treats conflicts as non-fatal.
    pub async fn create_tag(&self, name: &str) -> Result<Tag, ReconcileError> {
        let (session, user) = self.authenticated().await?;
        let row = json!({ "name": name, "user_id": user.id });
        match self
            .remote
            .insert(&session.access_token, TABLE_TAGS, vec![row])
            .await
        {
            Ok(created) => parse_tag(created),
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    /// Deletes a tag by id.
    pub async fn delete_tag(&self, tag_id: &str) -> Result<(), ReconcileError> {
        let session = self.session().await?;
        let filter = Filter::new().eq("id", tag_id);
        match self
            .remote
            .delete(&session.access_token, TABLE_TAGS, &filter)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.remote_failure(e).await),
        }
    }

    async fn fetch_tags(
        &self,
        session: &Session,
        user: &AuthUser,
    ) -> Result<Vec<Tag>, ReconcileError> {
        let filter = Filter::new().eq("user_id", user.id.as_str());
        let order = Order::asc("name");
        let rows = match self
            .remote
            .select(&session.access_token, TABLE_TAGS, &filter, Some(&order))
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Err(self.remote_failure(e).await),
        };
        rows.into_iter().map(parse_tag).collect()
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

fn parse_tag(row: Value) -> Result<Tag, ReconcileError> {
    serde_json::from_value(row).map_err(|e| ReconcileError::InvalidRecord(e.to_string()))
}
