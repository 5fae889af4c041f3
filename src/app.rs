//! App core for Stashed.
//!
//! Central struct holding the shared components, constructed explicitly
//! and injected into each context's entry point — there is no implicit
//! global session manager. Collaborators are trait objects so a test or a
//! different backend can substitute them at the seam.

use std::sync::Arc;

use crate::config::Config;
use crate::contexts::background::Background;
use crate::contexts::content_script::ContentScript;
use crate::contexts::popup::PopupController;
use crate::database::Database;
use crate::managers::save_reconciler::SaveReconciler;
use crate::managers::session_store::SessionStore;
use crate::managers::tag_reconciler::TagReconciler;
use crate::services::auth_client::{AuthClient, HttpAuthClient};
use crate::services::remote_store::{HttpRemoteStore, RemoteStore};
use crate::services::session_bridge::SessionBridge;

/// Shared components behind every context.
pub struct App {
    pub config: Config,
    pub db: Arc<Database>,
    pub sessions: Arc<SessionStore>,
    pub bridge: Arc<SessionBridge>,
    pub saves: Arc<SaveReconciler>,
    pub tags: Arc<TagReconciler>,
}

impl App {
    /// Creates an App wired against the real HTTP collaborators, with
    /// local storage at `db_path`.
    pub fn new(config: Config, db_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(Database::open(db_path)?);
        let remote: Arc<dyn RemoteStore> =
            Arc::new(HttpRemoteStore::new(&config.api_url, &config.api_key));
        let auth: Arc<dyn AuthClient> =
            Arc::new(HttpAuthClient::new(&config.api_url, &config.api_key));
        Self::with_collaborators(config, db, remote, auth)
    }

    /// Creates an App with explicit collaborators. This is the injection
    /// seam tests and alternative backends use.
    pub fn with_collaborators(
        config: Config,
        db: Arc<Database>,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthClient>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let sessions = Arc::new(
            SessionStore::new(db.clone(), auth.clone())
                .map_err(|e| format!("SessionStore init failed: {}", e))?,
        );
        let bridge = Arc::new(SessionBridge::new(sessions.clone(), &config));
        let saves = Arc::new(SaveReconciler::new(
            sessions.clone(),
            remote.clone(),
            auth.clone(),
        ));
        let tags = Arc::new(TagReconciler::new(sessions.clone(), remote, auth));

        Ok(Self {
            config,
            db,
            sessions,
            bridge,
            saves,
            tags,
        })
    }

    /// Entry point for a content script instance.
    pub fn content_script(&self) -> ContentScript {
        ContentScript::new(self.bridge.clone())
    }

    /// Entry point for the background worker.
    pub fn background(&self) -> Background {
        Background::new(self.saves.clone())
    }

    /// Entry point for one popup opening.
    pub fn popup(&self) -> PopupController {
        PopupController::new(
            self.saves.clone(),
            self.tags.clone(),
            &self.bridge,
            &self.config,
        )
    }
}
