//! Popup context for Stashed.
//!
//! The popup auto-saves the active tab the moment it opens, so its whole
//! lifecycle is the save status. The states are explicit; rendering them
//! is the UI layer's job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::managers::save_reconciler::SaveReconciler;
use crate::managers::tag_reconciler::TagReconciler;
use crate::services::session_bridge::SessionBridge;
use crate::types::errors::ReconcileError;
use crate::types::message::ExtensionMessage;
use crate::types::save::{PageInfo, SavedItem};

/// What the popup is showing.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupState {
    /// Nothing has happened yet.
    Initializing,
    /// No valid session; the UI navigates to `login_url`.
    NeedsLogin { login_url: String },
    /// Auto-save in flight.
    Saving,
    /// The current tab is saved.
    Saved { item: SavedItem },
    /// Removal in flight.
    Removing,
    /// The save was removed.
    Removed,
    /// An operation failed; the user retries manually.
    Failed { message: String },
}

/// Drives the popup's save/tag flows and state transitions.
pub struct PopupController {
    saves: Arc<SaveReconciler>,
    tags: Arc<TagReconciler>,
    auth_events: broadcast::Receiver<ExtensionMessage>,
    login_url: String,
    state: PopupState,
}

impl PopupController {
    /// Creates a controller for one popup opening. Subscribes to bridge
    /// events immediately so a handoff completing while the popup renders
    /// is not missed.
    pub fn new(
        saves: Arc<SaveReconciler>,
        tags: Arc<TagReconciler>,
        bridge: &SessionBridge,
        config: &Config,
    ) -> Self {
        Self {
            saves,
            tags,
            auth_events: bridge.subscribe(),
            login_url: config.login_url(),
            state: PopupState::Initializing,
        }
    }

    pub fn state(&self) -> &PopupState {
        &self.state
    }

    /// Runs the auto-save for the active tab.
    ///
    /// Reopening the popup on an already-saved page lands in `Saved` with
    /// the same item; `ensure_saved` is idempotent.
    pub async fn open(&mut self, tab: Option<PageInfo>) -> &PopupState {
        let Some(page) = tab else {
            self.state = PopupState::Failed {
                message: "no active tab".to_string(),
            };
            return &self.state;
        };

        self.state = PopupState::Saving;
        self.state = match self.saves.ensure_saved(&page).await {
            Ok(item) => PopupState::Saved { item },
            Err(ReconcileError::Unauthenticated) | Err(ReconcileError::Unauthorized) => {
                PopupState::NeedsLogin {
                    login_url: self.login_url.clone(),
                }
            }
            Err(e) => PopupState::Failed {
                message: e.to_string(),
            },
        };
        &self.state
    }

    /// Removes the save shown by the popup. No-op unless in `Saved`.
    pub async fn remove_current(&mut self) -> &PopupState {
        if let PopupState::Saved { item } = &self.state {
            let save_id = item.id.clone();
            self.state = PopupState::Removing;
            self.state = match self.saves.remove(&save_id).await {
                Ok(()) => PopupState::Removed,
                Err(ReconcileError::Unauthenticated) | Err(ReconcileError::Unauthorized) => {
                    PopupState::NeedsLogin {
                        login_url: self.login_url.clone(),
                    }
                }
                Err(e) => PopupState::Failed {
                    message: e.to_string(),
                },
            };
        }
        &self.state
    }

    /// Applies typed tag input plus toggled existing tags to the save
    /// shown by the popup. No-op unless in `Saved`; the state is left in
    /// `Saved` on success.
    pub async fn apply_tags(&mut self, raw_input: &str, selected_tag_ids: &[String]) -> &PopupState {
        if let PopupState::Saved { item } = &self.state {
            let save_id = item.id.clone();
            match self.tags.apply_tags(&save_id, raw_input, selected_tag_ids).await {
                Ok(()) => {}
                Err(ReconcileError::Unauthenticated) | Err(ReconcileError::Unauthorized) => {
                    self.state = PopupState::NeedsLogin {
                        login_url: self.login_url.clone(),
                    };
                }
                Err(e) => {
                    self.state = PopupState::Failed {
                        message: e.to_string(),
                    };
                }
            }
        }
        &self.state
    }

    /// Waits for a login handoff to complete, bounded so the popup never
    /// hangs on a handoff that never arrives. Returns true when
    /// `AUTH_COMPLETE` was received.
    pub async fn wait_for_auth(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.auth_events.recv()).await {
                Ok(Ok(ExtensionMessage::AuthComplete)) => return true,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return false,
            }
        }
    }
}
