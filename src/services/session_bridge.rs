//! Session bridge for Stashed.
//!
//! Moves a freshly-issued session from the authenticated web page into the
//! extension's durable store without letting an untrusted page inject a
//! forged one. The origin allow-list is the sole trust boundary and is the
//! first guard in the handler; everything else is dropped.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::managers::session_store::SessionStore;
use crate::types::message::{ExtensionMessage, PageMessage};

/// Capacity of the internal notification channel. Handoffs are rare; a
/// small buffer only has to absorb redeliveries.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// What the bridge did with one delivered page message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The session was written and `AUTH_COMPLETE` broadcast.
    Stored,
    /// The sender origin is not in the allow-list; message dropped.
    RejectedOrigin,
    /// The payload is not a recognized message; dropped.
    Ignored,
    /// Writing the session failed; logged, not retried — the user must
    /// re-trigger login.
    StoreFailed,
}

/// Receives session handoffs from the web app and notifies the extension's
/// own contexts.
pub struct SessionBridge {
    sessions: Arc<SessionStore>,
    allowed_origins: Vec<String>,
    events: broadcast::Sender<ExtensionMessage>,
}

impl SessionBridge {
    pub fn new(sessions: Arc<SessionStore>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sessions,
            allowed_origins: config.allowed_origins(),
            events,
        }
    }

    /// Subscribes to internal extension messages (`AUTH_COMPLETE`), so an
    /// open popup can re-render without polling.
    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionMessage> {
        self.events.subscribe()
    }

    /// Handles one message posted by a web page.
    ///
    /// Delivery is at-least-once: a redelivered `STASHED_AUTH` overwrites
    /// the stored session with the same value, so repeats are harmless.
    pub async fn handle_page_message(&self, origin: &str, payload: Value) -> BridgeOutcome {
        if !self.allowed_origins.iter().any(|o| o == origin) {
            tracing::warn!(origin, "dropping page message from unauthorized origin");
            return BridgeOutcome::RejectedOrigin;
        }

        let message: PageMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized page message");
                return BridgeOutcome::Ignored;
            }
        };

        match message {
            PageMessage::StashedAuth { session } => {
                match self.sessions.set(session).await {
                    Ok(()) => {
                        // A send error only means no popup is listening.
                        let _ = self.events.send(ExtensionMessage::AuthComplete);
                        tracing::info!("session handoff stored");
                        BridgeOutcome::Stored
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to store handed-off session");
                        BridgeOutcome::StoreFailed
                    }
                }
            }
        }
    }
}
