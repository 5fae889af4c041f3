//! Content script context for Stashed.
//!
//! Runs inside visited pages; the only page-posted data the extension ever
//! consumes enters through here and is handed straight to the bridge.

use std::sync::Arc;

use serde_json::Value;

use crate::services::session_bridge::{BridgeOutcome, SessionBridge};

/// The page-side listener feeding the session bridge.
pub struct ContentScript {
    bridge: Arc<SessionBridge>,
}

impl ContentScript {
    pub fn new(bridge: Arc<SessionBridge>) -> Self {
        Self { bridge }
    }

    /// Handles one `window.postMessage` delivery: sender origin plus the
    /// raw payload. Validation and storage are the bridge's job.
    pub async fn on_window_message(&self, origin: &str, payload: Value) -> BridgeOutcome {
        self.bridge.handle_page_message(origin, payload).await
    }
}
