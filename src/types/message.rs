use serde::{Deserialize, Serialize};

use super::session::Session;

/// Messages posted by a web page into the extension's content script.
///
/// Tagged-union wire format; anything that does not parse as a known
/// variant is dropped by the bridge. The only trusted producer is the
/// web app's auth callback page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PageMessage {
    /// A freshly-issued session handed off after login:
    /// `{"type": "STASHED_AUTH", "session": {...}}`.
    #[serde(rename = "STASHED_AUTH")]
    StashedAuth { session: Session },
}

impl PageMessage {
    /// Builds the handoff message the auth callback page posts.
    pub fn stashed_auth(session: Session) -> Self {
        PageMessage::StashedAuth { session }
    }

    /// The target origin the callback page posts to when it knows the
    /// extension id, instead of broadcasting with a wildcard.
    pub fn extension_target_origin(extension_id: &str) -> String {
        format!("chrome-extension://{}", extension_id)
    }
}

/// Messages broadcast between the extension's own contexts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ExtensionMessage {
    /// Emitted after a session handoff lands in durable storage, so an
    /// open popup can re-render without polling.
    #[serde(rename = "AUTH_COMPLETE")]
    AuthComplete,
}
