use serde::{Deserialize, Serialize};

/// A user-defined tag. `name` is unique per user; tags are created on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// A save↔tag association, unique per `(save_id, tag_id)`.
///
/// Links are written via upsert-on-conflict so repeated linking is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SaveTagLink {
    pub save_id: String,
    pub tag_id: String,
}

impl SaveTagLink {
    pub fn new(save_id: impl Into<String>, tag_id: impl Into<String>) -> Self {
        Self {
            save_id: save_id.into(),
            tag_id: tag_id.into(),
        }
    }
}
