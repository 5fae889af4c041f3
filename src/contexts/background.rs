//! Background worker context for Stashed.
//!
//! Handles the "Save to Stashed" context-menu command. Saves go through
//! the reconciler like every other path, so a background save and an open
//! popup racing on the same page stay idempotent.

use std::sync::Arc;

use crate::managers::save_reconciler::SaveReconciler;
use crate::types::errors::ReconcileError;
use crate::types::save::{PageInfo, SavedItem};

/// The extension's background worker.
pub struct Background {
    saves: Arc<SaveReconciler>,
}

impl Background {
    pub fn new(saves: Arc<SaveReconciler>) -> Self {
        Self { saves }
    }

    /// Saves the page the context menu was invoked on.
    pub async fn handle_save_command(&self, page: PageInfo) -> Result<SavedItem, ReconcileError> {
        match self.saves.ensure_saved(&page).await {
            Ok(item) => {
                tracing::info!(url = %item.url, "background save complete");
                Ok(item)
            }
            Err(e) => {
                tracing::warn!(url = %page.url, error = %e, "background save failed");
                Err(e)
            }
        }
    }
}
