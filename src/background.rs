/// Background context: badge upkeep and backup downloads
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::backup::{Badge, ExportFile};
use crate::errors::StoreError;
use crate::notifier::{Envelope, Message, Notifier};
use crate::storage::{KeyValueStore, StorageChange};
use crate::store::FavoriteStore;

/// What the background did with a runtime message
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Badge(Badge),
    Download(ExportFile),
    /// Change from a content script, to pass on to the other site tabs
    Relay(Envelope),
    Ignored,
}

impl Reply {
    /// Response body sent back to the requesting context
    pub fn to_response(&self) -> Value {
        match self {
            Reply::Badge(badge) => json!({ "success": true, "count": badge.count }),
            Reply::Download(file) => json!({ "success": true, "filename": file.file_name }),
            Reply::Relay(_) => json!({ "success": true }),
            Reply::Ignored => json!({ "success": false }),
        }
    }
}

pub fn error_response(error: &StoreError) -> Value {
    json!({ "success": false, "error": error.to_string() })
}

pub struct BackgroundService<S, N> {
    store: FavoriteStore<S, N>,
}

impl<S: KeyValueStore, N: Notifier> BackgroundService<S, N> {
    pub fn new(store: FavoriteStore<S, N>) -> Self {
        BackgroundService { store }
    }

    pub fn store(&self) -> &FavoriteStore<S, N> {
        &self.store
    }

    /// Badge for what storage holds right now
    pub async fn badge(&self) -> Result<Badge, StoreError> {
        self.store.reload().await?;
        Ok(self.store.badge())
    }

    /// Storage changed somewhere. Returns the new badge when it may differ.
    pub async fn on_storage_change(&self, change: &StorageChange) -> Result<Option<Badge>, StoreError> {
        if !change.affects_badge() {
            return Ok(None);
        }
        self.badge().await.map(Some)
    }

    /// `from_tab` is set when the sender is a content script
    pub async fn on_message(
        &self,
        envelope: &Envelope,
        from_tab: bool,
        at: DateTime<Utc>,
    ) -> Result<Reply, StoreError> {
        match envelope.message {
            Message::UpdateBadge => self.badge().await.map(Reply::Badge),
            Message::SaveToJsonFile => {
                self.store.reload().await?;
                self.store.save_backup().await?;
                let file = self.store.backup_file(at)?;
                log::info!("Prepared backup download {}", file.file_name);
                Ok(Reply::Download(file))
            }
            _ if from_tab && envelope.message.is_change() => Ok(Reply::Relay(envelope.clone())),
            _ => Ok(Reply::Ignored),
        }
    }
}
