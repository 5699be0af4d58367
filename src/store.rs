/// Favorite store: the per-context owner of favorites and settings
///
/// Every context (popup, background, each content script) builds its own
/// store at start-up. The store keeps an in-memory copy, writes through to
/// the shared key-value store and tells the other contexts about committed
/// changes. Borrows of the in-memory state are never held across an await.
use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::backup::{
    BACKUP_FILE_PREFIX, BackupSnapshot, Badge, ExportFile, GLOBAL_EXPORT_PREFIX, ImportDocument,
    StoredBackup, dedupe_and_truncate, export_file_name, favorites_from_backup,
    kind_export_file_name,
};
use crate::errors::{StorageError, StoreError};
use crate::favorites::{FavoriteKind, FavoriteRecord, Favorites, move_item};
use crate::notifier::{Envelope, Message, Notifier, broadcast_best_effort};
use crate::page::DEFAULT_ORIGIN;
use crate::search::{extract_search_name, normalize_search_url, tag_url};
use crate::settings::Settings;
use crate::storage::{
    KeyValueStore, LAST_BACKUP_KEY, SETTINGS_KEY, StorageRecord, favorites_from_record,
    favorites_keys, favorites_to_record, records_to_value,
};

/// Addresses one favorite in a list
#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteRef {
    Name(String),
    Index(usize),
}

impl From<&str> for FavoriteRef {
    fn from(name: &str) -> Self {
        FavoriteRef::Name(name.to_string())
    }
}

impl From<usize> for FavoriteRef {
    fn from(index: usize) -> Self {
        FavoriteRef::Index(index)
    }
}

/// Result of a heart click
#[derive(Debug, Clone, PartialEq)]
pub enum Toggled {
    Added(FavoriteRecord),
    Removed(FavoriteRecord),
}

impl Toggled {
    pub fn is_favorite(&self) -> bool {
        matches!(self, Toggled::Added(_))
    }
}

/// Records kept per kind by a global import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportCounts {
    pub artist: usize,
    pub tag: usize,
    pub search: usize,
    pub settings_merged: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    favorites: Favorites,
    settings: Settings,
}

pub struct FavoriteStore<S, N> {
    storage: S,
    notifier: N,
    context: Uuid,
    origin: String,
    state: RefCell<StoreState>,
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl<S: KeyValueStore, N: Notifier> FavoriteStore<S, N> {
    pub fn new(storage: S, notifier: N) -> Self {
        FavoriteStore {
            storage,
            notifier,
            context: Uuid::new_v4(),
            origin: DEFAULT_ORIGIN.to_string(),
            state: RefCell::new(StoreState::default()),
        }
    }

    /// Site origin used when deriving tag and artist URLs
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    pub fn context_id(&self) -> Uuid {
        self.context
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    // === Reads ===

    pub fn get(&self, kind: FavoriteKind) -> Vec<FavoriteRecord> {
        self.state.borrow().favorites.list(kind).clone()
    }

    pub fn favorites(&self) -> Favorites {
        self.state.borrow().favorites.clone()
    }

    pub fn settings(&self) -> Settings {
        self.state.borrow().settings.clone()
    }

    pub fn is_favorite(&self, kind: FavoriteKind, name: &str) -> bool {
        self.state.borrow().favorites.contains(kind, name.trim())
    }

    /// Whether the search shown at `page_url` is a favorite
    pub fn is_search_favorited(&self, page_url: &str) -> bool {
        normalize_search_url(page_url)
            .map(|canonical| {
                self.state
                    .borrow()
                    .favorites
                    .position_by_url(FavoriteKind::Search, &canonical)
                    .is_some()
            })
            .unwrap_or(false)
    }

    pub fn badge(&self) -> Badge {
        let state = self.state.borrow();
        Badge::new(&state.favorites, &state.settings)
    }

    pub fn snapshot(&self, at: DateTime<Utc>) -> BackupSnapshot {
        let state = self.state.borrow();
        BackupSnapshot::new(&state.favorites, &state.settings, at)
    }

    // === Loading ===

    /// Cold start: settings, then favorites (with backup fallback)
    pub async fn load(&self) -> Result<(), StoreError> {
        self.load_settings().await?;
        self.load_favorites().await?;
        Ok(())
    }

    /// Re-read settings and favorites after a change elsewhere. Never restores.
    pub async fn reload(&self) -> Result<(), StoreError> {
        self.load_settings().await?;
        self.read_favorites().await?;
        Ok(())
    }

    pub async fn load_settings(&self) -> Result<Settings, StoreError> {
        let record = self.storage.get(&[SETTINGS_KEY]).await?;
        let settings = Settings::from_value(record.get(SETTINGS_KEY));
        self.state.borrow_mut().settings = settings.clone();
        Ok(settings)
    }

    /// Re-read the favorites from storage as they are. Never restores.
    pub async fn read_favorites(&self) -> Result<Favorites, StoreError> {
        let record = self.storage.get(&favorites_keys()).await?;
        let favorites = favorites_from_record(&record);
        self.state.borrow_mut().favorites = favorites.clone();
        Ok(favorites)
    }

    /// Read the favorites for a cold start.
    ///
    /// When storage holds no favorites of any kind, the last backup snapshot is
    /// restored and written back to storage.
    pub async fn load_favorites(&self) -> Result<Favorites, StoreError> {
        let mut favorites = self.read_favorites().await?;

        if favorites.is_empty() {
            let backup = self.storage.get(&[LAST_BACKUP_KEY]).await?;
            if let Some(restored) = favorites_from_backup(backup.get(LAST_BACKUP_KEY)) {
                if !restored.is_empty() {
                    log::info!("Restoring {} favorites from last backup", restored.total());
                    self.storage.set(favorites_to_record(&restored)?).await?;
                }
                favorites = restored;
            }
        }

        self.state.borrow_mut().favorites = favorites.clone();
        Ok(favorites)
    }

    /// Apply settings received from another context without persisting them
    pub fn apply_settings(&self, settings: Settings) {
        self.state.borrow_mut().settings = settings;
    }

    // === Mutations ===

    /// Add a tag, artist or search by name
    pub async fn add(&self, kind: FavoriteKind, name: &str) -> Result<FavoriteRecord, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let record = FavoriteRecord::new(
            name.to_string(),
            tag_url(&self.origin, name),
            now().timestamp_millis(),
        );
        self.insert(kind, record).await
    }

    async fn insert(
        &self,
        kind: FavoriteKind,
        record: FavoriteRecord,
    ) -> Result<FavoriteRecord, StoreError> {
        {
            let mut state = self.state.borrow_mut();
            let limit = state.settings.favorites_limit;
            let list = state.favorites.list_mut(kind);

            let duplicate = list.iter().any(|existing| {
                existing.matches_name(&record.name)
                    || (kind == FavoriteKind::Search && existing.url == record.url)
            });
            if duplicate {
                return Err(StoreError::Duplicate {
                    kind,
                    name: record.name,
                });
            }
            if list.len() >= limit {
                return Err(StoreError::LimitExceeded { kind, limit });
            }

            list.push(record.clone());
        }

        self.commit(kind, Message::FavoritesUpdated { kind: Some(kind) })
            .await?;
        Ok(record)
    }

    pub async fn remove(
        &self,
        kind: FavoriteKind,
        target: impl Into<FavoriteRef>,
    ) -> Result<FavoriteRecord, StoreError> {
        let target = target.into();
        let removed = {
            let mut state = self.state.borrow_mut();
            let index = resolve(&state.favorites, kind, &target)?;
            state.favorites.list_mut(kind).remove(index)
        };

        self.commit(
            kind,
            Message::FavoriteRemoved {
                kind,
                name: removed.name.clone(),
            },
        )
        .await?;
        Ok(removed)
    }

    /// Heart click on a tag or artist: add when absent, remove when present
    pub async fn toggle(&self, kind: FavoriteKind, name: &str) -> Result<Toggled, StoreError> {
        if self.is_favorite(kind, name) {
            self.remove(kind, name.trim()).await.map(Toggled::Removed)
        } else {
            self.add(kind, name).await.map(Toggled::Added)
        }
    }

    /// Heart click on the search bar of `page_url`
    pub async fn toggle_search(&self, page_url: &str) -> Result<Toggled, StoreError> {
        let canonical = normalize_search_url(page_url).ok_or(StoreError::NoActiveSearch)?;
        let name = extract_search_name(page_url).ok_or(StoreError::NoActiveSearch)?;

        // another context may have changed the list since this page loaded
        self.read_favorites().await?;

        let existing = self
            .state
            .borrow()
            .favorites
            .position_by_url(FavoriteKind::Search, &canonical);
        match existing {
            Some(index) => self
                .remove(FavoriteKind::Search, index)
                .await
                .map(Toggled::Removed),
            None => {
                let record = FavoriteRecord::new(name, canonical, now().timestamp_millis());
                self.insert(FavoriteKind::Search, record)
                    .await
                    .map(Toggled::Added)
            }
        }
    }

    /// Count a followed link. Persisted without notification or backup.
    pub async fn touch(
        &self,
        kind: FavoriteKind,
        target: impl Into<FavoriteRef>,
    ) -> Result<u64, StoreError> {
        let target = target.into();
        let (frequency, list) = {
            let mut state = self.state.borrow_mut();
            let index = resolve(&state.favorites, kind, &target)?;
            let list = state.favorites.list_mut(kind);
            list[index].frequency += 1;
            (list[index].frequency, list.clone())
        };

        let mut items = StorageRecord::new();
        items.insert(kind.storage_key().to_string(), records_to_value(&list)?);
        self.storage.set(items).await?;
        Ok(frequency)
    }

    /// Move a favorite within its list
    pub async fn reorder(&self, kind: FavoriteKind, from: usize, to: usize) -> Result<(), StoreError> {
        if from == to {
            return resolve(&self.state.borrow().favorites, kind, &FavoriteRef::Index(from)).map(|_| ());
        }

        {
            let mut state = self.state.borrow_mut();
            let list = state.favorites.list_mut(kind);
            if !move_item(list, from, to) {
                let bad = if from >= list.len() { from } else { to };
                return Err(StoreError::NotFound {
                    kind,
                    name: format!("position {}", bad),
                });
            }
        }

        self.commit(kind, Message::FavoritesUpdated { kind: Some(kind) })
            .await
    }

    /// Replace every list with the contents of an import file
    pub async fn import_all(&self, text: &str) -> Result<ImportCounts, StoreError> {
        let ImportDocument::Full { favorites, settings } = ImportDocument::parse(text)? else {
            return Err(StoreError::ImportFormat(
                "expected an object with artist, tag and search lists".to_string(),
            ));
        };

        let current = self.settings();
        let limit = current.favorites_limit;
        let mut imported = Favorites::new();
        for kind in FavoriteKind::ALL {
            *imported.list_mut(kind) = dedupe_and_truncate(favorites.list(kind).clone(), limit);
        }
        let merged = settings.map(|patch| current.merged_lenient(&patch));

        let mut items = favorites_to_record(&imported)?;
        if let Some(merged) = &merged {
            items.insert(SETTINGS_KEY.to_string(), settings_value(merged)?);
        }
        self.write_verified(items).await?;

        let counts = ImportCounts {
            artist: imported.artist.len(),
            tag: imported.tag.len(),
            search: imported.search.len(),
            settings_merged: merged.is_some(),
        };
        {
            let mut state = self.state.borrow_mut();
            state.favorites = imported;
            if let Some(merged) = merged.clone() {
                state.settings = merged;
            }
        }
        log::info!("Imported favorites: {:?}", counts);

        self.backup_best_effort().await;
        self.announce(Message::FavoritesUpdated { kind: None }).await;
        if let Some(settings) = merged {
            self.announce(Message::SettingsUpdated { settings }).await;
        }
        Ok(counts)
    }

    /// Append a bare array of records to one list, up to the remaining capacity.
    /// Names already present are skipped. Returns the number added.
    pub async fn import_kind(&self, kind: FavoriteKind, text: &str) -> Result<usize, StoreError> {
        let ImportDocument::Single(records) = ImportDocument::parse(text)? else {
            return Err(StoreError::ImportFormat("expected an array of favorites".to_string()));
        };

        let added = {
            let mut state = self.state.borrow_mut();
            let limit = state.settings.favorites_limit;
            let list = state.favorites.list_mut(kind);
            let mut added = 0;
            for record in records {
                if list.len() >= limit {
                    break;
                }
                if list.iter().any(|existing| existing.matches_name(&record.name)) {
                    continue;
                }
                list.push(record);
                added += 1;
            }
            added
        };

        if added > 0 {
            self.commit(kind, Message::FavoritesUpdated { kind: Some(kind) })
                .await?;
        }
        Ok(added)
    }

    pub fn export_kind(&self, kind: FavoriteKind) -> Result<ExportFile, StoreError> {
        let contents = serde_json::to_string_pretty(self.state.borrow().favorites.list(kind))
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(ExportFile {
            file_name: kind_export_file_name(kind),
            contents,
        })
    }

    pub fn export_all(&self, at: DateTime<Utc>) -> Result<ExportFile, StoreError> {
        Ok(ExportFile {
            file_name: export_file_name(GLOBAL_EXPORT_PREFIX, at),
            contents: self.snapshot(at).to_pretty_json()?,
        })
    }

    /// Backup file offered for download by the background context
    pub fn backup_file(&self, at: DateTime<Utc>) -> Result<ExportFile, StoreError> {
        Ok(ExportFile {
            file_name: export_file_name(BACKUP_FILE_PREFIX, at),
            contents: self.snapshot(at).to_pretty_json()?,
        })
    }

    /// Write the rolling recovery point to `last_backup`
    pub async fn save_backup(&self) -> Result<(), StoreError> {
        let at = now();
        let stored = StoredBackup::new(self.snapshot(at), at);
        let value = serde_json::to_value(&stored).map_err(|e| StorageError::Malformed {
            key: LAST_BACKUP_KEY.to_string(),
            message: e.to_string(),
        })?;

        let mut items = StorageRecord::new();
        items.insert(LAST_BACKUP_KEY.to_string(), value);
        self.storage.set(items).await?;
        Ok(())
    }

    // === Settings ===

    pub async fn update_setting(&self, key: &str, value: Value) -> Result<Settings, StoreError> {
        let updated = self.settings().with_setting(key, value)?;
        self.replace_settings(updated).await
    }

    pub async fn reset_settings(&self) -> Result<Settings, StoreError> {
        self.replace_settings(Settings::default()).await
    }

    pub async fn replace_settings(&self, settings: Settings) -> Result<Settings, StoreError> {
        let mut items = StorageRecord::new();
        items.insert(SETTINGS_KEY.to_string(), settings_value(&settings)?);
        self.write_verified(items).await?;

        self.state.borrow_mut().settings = settings.clone();
        self.announce(Message::SettingsUpdated {
            settings: settings.clone(),
        })
        .await;
        Ok(settings)
    }

    // === Internals ===

    /// Persist one list, refresh the backup and notify the other contexts
    async fn commit(&self, kind: FavoriteKind, message: Message) -> Result<(), StoreError> {
        let list = self.get(kind);
        let mut items = StorageRecord::new();
        items.insert(kind.storage_key().to_string(), records_to_value(&list)?);
        self.write_verified(items).await?;

        self.backup_best_effort().await;
        self.announce(message).await;
        Ok(())
    }

    /// Write, then read back and compare every key
    async fn write_verified(&self, items: StorageRecord) -> Result<(), StoreError> {
        let keys: Vec<String> = items.keys().cloned().collect();
        self.storage.set(items.clone()).await.map_err(|e| {
            log::error!("Save error: {}", e);
            StoreError::from(e)
        })?;

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let stored = self.storage.get(&key_refs).await?;
        for key in &keys {
            if stored.get(key) != items.get(key) {
                log::error!("Save verification failed for {}", key);
                return Err(StoreError::Persistence(format!(
                    "verification failed for {}",
                    key
                )));
            }
        }
        Ok(())
    }

    async fn backup_best_effort(&self) {
        if let Err(e) = self.save_backup().await {
            log::warn!("Backup snapshot not written: {}", e);
        }
    }

    async fn announce(&self, message: Message) {
        broadcast_best_effort(&self.notifier, Envelope::new(message, self.context)).await;
    }
}

fn resolve(favorites: &Favorites, kind: FavoriteKind, target: &FavoriteRef) -> Result<usize, StoreError> {
    let index = match target {
        FavoriteRef::Name(name) => favorites.position(kind, name),
        FavoriteRef::Index(index) => Some(*index).filter(|i| *i < favorites.list(kind).len()),
    };
    index.ok_or_else(|| StoreError::NotFound {
        kind,
        name: match target {
            FavoriteRef::Name(name) => name.clone(),
            FavoriteRef::Index(index) => format!("position {}", index),
        },
    })
}

fn settings_value(settings: &Settings) -> Result<Value, StoreError> {
    serde_json::to_value(settings).map_err(|e| StoreError::InvalidSettings(e.to_string()))
}
