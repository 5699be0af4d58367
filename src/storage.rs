/// Storage access for browser.storage.local and its in-memory stand-in
use std::cell::{Cell, RefCell};

use serde_json::{Map, Value};

use crate::errors::StorageError;
use crate::favorites::{FavoriteKind, FavoriteRecord, Favorites};

pub const SETTINGS_KEY: &str = "settings";
pub const LAST_BACKUP_KEY: &str = "last_backup";

/// A partial record of storage keys to JSON values
pub type StorageRecord = Map<String, Value>;

/// Asynchronous key-value store shared by every extension context.
///
/// `get` returns only the keys that exist. Implementations give no locking:
/// concurrent writers race and the last `set` wins.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageRecord, StorageError>;
    async fn set(&self, items: StorageRecord) -> Result<(), StorageError>;
}

/// Keys holding the three favorite lists
pub fn favorites_keys() -> [&'static str; 3] {
    FavoriteKind::ALL.map(|kind| kind.storage_key())
}

/// Decode one stored list. Non-arrays decode as empty; unreadable entries are skipped.
pub fn records_from_value(value: Option<&Value>) -> Vec<FavoriteRecord> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value::<FavoriteRecord>(item.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("Skipping unreadable favorite {}: {}", item, e);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn records_to_value(records: &[FavoriteRecord]) -> Result<Value, StorageError> {
    serde_json::to_value(records).map_err(|e| StorageError::Malformed {
        key: "favorites".to_string(),
        message: e.to_string(),
    })
}

/// Decode all three lists from a storage record
pub fn favorites_from_record(record: &StorageRecord) -> Favorites {
    let mut favorites = Favorites::new();
    for kind in FavoriteKind::ALL {
        *favorites.list_mut(kind) = records_from_value(record.get(kind.storage_key()));
    }
    favorites
}

pub fn favorites_to_record(favorites: &Favorites) -> Result<StorageRecord, StorageError> {
    let mut record = StorageRecord::new();
    for kind in FavoriteKind::ALL {
        record.insert(
            kind.storage_key().to_string(),
            records_to_value(favorites.list(kind))?,
        );
    }
    Ok(record)
}

/// A storage change notification: which keys changed, in which area
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub keys: Vec<String>,
    pub area: String,
}

impl StorageChange {
    pub fn new(keys: Vec<String>, area: &str) -> StorageChange {
        StorageChange {
            keys,
            area: area.to_string(),
        }
    }

    pub fn touches_favorites(&self) -> bool {
        self.area == "local"
            && self
                .keys
                .iter()
                .any(|key| FavoriteKind::from_storage_key(key).is_some())
    }

    /// Badge text or color may have changed
    pub fn affects_badge(&self) -> bool {
        self.touches_favorites()
            || (self.area == "local" && self.keys.iter().any(|key| key == SETTINGS_KEY))
    }
}

/// In-memory store with switchable failure modes
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RefCell<StorageRecord>,
    fail_writes: Cell<bool>,
    ignore_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StorageRecord) -> Self {
        MemoryStorage {
            data: RefCell::new(data),
            ..Self::default()
        }
    }

    /// Make every `set` fail with a write error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Make every `set` succeed without storing anything
    pub fn set_ignore_writes(&self, ignore: bool) {
        self.ignore_writes.set(ignore);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.borrow().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.borrow_mut().remove(key)
    }

    pub fn clear(&self) {
        self.data.borrow_mut().clear();
    }
}

impl KeyValueStore for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<StorageRecord, StorageError> {
        let data = self.data.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, items: StorageRecord) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Write("storage unavailable".to_string()));
        }
        if self.ignore_writes.get() {
            return Ok(());
        }
        self.data.borrow_mut().extend(items);
        Ok(())
    }
}
