/// Backup snapshots, badge, export file names and import parsing
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::favorites::{FavoriteKind, FavoriteRecord, Favorites};
use crate::settings::Settings;
use crate::storage::records_from_value;

pub const BACKUP_VERSION: &str = "1.0.0";
pub const GLOBAL_EXPORT_PREFIX: &str = "e621_global";
pub const BACKUP_FILE_PREFIX: &str = "e621_favorites_backup";

/// Point-in-time export of all favorites and settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupSnapshot {
    pub version: String,
    pub timestamp: String,
    pub favorites: Favorites,
    pub settings: Settings,
}

impl BackupSnapshot {
    pub fn new(favorites: &Favorites, settings: &Settings, at: DateTime<Utc>) -> BackupSnapshot {
        BackupSnapshot {
            version: BACKUP_VERSION.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            favorites: favorites.clone(),
            settings: settings.clone(),
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Persistence(e.to_string()))
    }
}

/// Value stored under `last_backup`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredBackup {
    pub data: BackupSnapshot,
    pub timestamp: i64,
}

impl StoredBackup {
    pub fn new(data: BackupSnapshot, at: DateTime<Utc>) -> StoredBackup {
        StoredBackup {
            data,
            timestamp: at.timestamp_millis(),
        }
    }
}

/// Favorites recorded in a stored `last_backup` value, read leniently.
/// None when there is no usable backup.
pub fn favorites_from_backup(value: Option<&Value>) -> Option<Favorites> {
    let favorites = value?.get("data")?.get("favorites")?;
    let mut restored = Favorites::new();
    for kind in FavoriteKind::ALL {
        *restored.list_mut(kind) = records_from_value(favorites.get(kind.as_str()));
    }
    Some(restored)
}

/// Extension badge contents
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub count: usize,
    pub text: String,
    pub color: String,
}

impl Badge {
    pub fn new(favorites: &Favorites, settings: &Settings) -> Badge {
        let count = favorites.total();
        Badge {
            count,
            text: if count > 0 { count.to_string() } else { String::new() },
            color: settings.badge_color.clone(),
        }
    }
}

/// A JSON document to offer as a download
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

/// `prefix_YYYY-MM-DDTHH-MM-SS.json`
pub fn export_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", prefix, at.format("%Y-%m-%dT%H-%M-%S"))
}

pub fn kind_export_file_name(kind: FavoriteKind) -> String {
    format!("e621_{}_favorites.json", kind)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImport {
    Bare(Vec<Value>),
    Wrapped {
        favorites: Map<String, Value>,
        #[serde(default)]
        settings: Option<Value>,
    },
    Flat(Map<String, Value>),
}

/// A user-supplied import file, normalized
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDocument {
    /// All three kinds, plus settings to merge when present
    Full {
        favorites: Favorites,
        settings: Option<Value>,
    },
    /// A bare array of records for one kind
    Single(Vec<FavoriteRecord>),
}

impl ImportDocument {
    pub fn parse(text: &str) -> Result<ImportDocument, StoreError> {
        let raw: RawImport = serde_json::from_str(text).map_err(|e| {
            StoreError::ImportFormat(format!("expected a JSON object or array: {}", e))
        })?;

        Ok(match raw {
            RawImport::Bare(items) => {
                ImportDocument::Single(records_from_value(Some(&Value::Array(items))))
            }
            RawImport::Wrapped { favorites, settings } => ImportDocument::Full {
                favorites: favorites_from_map(&favorites),
                settings: settings.filter(Value::is_object),
            },
            RawImport::Flat(fields) => ImportDocument::Full {
                favorites: favorites_from_map(&fields),
                settings: fields.get("settings").filter(|v| v.is_object()).cloned(),
            },
        })
    }
}

fn favorites_from_map(fields: &Map<String, Value>) -> Favorites {
    let mut favorites = Favorites::new();
    for kind in FavoriteKind::ALL {
        *favorites.list_mut(kind) = records_from_value(fields.get(kind.as_str()));
    }
    favorites
}

/// Drop duplicate names (first occurrence wins) and keep at most `limit` records
pub fn dedupe_and_truncate(records: Vec<FavoriteRecord>, limit: usize) -> Vec<FavoriteRecord> {
    let mut kept: Vec<FavoriteRecord> = Vec::new();
    for record in records {
        if kept.len() >= limit {
            break;
        }
        if !kept.iter().any(|existing| existing.matches_name(&record.name)) {
            kept.push(record);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(name: &str) -> FavoriteRecord {
        FavoriteRecord::new(name.to_string(), format!("https://e621.net/posts?tags={}", name), 1)
    }

    #[test]
    fn test_export_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            export_file_name(GLOBAL_EXPORT_PREFIX, at),
            "e621_global_2024-03-09T07-05-01.json"
        );
        assert_eq!(kind_export_file_name(FavoriteKind::Search), "e621_search_favorites.json");
    }

    #[test]
    fn test_snapshot_shape() {
        let mut favorites = Favorites::new();
        favorites.artist.push(record("somebody"));
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let snapshot = BackupSnapshot::new(&favorites, &Settings::default(), at);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["timestamp"], "2024-01-02T03:04:05.000Z");
        assert_eq!(value["favorites"]["artist"][0]["name"], "somebody");
        assert_eq!(value["favorites"]["search"], json!([]));
        assert_eq!(value["settings"]["favoritesLimit"], 100);
    }

    #[test]
    fn test_favorites_from_backup() {
        let stored = json!({
            "data": { "favorites": { "tag": [ { "name": "wolf", "url": "u" } ], "artist": "broken" } },
            "timestamp": 1
        });

        let favorites = favorites_from_backup(Some(&stored)).unwrap();
        assert_eq!(favorites.tag.len(), 1);
        assert!(favorites.artist.is_empty());

        assert_eq!(favorites_from_backup(Some(&json!({ "timestamp": 1 }))), None);
        assert_eq!(favorites_from_backup(None), None);
    }

    #[test]
    fn test_badge() {
        let mut favorites = Favorites::new();
        let empty = Badge::new(&favorites, &Settings::default());
        assert_eq!(empty.count, 0);
        assert_eq!(empty.text, "");

        favorites.tag.push(record("a"));
        favorites.search.push(record("b"));
        let badge = Badge::new(&favorites, &Settings::default());
        assert_eq!(badge.count, 2);
        assert_eq!(badge.text, "2");
        assert_eq!(badge.color, "#c41e3a");
    }

    #[test]
    fn test_parse_wrapped_document() {
        let text = r#"{
            "version": "1.0.0",
            "favorites": { "artist": [ { "name": "a", "url": "u" } ], "tag": 7 },
            "settings": { "iconSize": 30 }
        }"#;

        match ImportDocument::parse(text).unwrap() {
            ImportDocument::Full { favorites, settings } => {
                assert_eq!(favorites.artist.len(), 1);
                assert!(favorites.tag.is_empty());
                assert!(favorites.search.is_empty());
                assert_eq!(settings.unwrap()["iconSize"], 30);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_flat_document() {
        let text = r#"{ "search": [ { "name": "wolf rating:s", "url": "u" } ] }"#;

        match ImportDocument::parse(text).unwrap() {
            ImportDocument::Full { favorites, settings } => {
                assert_eq!(favorites.search.len(), 1);
                assert_eq!(settings, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_array() {
        let text = r#"[ { "name": "a", "url": "u" }, { "name": "b", "url": "v", "frequency": 3 } ]"#;

        assert_eq!(
            ImportDocument::parse(text).unwrap(),
            ImportDocument::Single(vec![
                record_with("a", "u", 0),
                record_with("b", "v", 3),
            ])
        );
    }

    fn record_with(name: &str, url: &str, frequency: u64) -> FavoriteRecord {
        FavoriteRecord {
            name: name.to_string(),
            url: url.to_string(),
            date_added: 0,
            frequency,
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(ImportDocument::parse("not json"), Err(StoreError::ImportFormat(_))));
        assert!(matches!(ImportDocument::parse("\"text\""), Err(StoreError::ImportFormat(_))));
        assert!(matches!(ImportDocument::parse("12"), Err(StoreError::ImportFormat(_))));
    }

    #[test]
    fn test_dedupe_and_truncate() {
        let records = vec![record("a"), record("A"), record("b"), record("c")];
        let kept = dedupe_and_truncate(records, 2);

        let names: Vec<&str> = kept.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
