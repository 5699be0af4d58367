/// User settings shared by every extension context
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::StoreError;

pub const DEFAULT_FAVORITES_LIMIT: usize = 100;

/// Flat settings record. Missing keys in stored or imported JSON fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub favorites_limit: usize,
    pub heart_color: String,
    pub icon_size: u32,
    pub enable_animations: bool,
    pub enable_sounds: bool,
    pub sound_on_popup_click: bool,
    pub sound_on_page_click: bool,
    pub sound_on_page_load: bool,
    pub sound_volume: f64,
    pub remove_ads: bool,
    pub zoom_scale: f64,
    pub badge_color: String,
    pub disable_hearts_on_list_page: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            favorites_limit: DEFAULT_FAVORITES_LIMIT,
            heart_color: "#ff0000".to_string(),
            icon_size: 20,
            enable_animations: true,
            enable_sounds: true,
            sound_on_popup_click: true,
            sound_on_page_click: true,
            sound_on_page_load: true,
            sound_volume: 0.3,
            remove_ads: false,
            zoom_scale: 1.25,
            badge_color: "#c41e3a".to_string(),
            disable_hearts_on_list_page: false,
        }
    }
}

impl Settings {
    /// Parse a stored settings value; anything that is not an object yields defaults.
    pub fn from_value(value: Option<&Value>) -> Settings {
        match value {
            Some(value @ Value::Object(_)) => match serde_json::from_value(value.clone()) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Stored settings are invalid, using defaults: {}", e);
                    Settings::default()
                }
            },
            _ => Settings::default(),
        }
    }

    /// Shallow key-wise merge of `patch` over these settings
    pub fn merged(&self, patch: &Value) -> Result<Settings, StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidSettings("settings must be an object".to_string()));
        };

        let mut current = serde_json::to_value(self)
            .map_err(|e| StoreError::InvalidSettings(e.to_string()))?;
        if let Value::Object(fields) = &mut current {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(current).map_err(|e| StoreError::InvalidSettings(e.to_string()))
    }

    /// Key-wise merge that keeps going past values of the wrong type.
    /// Used for imported files, where one bad key must not sink the rest.
    pub fn merged_lenient(&self, patch: &Value) -> Settings {
        let Value::Object(fields) = patch else {
            log::warn!("Ignoring imported settings: not an object");
            return self.clone();
        };

        let mut merged = self.clone();
        for (key, value) in fields {
            match merged.with_setting(key, value.clone()) {
                Ok(next) => merged = next,
                Err(e) => log::warn!("Skipping imported setting {}: {}", key, e),
            }
        }
        merged
    }

    pub fn with_setting(&self, key: &str, value: Value) -> Result<Settings, StoreError> {
        let mut patch = serde_json::Map::new();
        patch.insert(key.to_string(), value);
        self.merged(&Value::Object(patch))
    }

    /// Volume in [0, 1]; NaN falls back to the default
    pub fn clamped_volume(&self) -> f64 {
        if self.sound_volume.is_nan() {
            Settings::default().sound_volume
        } else {
            self.sound_volume.clamp(0.0, 1.0)
        }
    }

    pub fn search_icon_size(&self) -> u32 {
        self.icon_size.saturating_add(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.favorites_limit, 100);
        assert_eq!(settings.badge_color, "#c41e3a");
        assert!(!settings.disable_hearts_on_list_page);
    }

    #[test]
    fn test_partial_stored_settings_fill_defaults() {
        let stored = json!({ "favoritesLimit": 5, "iconSize": 32 });
        let settings = Settings::from_value(Some(&stored));

        assert_eq!(settings.favorites_limit, 5);
        assert_eq!(settings.icon_size, 32);
        assert_eq!(settings.zoom_scale, 1.25);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert_eq!(Settings::from_value(Some(&json!([1, 2]))), Settings::default());
        assert_eq!(Settings::from_value(None), Settings::default());
    }

    #[test]
    fn test_lenient_merge_skips_bad_keys() {
        let current = Settings {
            icon_size: 32,
            ..Settings::default()
        };
        let merged = current.merged_lenient(&json!({ "iconSize": "20", "removeAds": true }));

        assert_eq!(merged.icon_size, 32);
        assert!(merged.remove_ads);
        assert_eq!(Settings::default().merged_lenient(&json!(7)), Settings::default());
    }

    #[test]
    fn test_search_icon_size_saturates() {
        let settings = Settings {
            icon_size: u32::MAX - 1,
            ..Settings::default()
        };
        assert_eq!(settings.search_icon_size(), u32::MAX);
        assert_eq!(Settings::default().search_icon_size(), 24);
    }

    #[test]
    fn test_merge_keeps_unpatched_fields() {
        let base = Settings {
            icon_size: 24,
            ..Settings::default()
        };
        let merged = base.merged(&json!({ "removeAds": true })).unwrap();

        assert!(merged.remove_ads);
        assert_eq!(merged.icon_size, 24);
    }

    #[test]
    fn test_with_setting_rejects_wrong_type() {
        let result = Settings::default().with_setting("favoritesLimit", json!("lots"));
        assert!(matches!(result, Err(StoreError::InvalidSettings(_))));
    }

    #[test]
    fn test_clamped_volume() {
        let loud = Settings {
            sound_volume: 3.0,
            ..Settings::default()
        };
        assert_eq!(loud.clamped_volume(), 1.0);

        let broken = Settings {
            sound_volume: f64::NAN,
            ..Settings::default()
        };
        assert_eq!(broken.clamped_volume(), 0.3);
    }
}
