/// Cross-context change notifications
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::NotifyError;
use crate::favorites::FavoriteKind;
use crate::settings::Settings;

/// Typed message, serialized as `{action, ...payload}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    FavoritesUpdated {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<FavoriteKind>,
    },
    #[serde(rename_all = "camelCase")]
    FavoriteRemoved {
        #[serde(rename = "type")]
        kind: FavoriteKind,
        name: String,
    },
    SettingsUpdated { settings: Settings },
    UpdateBadge,
    SaveToJsonFile,
}

impl Message {
    /// Messages that describe a committed favorites or settings change
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Message::FavoritesUpdated { .. }
                | Message::FavoriteRemoved { .. }
                | Message::SettingsUpdated { .. }
        )
    }
}

/// A message tagged with the id of the context that sent it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
}

impl Envelope {
    pub fn new(message: Message, origin: Uuid) -> Envelope {
        Envelope {
            message,
            origin: Some(origin),
        }
    }

    pub fn is_from(&self, context: Uuid) -> bool {
        self.origin == Some(context)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, NotifyError> {
        serde_json::to_value(self).map_err(|e| NotifyError::Encode(e.to_string()))
    }
}

/// Fans a message out to every other live context.
///
/// Delivery is best-effort: a context that is not open misses the message and
/// reconciles from storage on its next load.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn broadcast(&self, envelope: &Envelope) -> Result<(), NotifyError>;
}

/// Notifier for contexts with nobody to tell
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    async fn broadcast(&self, _envelope: &Envelope) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Send and swallow failures
pub async fn broadcast_best_effort<N: Notifier>(notifier: &N, envelope: Envelope) {
    if let Err(e) = notifier.broadcast(&envelope).await {
        log::warn!("Dropped {:?} notification: {}", envelope.message, e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Records every broadcast; optionally fails delivery
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: RefCell<Vec<Envelope>>,
        pub fail: Cell<bool>,
    }

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<Message> {
            self.sent.borrow().iter().map(|e| e.message.clone()).collect()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn broadcast(&self, envelope: &Envelope) -> Result<(), NotifyError> {
            self.sent.borrow_mut().push(envelope.clone());
            if self.fail.get() {
                return Err(NotifyError::Delivery("no receiver".to_string()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_removed() {
        let origin = Uuid::new_v4();
        let envelope = Envelope::new(
            Message::FavoriteRemoved {
                kind: FavoriteKind::Tag,
                name: "wolf".to_string(),
            },
            origin,
        );

        let value = envelope.to_json().unwrap();

        assert_eq!(value["action"], "favoriteRemoved");
        assert_eq!(value["type"], "tag");
        assert_eq!(value["name"], "wolf");
        assert_eq!(value["origin"], origin.to_string());
    }

    #[test]
    fn test_parse_message_without_origin() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "action": "favoritesUpdated" })).unwrap();

        assert_eq!(envelope.message, Message::FavoritesUpdated { kind: None });
        assert_eq!(envelope.origin, None);
        assert!(!envelope.is_from(Uuid::new_v4()));
    }

    #[test]
    fn test_parse_settings_updated_fills_defaults() {
        let envelope: Envelope = serde_json::from_value(json!({
            "action": "settingsUpdated",
            "settings": { "iconSize": 28 }
        }))
        .unwrap();

        match envelope.message {
            Message::SettingsUpdated { settings } => {
                assert_eq!(settings.icon_size, 28);
                assert_eq!(settings.favorites_limit, 100);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unit_actions() {
        let envelope: Envelope = serde_json::from_value(json!({ "action": "saveToJsonFile" })).unwrap();
        assert_eq!(envelope.message, Message::SaveToJsonFile);
        assert!(!envelope.message.is_change());
    }

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        let notifier = testing::RecordingNotifier::default();
        notifier.fail.set(true);

        broadcast_best_effort(&notifier, Envelope::new(Message::UpdateBadge, Uuid::new_v4())).await;

        assert_eq!(notifier.messages(), vec![Message::UpdateBadge]);
    }
}
