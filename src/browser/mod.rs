/// WebExtension glue: storage, messaging and per-context start-up
///
/// Only built for wasm32. Everything here is a thin adapter over
/// `/extension.js`; the behavior lives in the platform-independent modules.
use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use crate::backup::Badge;
use crate::errors::{NotifyError, StorageError};
use crate::notifier::{Envelope, Notifier};
use crate::storage::{KeyValueStore, StorageRecord};

pub mod background;
pub mod content;
pub mod dom;

#[wasm_bindgen(module = "/extension.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn storageGet(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn storageSet(items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendRuntimeMessage(message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn broadcastToSiteTabs(message: JsValue) -> Result<(), JsValue>;

    fn setBadge(text: &str, color: &str);

    #[wasm_bindgen(catch)]
    async fn downloadJson(contents: &str, filename: &str) -> Result<(), JsValue>;

    pub(crate) fn saveTextFile(contents: &str, filename: &str);

    #[wasm_bindgen(catch)]
    pub(crate) async fn pickJsonFile() -> Result<JsValue, JsValue>;

    pub(crate) fn openUrl(url: &str);

    fn onStorageChanged(callback: &Closure<dyn FnMut(JsValue, String)>);

    fn onRuntimeMessage(callback: &Closure<dyn FnMut(JsValue, bool) -> JsValue>) -> js_sys::Function;
}

pub(crate) fn js_error(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

/// Plain JS objects, never `Map`s, so the extension APIs accept them
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("Failed to serialize: {:?}", e))
}

/// Goes through `serde_json::Value` so flattened and tagged types decode
pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, String> {
    let json: serde_json::Value = serde_wasm_bindgen::from_value(value)
        .map_err(|e| format!("Failed to parse: {:?}", e))?;
    serde_json::from_value(json).map_err(|e| format!("Failed to parse: {}", e))
}

pub(crate) fn show_badge(badge: &Badge) {
    setBadge(&badge.text, &badge.color);
}

/// Call the remover returned by `onRuntimeMessage`. A throw is logged, not raised.
pub(crate) fn detach_listener(remove: &js_sys::Function) -> bool {
    match remove.call0(&JsValue::NULL) {
        Ok(_) => true,
        Err(e) => {
            log::debug!("Could not remove message listener: {}", js_error(&e));
            false
        }
    }
}

pub(crate) fn current_url() -> String {
    web_sys::window()
        .and_then(|w| w.location().href().ok())
        .unwrap_or_default()
}

/// `browser.storage.local`
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserStorage;

impl KeyValueStore for BrowserStorage {
    async fn get(&self, keys: &[&str]) -> Result<StorageRecord, StorageError> {
        let keys_js = to_js(keys).map_err(StorageError::Read)?;
        let value = storageGet(keys_js)
            .await
            .map_err(|e| StorageError::Read(js_error(&e)))?;

        if value.is_null() || value.is_undefined() {
            return Ok(StorageRecord::new());
        }
        from_js(value).map_err(StorageError::Read)
    }

    async fn set(&self, items: StorageRecord) -> Result<(), StorageError> {
        let items_js = to_js(&items).map_err(StorageError::Write)?;
        storageSet(items_js)
            .await
            .map_err(|e| StorageError::Write(js_error(&e)))
    }
}

/// Runtime messages, plus a direct fan-out to site tabs where the context can reach them
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserMessenger {
    to_tabs: bool,
}

impl BrowserMessenger {
    /// Content scripts: runtime only, the background relays to other tabs
    pub fn runtime() -> Self {
        BrowserMessenger { to_tabs: false }
    }

    /// Popup: runtime and every open site tab
    pub fn with_tabs() -> Self {
        BrowserMessenger { to_tabs: true }
    }
}

pub(crate) async fn send_to_tabs(envelope: &Envelope) -> Result<(), NotifyError> {
    let message = to_js(&envelope.to_json()?).map_err(NotifyError::Encode)?;
    broadcastToSiteTabs(message)
        .await
        .map_err(|e| NotifyError::Delivery(js_error(&e)))
}

impl Notifier for BrowserMessenger {
    async fn broadcast(&self, envelope: &Envelope) -> Result<(), NotifyError> {
        if self.to_tabs {
            send_to_tabs(envelope).await?;
        }

        let message = to_js(&envelope.to_json()?).map_err(NotifyError::Encode)?;
        sendRuntimeMessage(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery(js_error(&e)))
    }
}
