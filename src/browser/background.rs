/// Background page wiring: badge on storage changes, message handling
use std::rc::Rc;

use chrono::Utc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use super::{
    BrowserMessenger, BrowserStorage, downloadJson, from_js, js_error, onRuntimeMessage,
    onStorageChanged, send_to_tabs, show_badge, to_js,
};
use crate::background::{BackgroundService, Reply, error_response};
use crate::notifier::Envelope;
use crate::storage::StorageChange;
use crate::store::FavoriteStore;

type Service = BackgroundService<BrowserStorage, BrowserMessenger>;

pub async fn start() -> Result<(), String> {
    let service = Rc::new(BackgroundService::new(FavoriteStore::new(
        BrowserStorage,
        BrowserMessenger::with_tabs(),
    )));

    match service.badge().await {
        Ok(badge) => show_badge(&badge),
        Err(e) => log::warn!("Could not compute badge: {}", e),
    }

    let on_change = {
        let service = service.clone();
        Closure::wrap(Box::new(move |keys: JsValue, area: String| {
            let keys: Vec<String> = from_js(keys).unwrap_or_default();
            let change = StorageChange::new(keys, &area);
            let service = service.clone();
            spawn_local(async move {
                match service.on_storage_change(&change).await {
                    Ok(Some(badge)) => show_badge(&badge),
                    Ok(None) => {}
                    Err(e) => log::warn!("Could not refresh badge: {}", e),
                }
            });
        }) as Box<dyn FnMut(JsValue, String)>)
    };
    onStorageChanged(&on_change);

    let on_message = {
        let service = service.clone();
        Closure::wrap(Box::new(move |message: JsValue, from_tab: bool| {
            let envelope = match from_js::<Envelope>(message) {
                Ok(envelope) => envelope,
                Err(e) => {
                    log::debug!("Ignoring message: {}", e);
                    return JsValue::UNDEFINED;
                }
            };
            let service = service.clone();
            future_to_promise(async move { respond(&service, envelope, from_tab).await }).into()
        }) as Box<dyn FnMut(JsValue, bool) -> JsValue>)
    };
    // the background page lives as long as the extension
    let _ = onRuntimeMessage(&on_message);

    on_change.forget();
    on_message.forget();
    log::info!("Background started");
    Ok(())
}

async fn respond(service: &Service, envelope: Envelope, from_tab: bool) -> Result<JsValue, JsValue> {
    let response = match service.on_message(&envelope, from_tab, Utc::now()).await {
        Ok(reply) => {
            match &reply {
                Reply::Badge(badge) => show_badge(badge),
                Reply::Download(file) => {
                    if let Err(e) = downloadJson(&file.contents, &file.file_name).await {
                        log::error!("Download error: {}", js_error(&e));
                        return to_js(&serde_json::json!({ "success": false, "error": js_error(&e) }))
                            .map_err(|e| JsValue::from_str(&e));
                    }
                }
                Reply::Relay(envelope) => {
                    if let Err(e) = send_to_tabs(envelope).await {
                        log::warn!("Relay to tabs failed: {}", e);
                    }
                }
                Reply::Ignored => {}
            }
            reply.to_response()
        }
        Err(e) => {
            log::error!("Message handling failed: {}", e);
            error_response(&e)
        }
    };
    to_js(&response).map_err(|e| JsValue::from_str(&e))
}
