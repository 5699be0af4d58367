/// Content script wiring: mutation observer, URL poll, heart clicks, messages
use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Interval;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, MutationObserver, MutationObserverInit};

use super::dom::{HEART_CLASS, SEARCH_HEART_CLASS, WebPage};
use super::{
    BrowserMessenger, BrowserStorage, current_url, detach_listener, from_js, onRuntimeMessage,
};
use crate::content::{ContentSession, URL_POLL_MS};
use crate::favorites::FavoriteKind;
use crate::notifier::Envelope;
use crate::search::site_origin;
use crate::store::FavoriteStore;

type Session = ContentSession<BrowserStorage, BrowserMessenger, WebPage>;

thread_local! {
    static RUNNING: RefCell<Option<ContentScript>> = const { RefCell::new(None) };
}

/// A running content script. Dropping it disconnects every listener.
pub struct ContentScript {
    session: Rc<Session>,
    observer: MutationObserver,
    _on_mutation: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
    on_click: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(JsValue, bool) -> JsValue>,
    remove_message_listener: js_sys::Function,
    _url_poll: Interval,
}

impl ContentScript {
    pub async fn start() -> Result<ContentScript, String> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or("no document")?;
        let page_url = current_url();

        let store = FavoriteStore::new(BrowserStorage, BrowserMessenger::runtime())
            .with_origin(&site_origin(&page_url));
        let session = Rc::new(ContentSession::new(store, WebPage::new(document.clone()), &page_url));
        session.start().await.map_err(|e| e.to_string())?;

        let on_mutation = {
            let session = session.clone();
            Closure::wrap(Box::new(move |_records: js_sys::Array, _observer: MutationObserver| {
                session.on_dom_mutation();
            }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>)
        };
        let observer = MutationObserver::new(on_mutation.as_ref().unchecked_ref())
            .map_err(|e| format!("{:?}", e))?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        if let Some(body) = document.body() {
            observer
                .observe_with_options(&body, &init)
                .map_err(|e| format!("{:?}", e))?;
        }

        let on_click = {
            let session = session.clone();
            Closure::wrap(Box::new(move |event: Event| handle_click(&session, event))
                as Box<dyn FnMut(Event)>)
        };
        document
            .add_event_listener_with_callback_and_bool("click", on_click.as_ref().unchecked_ref(), true)
            .map_err(|e| format!("{:?}", e))?;

        let on_message = {
            let session = session.clone();
            Closure::wrap(Box::new(move |message: JsValue, _from_tab: bool| {
                match from_js::<Envelope>(message) {
                    Ok(envelope) => {
                        let session = session.clone();
                        spawn_local(async move {
                            if let Err(e) = session.on_message(&envelope).await {
                                log::warn!("Failed to apply change message: {}", e);
                            }
                        });
                    }
                    Err(e) => log::debug!("Ignoring message: {}", e),
                }
                JsValue::UNDEFINED
            }) as Box<dyn FnMut(JsValue, bool) -> JsValue>)
        };
        let remove_message_listener = onRuntimeMessage(&on_message);

        let url_poll = {
            let session = session.clone();
            Interval::new(URL_POLL_MS, move || {
                session.on_url_poll(&current_url());
            })
        };

        Ok(ContentScript {
            session,
            observer,
            _on_mutation: on_mutation,
            on_click,
            _on_message: on_message,
            remove_message_listener,
            _url_poll: url_poll,
        })
    }

    /// Keep the script alive until `stop` is called
    pub fn install(self) {
        RUNNING.with(|running| *running.borrow_mut() = Some(self));
    }

    /// Artists on the page of the running script
    pub fn artists() -> Vec<String> {
        RUNNING.with(|running| {
            running
                .borrow()
                .as_ref()
                .map(|script| script.session.artists())
                .unwrap_or_default()
        })
    }

    pub fn stop() {
        let script = RUNNING.with(|running| running.borrow_mut().take());
        drop(script);
    }
}

impl Drop for ContentScript {
    fn drop(&mut self) {
        self.observer.disconnect();
        detach_listener(&self.remove_message_listener);
        if let Some(document) = web_sys::window().and_then(|w| w.document()) {
            let _ = document.remove_event_listener_with_callback_and_bool(
                "click",
                self.on_click.as_ref().unchecked_ref(),
                true,
            );
        }
        log::info!("Content script stopped");
    }
}

fn handle_click(session: &Rc<Session>, event: Event) {
    let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
        return;
    };

    if let Ok(Some(heart)) = target.closest(&format!(".{}", HEART_CLASS)) {
        event.prevent_default();
        event.stop_immediate_propagation();

        let kind = heart
            .get_attribute("data-type")
            .and_then(|t| FavoriteKind::ALL.into_iter().find(|k| k.as_str() == t));
        let (Some(kind), Some(name)) = (kind, heart.get_attribute("data-name")) else {
            return;
        };
        let session = session.clone();
        spawn_local(async move {
            if let Err(e) = session.on_heart_click(kind, &name).await {
                log::debug!("Heart click failed: {}", e);
            }
        });
        return;
    }

    if let Ok(Some(_)) = target.closest(&format!(".{}", SEARCH_HEART_CLASS)) {
        event.prevent_default();
        event.stop_immediate_propagation();

        let session = session.clone();
        spawn_local(async move {
            if let Err(e) = session.on_search_heart_click().await {
                log::debug!("Search heart click failed: {}", e);
            }
        });
    }
}
