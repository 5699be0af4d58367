/// e621 Favorites - browser extension for e621/e926
/// Built with Rust + WASM + Yew

pub mod annotator;
pub mod background;
pub mod backup;
pub mod content;
pub mod errors;
pub mod favorites;
pub mod notifier;
pub mod page;
pub mod search;
pub mod settings;
pub mod storage;
pub mod store;

#[cfg(target_arch = "wasm32")]
pub mod browser;
#[cfg(target_arch = "wasm32")]
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook and logging once per extension context
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// "list" or "detail" for a page URL or path
#[wasm_bindgen]
pub fn classify_page(location: &str) -> String {
    match page::classify(location) {
        page::PageKind::List => "list".to_string(),
        page::PageKind::Detail => "detail".to_string(),
    }
}

/// Canonical favorite URL of a search page, if it carries a search
#[wasm_bindgen]
pub fn canonical_search_url(location: &str) -> Option<String> {
    search::normalize_search_url(location)
}

// Start the Yew app for the popup
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Annotate the current site page and keep it in sync
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start_content_script() {
    wasm_bindgen_futures::spawn_local(async {
        match browser::content::ContentScript::start().await {
            Ok(script) => script.install(),
            Err(e) => log::error!("Content script failed to start: {}", e),
        }
    });
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn stop_content_script() {
    browser::content::ContentScript::stop();
}

/// Distinct artist names on the current page, for popup suggestions
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn page_artists() -> Vec<String> {
    browser::content::ContentScript::artists()
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start_background() {
    wasm_bindgen_futures::spawn_local(async {
        if let Err(e) = browser::background::start().await {
            log::error!("Background failed to start: {}", e);
        }
    });
}
