/// Content-script session: one per open site tab
///
/// Ties a page, its store and the change messages from other contexts
/// together. The browser glue feeds it DOM mutations, URL polls, heart clicks
/// and runtime messages; everything here runs the same against a fake page.
use std::cell::RefCell;

use crate::annotator::{
    PageDom, apply_page_policy, detect_artists, refresh_hearts, refresh_search_heart,
};
use crate::errors::StoreError;
use crate::favorites::FavoriteKind;
use crate::notifier::{Envelope, Message, Notifier};
use crate::page::{PageFeatures, PageKind, classify};
use crate::storage::KeyValueStore;
use crate::store::{FavoriteStore, Toggled};

/// Interval between checks of the page URL, for in-page navigation
pub const URL_POLL_MS: u32 = 1000;

/// Remembers the last URL seen so a poll only reports real changes
#[derive(Debug, Clone, PartialEq)]
pub struct UrlWatcher {
    last_url: String,
}

impl UrlWatcher {
    pub fn new(url: &str) -> UrlWatcher {
        UrlWatcher {
            last_url: url.to_string(),
        }
    }

    pub fn current(&self) -> &str {
        &self.last_url
    }

    /// Record `url`, returning true when it differs from the last one
    pub fn check(&mut self, url: &str) -> bool {
        if self.last_url == url {
            return false;
        }
        self.last_url = url.to_string();
        true
    }
}

pub struct ContentSession<S, N, D> {
    store: FavoriteStore<S, N>,
    dom: RefCell<D>,
    url: RefCell<UrlWatcher>,
}

impl<S: KeyValueStore, N: Notifier, D: PageDom> ContentSession<S, N, D> {
    pub fn new(store: FavoriteStore<S, N>, dom: D, page_url: &str) -> Self {
        ContentSession {
            store,
            dom: RefCell::new(dom),
            url: RefCell::new(UrlWatcher::new(page_url)),
        }
    }

    pub fn store(&self) -> &FavoriteStore<S, N> {
        &self.store
    }

    pub fn page_url(&self) -> String {
        self.url.borrow().current().to_string()
    }

    pub fn page_kind(&self) -> PageKind {
        classify(self.url.borrow().current())
    }

    pub fn features(&self) -> PageFeatures {
        PageFeatures::for_page(self.page_kind(), &self.store.settings())
    }

    /// Load state and annotate the page as it stands
    pub async fn start(&self) -> Result<usize, StoreError> {
        self.store.load().await?;
        let inserted = self.on_dom_mutation();
        log::info!(
            "Content script ready on {:?} page, {} hearts",
            self.page_kind(),
            inserted
        );
        Ok(inserted)
    }

    /// Page content changed: annotate whatever is new
    pub fn on_dom_mutation(&self) -> usize {
        let features = self.features();
        let favorites = self.store.favorites();
        let settings = self.store.settings();
        let page_url = self.page_url();

        apply_page_policy(
            &mut *self.dom.borrow_mut(),
            &features,
            &favorites,
            &settings,
            &page_url,
        )
    }

    /// Poll tick. Returns true when the URL changed and the page was refreshed.
    pub fn on_url_poll(&self, current: &str) -> bool {
        if !self.url.borrow_mut().check(current) {
            return false;
        }
        log::debug!("Page URL changed to {}", current);
        self.on_dom_mutation();
        self.refresh();
        true
    }

    /// Change broadcast from another context. Returns true when handled.
    pub async fn on_message(&self, envelope: &Envelope) -> Result<bool, StoreError> {
        if envelope.is_from(self.store.context_id()) {
            return Ok(false);
        }

        match &envelope.message {
            Message::FavoritesUpdated { .. } | Message::FavoriteRemoved { .. } => {
                self.store.read_favorites().await?;
                self.refresh();
            }
            Message::SettingsUpdated { settings } => {
                self.store.apply_settings(settings.clone());
                self.on_dom_mutation();
                self.refresh();
            }
            Message::UpdateBadge | Message::SaveToJsonFile => return Ok(false),
        }
        Ok(true)
    }

    pub async fn on_heart_click(&self, kind: FavoriteKind, name: &str) -> Result<Toggled, StoreError> {
        let result = self.store.toggle(kind, name).await;
        if let Err(e) = &result {
            log::warn!("Could not toggle {} favorite {:?}: {}", kind, name, e);
            self.dom.borrow_mut().show_notice(&e.to_string(), true);
        }
        self.refresh();
        result
    }

    pub async fn on_search_heart_click(&self) -> Result<Toggled, StoreError> {
        let page_url = self.page_url();
        let result = self.store.toggle_search(&page_url).await;
        if let Err(e) = &result {
            log::warn!("Could not toggle search favorite: {}", e);
            self.dom.borrow_mut().show_notice(&e.to_string(), true);
        }
        self.refresh();
        result
    }

    /// Re-render every heart from the store
    pub fn refresh(&self) {
        let favorites = self.store.favorites();
        let settings = self.store.settings();
        let page_url = self.page_url();
        let mut dom = self.dom.borrow_mut();

        refresh_hearts(&mut *dom, &favorites, &settings);
        refresh_search_heart(&mut *dom, &favorites, &settings, &page_url);
    }

    pub fn artists(&self) -> Vec<String> {
        detect_artists(&*self.dom.borrow())
    }

    /// Run `f` against the page
    pub fn with_dom<T>(&self, f: impl FnOnce(&D) -> T) -> T {
        f(&*self.dom.borrow())
    }
}
