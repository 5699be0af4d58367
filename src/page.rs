/// Page classification and the UI features each page kind enables
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::settings::Settings;

pub const DEFAULT_ORIGIN: &str = "https://e621.net";

static POOL_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/pools/\d+").expect("valid pool regex"));
static POST_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/posts/\d+").expect("valid post regex"));

/// List pages show many thumbnails; detail pages show a single post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    List,
    Detail,
}

/// Parse an absolute URL, or a path resolved against the default origin
pub fn parse_location(location: &str) -> Option<Url> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    Url::parse(location)
        .ok()
        .or_else(|| Url::parse(DEFAULT_ORIGIN).ok()?.join(location).ok())
}

/// Classify a URL or path.
///
/// Rules, first match wins:
/// 1. `/posts` (with or without query) → List
/// 2. `/pools/gallery` (with or without query) → List
/// 3. `/pools/<digits>` → List
/// 4. `/posts/<digits>` → Detail
/// 5. anything else → Detail
pub fn classify(location: &str) -> PageKind {
    match parse_location(location) {
        Some(url) => classify_path(url.path()),
        None => PageKind::Detail,
    }
}

pub fn classify_path(path: &str) -> PageKind {
    if path == "/posts" || path.starts_with("/posts?") {
        return PageKind::List;
    }
    if path == "/pools/gallery" || path.starts_with("/pools/gallery?") {
        return PageKind::List;
    }
    if POOL_PAGE.is_match(path) {
        return PageKind::List;
    }
    if POST_PAGE.is_match(path) {
        return PageKind::Detail;
    }
    PageKind::Detail
}

/// UI features active on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFeatures {
    pub hearts: bool,
    pub hover_zoom: bool,
    pub download_buttons: bool,
    pub vote_overlay: bool,
    pub fullscreen_on_click: bool,
    pub hide_ads: bool,
}

impl PageFeatures {
    pub fn for_page(kind: PageKind, settings: &Settings) -> PageFeatures {
        let is_list = kind == PageKind::List;
        PageFeatures {
            hearts: !(is_list && settings.disable_hearts_on_list_page),
            hover_zoom: is_list,
            download_buttons: is_list,
            vote_overlay: !is_list,
            fullscreen_on_click: !is_list,
            hide_ads: settings.remove_ads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_examples() {
        assert_eq!(classify("/posts/4863849"), PageKind::Detail);
        assert_eq!(classify("/posts?tags=wolf"), PageKind::List);
        assert_eq!(classify("/pools/521"), PageKind::List);
    }

    #[test]
    fn test_classify_full_urls() {
        assert_eq!(classify("https://e621.net/posts"), PageKind::List);
        assert_eq!(classify("https://e926.net/posts?tags=fox+rating:s"), PageKind::List);
        assert_eq!(classify("https://e621.net/pools/gallery?page=2"), PageKind::List);
        assert_eq!(classify("https://e621.net/posts/123?q=wolf"), PageKind::Detail);
    }

    #[test]
    fn test_classify_defaults_to_detail() {
        assert_eq!(classify("/pools"), PageKind::Detail);
        assert_eq!(classify("/pools/new"), PageKind::Detail);
        assert_eq!(classify("/posts/random"), PageKind::Detail);
        assert_eq!(classify("/wiki_pages/wolf"), PageKind::Detail);
        assert_eq!(classify("/"), PageKind::Detail);
        assert_eq!(classify(""), PageKind::Detail);
    }

    #[test]
    fn test_classify_path_with_query_prefix() {
        assert_eq!(classify_path("/posts?page=3"), PageKind::List);
        assert_eq!(classify_path("/pools/gallery?search=x"), PageKind::List);
        assert_eq!(classify_path("/postsxyz"), PageKind::Detail);
    }

    #[test]
    fn test_features_on_list_page() {
        let features = PageFeatures::for_page(PageKind::List, &Settings::default());

        assert!(features.hearts);
        assert!(features.hover_zoom);
        assert!(features.download_buttons);
        assert!(!features.vote_overlay);
        assert!(!features.fullscreen_on_click);
    }

    #[test]
    fn test_disable_hearts_only_affects_list_pages() {
        let settings = Settings {
            disable_hearts_on_list_page: true,
            ..Settings::default()
        };

        assert!(!PageFeatures::for_page(PageKind::List, &settings).hearts);

        let detail = PageFeatures::for_page(PageKind::Detail, &settings);
        assert!(detail.hearts);
        assert!(detail.vote_overlay);
        assert!(detail.fullscreen_on_click);
    }
}
