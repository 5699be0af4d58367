/// Search URL canonicalization and favorite URL derivation
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::page::{DEFAULT_ORIGIN, parse_location};

/// Query parameters that carry a search, in priority order
const SEARCH_PARAMS: [&str; 2] = ["q", "tags"];

/// Origin of a page URL (`https://e926.net` etc.), falling back to the default site
pub fn site_origin(location: &str) -> String {
    parse_location(location)
        .map(|url| url.origin().ascii_serialization())
        .filter(|origin| origin != "null")
        .unwrap_or_else(|| DEFAULT_ORIGIN.to_string())
}

/// Decoded value of the first search parameter present (`q` before `tags`)
fn search_value(url: &Url) -> Option<String> {
    SEARCH_PARAMS.iter().find_map(|param| {
        url.query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| value.into_owned())
    })
}

fn posts_url(origin: &str, tags: &str) -> String {
    let encoded: String = byte_serialize(tags.as_bytes()).collect();
    format!("{}/posts?tags={}", origin.trim_end_matches('/'), encoded)
}

/// Reduce a search page URL to its canonical favorite key.
///
/// Examples:
/// - https://e621.net/posts?tags=foo+bar&page=2 → https://e621.net/posts?tags=foo+bar
/// - https://e621.net/posts/123?q=foo+bar → https://e621.net/posts?tags=foo+bar
///
/// Returns None when the page is not under `/posts` or carries no search.
pub fn normalize_search_url(location: &str) -> Option<String> {
    let url = parse_location(location)?;
    if !url.path().contains("/posts") {
        return None;
    }

    let value = search_value(&url)?;
    if value.trim().is_empty() {
        return None;
    }

    Some(posts_url(&url.origin().ascii_serialization(), &value))
}

/// Human-readable search text of a page URL (`+` and escapes decoded)
pub fn extract_search_name(location: &str) -> Option<String> {
    let url = parse_location(location)?;
    let value = search_value(&url)?;
    let value = value.trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Listing URL for a tag or artist name: whitespace runs become underscores
pub fn tag_url(origin: &str, name: &str) -> String {
    let tag = name.split_whitespace().collect::<Vec<&str>>().join("_");
    posts_url(origin, &tag)
}
