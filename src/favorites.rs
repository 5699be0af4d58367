/// Data structures for favorites
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category partition of favorites. Each kind has its own list, capacity and order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteKind {
    Artist,
    Tag,
    Search,
}

impl FavoriteKind {
    pub const ALL: [FavoriteKind; 3] = [FavoriteKind::Artist, FavoriteKind::Tag, FavoriteKind::Search];

    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteKind::Artist => "artist",
            FavoriteKind::Tag => "tag",
            FavoriteKind::Search => "search",
        }
    }

    /// Key of this kind's list in the extension storage
    pub fn storage_key(&self) -> &'static str {
        match self {
            FavoriteKind::Artist => "favorites_artist",
            FavoriteKind::Tag => "favorites_tag",
            FavoriteKind::Search => "favorites_search",
        }
    }

    pub fn from_storage_key(key: &str) -> Option<FavoriteKind> {
        FavoriteKind::ALL.into_iter().find(|kind| kind.storage_key() == key)
    }
}

impl fmt::Display for FavoriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single favorite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub date_added: i64,
    #[serde(default)]
    pub frequency: u64,
}

impl FavoriteRecord {
    pub fn new(name: String, url: String, date_added: i64) -> FavoriteRecord {
        FavoriteRecord {
            name,
            url,
            date_added,
            frequency: 0,
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// The three favorite lists, in display order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Favorites {
    #[serde(default)]
    pub artist: Vec<FavoriteRecord>,
    #[serde(default)]
    pub tag: Vec<FavoriteRecord>,
    #[serde(default)]
    pub search: Vec<FavoriteRecord>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, kind: FavoriteKind) -> &Vec<FavoriteRecord> {
        match kind {
            FavoriteKind::Artist => &self.artist,
            FavoriteKind::Tag => &self.tag,
            FavoriteKind::Search => &self.search,
        }
    }

    pub fn list_mut(&mut self, kind: FavoriteKind) -> &mut Vec<FavoriteRecord> {
        match kind {
            FavoriteKind::Artist => &mut self.artist,
            FavoriteKind::Tag => &mut self.tag,
            FavoriteKind::Search => &mut self.search,
        }
    }

    pub fn total(&self) -> usize {
        self.artist.len() + self.tag.len() + self.search.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Case-insensitive lookup by name
    pub fn position(&self, kind: FavoriteKind, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        self.list(kind)
            .iter()
            .position(|record| record.name.to_lowercase() == needle)
    }

    pub fn contains(&self, kind: FavoriteKind, name: &str) -> bool {
        self.position(kind, name).is_some()
    }

    pub fn position_by_url(&self, kind: FavoriteKind, url: &str) -> Option<usize> {
        self.list(kind).iter().position(|record| record.url == url)
    }
}

/// Move the element at `from` so that it ends up at index `to`.
/// Returns false when either index is out of bounds.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    true
}

/// Display order choices of the popup lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Manual,
    Alphabetical,
    Newest,
    MostUsed,
}

impl SortOrder {
    pub fn from_value(value: &str) -> SortOrder {
        match value {
            "alphabetical" => SortOrder::Alphabetical,
            "date" => SortOrder::Newest,
            "frequency" => SortOrder::MostUsed,
            _ => SortOrder::Manual,
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            SortOrder::Manual => "manual",
            SortOrder::Alphabetical => "alphabetical",
            SortOrder::Newest => "date",
            SortOrder::MostUsed => "frequency",
        }
    }
}

/// Filter by a case-insensitive substring of the name, then sort.
///
/// Returns `(original_index, record)` pairs so callers can still address
/// the stored list (remove, touch, reorder) after filtering.
pub fn filter_and_sort<'a>(
    records: &'a [FavoriteRecord],
    query: &str,
    order: SortOrder,
) -> Vec<(usize, &'a FavoriteRecord)> {
    let query = query.to_lowercase();
    let mut filtered: Vec<(usize, &FavoriteRecord)> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.name.to_lowercase().contains(&query))
        .collect();

    // sort_by is stable, so ties keep the manual order
    match order {
        SortOrder::Manual => {}
        SortOrder::Alphabetical => {
            filtered.sort_by(|a, b| a.1.name.to_lowercase().cmp(&b.1.name.to_lowercase()))
        }
        SortOrder::Newest => filtered.sort_by(|a, b| b.1.date_added.cmp(&a.1.date_added)),
        SortOrder::MostUsed => filtered.sort_by(|a, b| b.1.frequency.cmp(&a.1.frequency)),
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, date_added: i64, frequency: u64) -> FavoriteRecord {
        FavoriteRecord {
            name: name.to_string(),
            url: format!("https://e621.net/posts?tags={}", name),
            date_added,
            frequency,
        }
    }

    #[test]
    fn test_kind_storage_keys() {
        assert_eq!(FavoriteKind::Artist.storage_key(), "favorites_artist");
        assert_eq!(FavoriteKind::from_storage_key("favorites_search"), Some(FavoriteKind::Search));
        assert_eq!(FavoriteKind::from_storage_key("settings"), None);
    }

    #[test]
    fn test_record_wire_format() {
        let json = r#"{"name":"wolf","url":"https://e621.net/posts?tags=wolf","dateAdded":1700000000000}"#;
        let parsed: FavoriteRecord = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.date_added, 1700000000000);
        assert_eq!(parsed.frequency, 0);

        let value = serde_json::to_value(&parsed).unwrap();
        assert!(value.get("dateAdded").is_some());
    }

    #[test]
    fn test_position_is_case_insensitive() {
        let mut favorites = Favorites::new();
        favorites.tag.push(record("Wolf", 1, 0));

        assert_eq!(favorites.position(FavoriteKind::Tag, "wOLF"), Some(0));
        assert!(!favorites.contains(FavoriteKind::Artist, "wolf"));
    }

    #[test]
    fn test_move_item() {
        let mut items = vec!["a", "b", "c", "d"];

        assert!(move_item(&mut items, 0, 2));
        assert_eq!(items, vec!["b", "c", "a", "d"]);

        assert!(move_item(&mut items, 3, 0));
        assert_eq!(items, vec!["d", "b", "c", "a"]);

        assert!(!move_item(&mut items, 4, 0));
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_filter_and_sort() {
        let records = vec![
            record("wolf", 10, 1),
            record("Fox", 30, 5),
            record("arctic_wolf", 20, 3),
        ];

        let alphabetical = filter_and_sort(&records, "", SortOrder::Alphabetical);
        let names: Vec<&str> = alphabetical.iter().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["arctic_wolf", "Fox", "wolf"]);

        let newest = filter_and_sort(&records, "WOLF", SortOrder::Newest);
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].0, 2);
        assert_eq!(newest[1].0, 0);

        let most_used = filter_and_sort(&records, "", SortOrder::MostUsed);
        assert_eq!(most_used[0].1.name, "Fox");
    }

    #[test]
    fn test_sort_order_values() {
        assert_eq!(SortOrder::from_value("frequency"), SortOrder::MostUsed);
        assert_eq!(SortOrder::from_value("unknown"), SortOrder::Manual);
        assert_eq!(SortOrder::from_value(SortOrder::Newest.value()), SortOrder::Newest);
    }
}
