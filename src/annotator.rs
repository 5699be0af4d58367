/// Heart injection and refresh over an abstract page
///
/// The annotator never keeps its own view of which hearts are filled: every
/// pass re-derives the state from the favorites it is handed. Scans skip rows
/// that already carry a heart, so a pass over an unchanged page inserts nothing
/// and the mutation observer that triggers it does not loop on its own output.
use crate::favorites::{FavoriteKind, Favorites};
use crate::page::PageFeatures;
use crate::search::{extract_search_name, normalize_search_url};
use crate::settings::Settings;

/// Names longer than this are treated as scraped garbage and cut
pub const MAX_NAME_CHARS: usize = 100;

pub const SEARCH_HEART_COLOR: &str = "#ff0000";

/// Tag category, from the CSS classes of a tag row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    Artist,
    Contributor,
    Copyright,
    Character,
    Species,
    General,
    Lore,
    Pool,
}

impl TagCategory {
    pub fn from_classes<S: AsRef<str>>(classes: &[S]) -> TagCategory {
        let has = |class: &str| classes.iter().any(|c| c.as_ref() == class);
        if has("tag-artist") {
            TagCategory::Artist
        } else if has("tag-contributor") {
            TagCategory::Contributor
        } else if has("tag-copyright") {
            TagCategory::Copyright
        } else if has("tag-character") {
            TagCategory::Character
        } else if has("tag-species") {
            TagCategory::Species
        } else if has("tag-lore") {
            TagCategory::Lore
        } else if has("tag-pool") {
            TagCategory::Pool
        } else {
            TagCategory::General
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            TagCategory::Artist => "#f2ac08",
            TagCategory::Contributor => "#c0c0c0",
            TagCategory::Copyright => "#d0d",
            TagCategory::Character => "#0a0",
            TagCategory::Species => "#ed5d1f",
            TagCategory::General => "#b4c7d9",
            TagCategory::Lore => "#282",
            TagCategory::Pool => "wheat",
        }
    }
}

/// One tag entry found on the page
#[derive(Debug, Clone)]
pub struct TagRow<E> {
    /// Element the heart is attached to
    pub element: E,
    /// Row sits in the artist tag list
    pub in_artist_list: bool,
    /// Classes of the row element
    pub classes: Vec<String>,
    /// Direct text nodes of the name element
    pub text_nodes: Vec<String>,
    /// Text of the name element with the count badge removed
    pub text: String,
}

/// A heart control and the state it should show
#[derive(Debug, Clone, PartialEq)]
pub struct Heart {
    pub kind: FavoriteKind,
    pub name: String,
    pub color: String,
    pub favorite: bool,
    pub size: u32,
}

/// The page operations the annotator needs
pub trait PageDom {
    type Element: Clone;

    fn tag_rows(&self) -> Vec<TagRow<Self::Element>>;
    /// Whether the row already carries a heart marker
    fn has_heart(&self, row: &Self::Element) -> bool;
    fn attach_heart(&mut self, row: &Self::Element, heart: &Heart);
    /// Every tag heart on the page, with the binding it was created with
    fn hearts(&self) -> Vec<(Self::Element, Heart)>;
    fn render_heart(&mut self, element: &Self::Element, heart: &Heart);

    fn search_form(&self) -> Option<Self::Element>;
    fn search_heart(&self) -> Option<Self::Element>;
    fn attach_search_heart(&mut self, form: &Self::Element, heart: &Heart);

    /// Remove every heart and marker. Returns how many hearts were removed.
    fn remove_hearts(&mut self) -> usize;

    /// Short-lived message on the page, e.g. a failed heart click
    fn show_notice(&mut self, text: &str, error: bool);
}

/// Clean a scraped name: first line only, whitespace collapsed, length capped
pub fn clean_name(raw: &str) -> Option<String> {
    let first_line = raw.trim().lines().next().unwrap_or("");
    let collapsed = first_line.split_whitespace().collect::<Vec<&str>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    let name = capped.trim_end();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Display name of a row. Artist rows prefer the first direct text node,
/// which comes before any badge or icon.
pub fn row_name<E>(row: &TagRow<E>) -> Option<String> {
    if row.in_artist_list {
        if let Some(text) = row.text_nodes.iter().find(|t| !t.trim().is_empty()) {
            return clean_name(text);
        }
    }
    clean_name(&row.text)
}

fn row_kind<E>(row: &TagRow<E>) -> (FavoriteKind, TagCategory) {
    let category = TagCategory::from_classes(&row.classes);
    if row.in_artist_list && category == TagCategory::Artist {
        (FavoriteKind::Artist, category)
    } else {
        (FavoriteKind::Tag, category)
    }
}

fn search_heart_state(favorites: &Favorites, settings: &Settings, page_url: &str) -> Heart {
    let favorite = normalize_search_url(page_url)
        .map(|canonical| {
            favorites
                .position_by_url(FavoriteKind::Search, &canonical)
                .is_some()
        })
        .unwrap_or(false);

    Heart {
        kind: FavoriteKind::Search,
        name: extract_search_name(page_url).unwrap_or_default(),
        color: SEARCH_HEART_COLOR.to_string(),
        favorite,
        size: settings.search_icon_size(),
    }
}

/// Attach hearts to every row and the search form that lack one.
/// Returns the number of hearts inserted.
pub fn annotate<D: PageDom>(
    dom: &mut D,
    favorites: &Favorites,
    settings: &Settings,
    page_url: &str,
) -> usize {
    let mut inserted = 0;

    for row in dom.tag_rows() {
        if dom.has_heart(&row.element) {
            continue;
        }
        let Some(name) = row_name(&row) else {
            continue;
        };
        let (kind, category) = row_kind(&row);

        let heart = Heart {
            kind,
            favorite: favorites.contains(kind, &name),
            name,
            color: category.color().to_string(),
            size: settings.icon_size,
        };
        dom.attach_heart(&row.element, &heart);
        inserted += 1;
    }

    if dom.search_heart().is_none() {
        if let Some(form) = dom.search_form() {
            let heart = search_heart_state(favorites, settings, page_url);
            dom.attach_search_heart(&form, &heart);
            inserted += 1;
        }
    }

    if inserted > 0 {
        log::debug!("Attached {} hearts", inserted);
    }
    inserted
}

/// Re-derive every tag heart's fill and size from the favorites
pub fn refresh_hearts<D: PageDom>(dom: &mut D, favorites: &Favorites, settings: &Settings) {
    for (element, heart) in dom.hearts() {
        let updated = Heart {
            favorite: favorites.contains(heart.kind, &heart.name),
            size: settings.icon_size,
            ..heart
        };
        dom.render_heart(&element, &updated);
    }
}

/// Re-derive the search heart for the page currently shown
pub fn refresh_search_heart<D: PageDom>(
    dom: &mut D,
    favorites: &Favorites,
    settings: &Settings,
    page_url: &str,
) {
    if let Some(element) = dom.search_heart() {
        let heart = search_heart_state(favorites, settings, page_url);
        dom.render_heart(&element, &heart);
    }
}

/// Bring the page in line with its features: annotate when hearts are on,
/// strip them when off. Returns hearts inserted.
pub fn apply_page_policy<D: PageDom>(
    dom: &mut D,
    features: &PageFeatures,
    favorites: &Favorites,
    settings: &Settings,
    page_url: &str,
) -> usize {
    if features.hearts {
        annotate(dom, favorites, settings, page_url)
    } else {
        let removed = dom.remove_hearts();
        if removed > 0 {
            log::debug!("Removed {} hearts", removed);
        }
        0
    }
}

/// Distinct artist names on the page, in document order
pub fn detect_artists<D: PageDom>(dom: &D) -> Vec<String> {
    let mut artists: Vec<String> = Vec::new();
    for row in dom.tag_rows() {
        if row_kind(&row).0 != FavoriteKind::Artist {
            continue;
        }
        if let Some(name) = row_name(&row) {
            if !artists.contains(&name) {
                artists.push(name);
            }
        }
    }
    artists
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FakeElement {
        Row(usize),
        Search,
    }

    #[derive(Debug, Clone, Default)]
    pub struct FakeRow {
        pub in_artist_list: bool,
        pub classes: Vec<String>,
        pub text_nodes: Vec<String>,
        pub text: String,
        pub heart: Option<Heart>,
    }

    /// In-memory page: tag rows plus an optional search form
    #[derive(Debug, Clone, Default)]
    pub struct FakePage {
        pub rows: Vec<FakeRow>,
        pub has_search_form: bool,
        pub search_heart: Option<Heart>,
        pub renders: usize,
        pub notices: Vec<(String, bool)>,
    }

    impl FakePage {
        pub fn artist(mut self, text_nodes: &[&str], text: &str) -> Self {
            self.rows.push(FakeRow {
                in_artist_list: true,
                classes: vec!["tag-list-item".to_string(), "tag-artist".to_string()],
                text_nodes: text_nodes.iter().map(|t| t.to_string()).collect(),
                text: text.to_string(),
                heart: None,
            });
            self
        }

        pub fn tag(mut self, class: &str, text: &str) -> Self {
            self.rows.push(FakeRow {
                in_artist_list: false,
                classes: vec!["tag-list-item".to_string(), class.to_string()],
                text_nodes: vec![text.to_string()],
                text: text.to_string(),
                heart: None,
            });
            self
        }

        pub fn with_search_form(mut self) -> Self {
            self.has_search_form = true;
            self
        }

        pub fn heart_count(&self) -> usize {
            self.rows.iter().filter(|r| r.heart.is_some()).count()
                + usize::from(self.search_heart.is_some())
        }

        pub fn heart_for(&self, name: &str) -> Option<&Heart> {
            self.rows
                .iter()
                .filter_map(|r| r.heart.as_ref())
                .find(|h| h.name == name)
        }
    }

    impl PageDom for FakePage {
        type Element = FakeElement;

        fn tag_rows(&self) -> Vec<TagRow<FakeElement>> {
            self.rows
                .iter()
                .enumerate()
                .map(|(i, row)| TagRow {
                    element: FakeElement::Row(i),
                    in_artist_list: row.in_artist_list,
                    classes: row.classes.clone(),
                    text_nodes: row.text_nodes.clone(),
                    text: row.text.clone(),
                })
                .collect()
        }

        fn has_heart(&self, row: &FakeElement) -> bool {
            match row {
                FakeElement::Row(i) => self.rows[*i].heart.is_some(),
                FakeElement::Search => self.search_heart.is_some(),
            }
        }

        fn attach_heart(&mut self, row: &FakeElement, heart: &Heart) {
            if let FakeElement::Row(i) = row {
                self.rows[*i].heart = Some(heart.clone());
            }
        }

        fn hearts(&self) -> Vec<(FakeElement, Heart)> {
            self.rows
                .iter()
                .enumerate()
                .filter_map(|(i, row)| row.heart.clone().map(|h| (FakeElement::Row(i), h)))
                .collect()
        }

        fn render_heart(&mut self, element: &FakeElement, heart: &Heart) {
            self.renders += 1;
            match element {
                FakeElement::Row(i) => self.rows[*i].heart = Some(heart.clone()),
                FakeElement::Search => self.search_heart = Some(heart.clone()),
            }
        }

        fn search_form(&self) -> Option<FakeElement> {
            self.has_search_form.then_some(FakeElement::Search)
        }

        fn search_heart(&self) -> Option<FakeElement> {
            self.search_heart.as_ref().map(|_| FakeElement::Search)
        }

        fn attach_search_heart(&mut self, _form: &FakeElement, heart: &Heart) {
            self.search_heart = Some(heart.clone());
        }

        fn show_notice(&mut self, text: &str, error: bool) {
            self.notices.push((text.to_string(), error));
        }

        fn remove_hearts(&mut self) -> usize {
            let removed = self.heart_count();
            for row in &mut self.rows {
                row.heart = None;
            }
            self.search_heart = None;
            removed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakePage;
    use super::*;
    use crate::favorites::FavoriteRecord;
    use crate::page::{PageKind, PageFeatures};

    fn favorite(name: &str, url: &str) -> FavoriteRecord {
        FavoriteRecord::new(name.to_string(), url.to_string(), 1)
    }

    fn sample_page() -> FakePage {
        FakePage::default()
            .artist(&["  somebody  ", "ARTIST"], "somebody ARTIST 1.2k")
            .tag("tag-species", "wolf")
            .tag("tag-character", "  some   character ")
            .tag("tag-general", "")
            .with_search_form()
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  red   panda \n 2.1k"), Some("red panda".to_string()));
        assert_eq!(clean_name("   \n  "), None);

        let long = "x".repeat(250);
        assert_eq!(clean_name(&long).map(|n| n.chars().count()), Some(MAX_NAME_CHARS));
    }

    #[test]
    fn test_tag_category_colors() {
        assert_eq!(TagCategory::from_classes(&["tag-list-item", "tag-species"]), TagCategory::Species);
        assert_eq!(TagCategory::from_classes(&["tag-list-item"]), TagCategory::General);
        assert_eq!(TagCategory::Species.color(), "#ed5d1f");
        assert_eq!(TagCategory::Pool.color(), "wheat");
    }

    #[test]
    fn test_annotate_attaches_hearts() {
        let mut page = sample_page();
        let mut favorites = Favorites::new();
        favorites.tag.push(favorite("Wolf", "u"));

        let inserted = annotate(&mut page, &favorites, &Settings::default(), "https://e621.net/posts/1");

        // empty general row is skipped
        assert_eq!(inserted, 4);

        let artist = page.heart_for("somebody").unwrap();
        assert_eq!(artist.kind, FavoriteKind::Artist);
        assert_eq!(artist.color, "#f2ac08");
        assert!(!artist.favorite);

        let wolf = page.heart_for("wolf").unwrap();
        assert_eq!(wolf.kind, FavoriteKind::Tag);
        assert!(wolf.favorite);
        assert_eq!(wolf.size, 20);

        assert!(page.heart_for("some character").is_some());
        assert_eq!(page.search_heart.as_ref().unwrap().size, 24);
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let mut page = sample_page();
        let favorites = Favorites::new();
        let settings = Settings::default();

        let first = annotate(&mut page, &favorites, &settings, "https://e621.net/posts");
        let count_once = page.heart_count();
        let second = annotate(&mut page, &favorites, &settings, "https://e621.net/posts");

        assert!(first > 0);
        assert_eq!(second, 0);
        assert_eq!(page.heart_count(), count_once);
    }

    #[test]
    fn test_annotate_picks_up_new_rows_only() {
        let mut page = sample_page();
        let favorites = Favorites::new();
        let settings = Settings::default();
        annotate(&mut page, &favorites, &settings, "/posts");

        page = page.tag("tag-lore", "lore entry");
        let inserted = annotate(&mut page, &favorites, &settings, "/posts");

        assert_eq!(inserted, 1);
        assert_eq!(page.heart_for("lore entry").unwrap().color, "#282");
    }

    #[test]
    fn test_refresh_follows_favorites() {
        let mut page = sample_page();
        let mut favorites = Favorites::new();
        let settings = Settings::default();
        annotate(&mut page, &favorites, &settings, "/posts");
        assert!(!page.heart_for("wolf").unwrap().favorite);

        favorites.tag.push(favorite("WOLF", "u"));
        let bigger = Settings {
            icon_size: 30,
            ..Settings::default()
        };
        refresh_hearts(&mut page, &favorites, &bigger);

        let wolf = page.heart_for("wolf").unwrap();
        assert!(wolf.favorite);
        assert_eq!(wolf.size, 30);

        favorites.tag.clear();
        refresh_hearts(&mut page, &favorites, &bigger);
        assert!(!page.heart_for("wolf").unwrap().favorite);
    }

    #[test]
    fn test_search_heart_uses_canonical_url() {
        let mut page = sample_page();
        let mut favorites = Favorites::new();
        favorites.search.push(favorite("foo bar", "https://e621.net/posts?tags=foo+bar"));
        let settings = Settings::default();

        annotate(&mut page, &favorites, &settings, "https://e621.net/posts/123?q=foo+bar");
        let heart = page.search_heart.clone().unwrap();
        assert!(heart.favorite);
        assert_eq!(heart.name, "foo bar");

        refresh_search_heart(&mut page, &favorites, &settings, "https://e621.net/posts?tags=other");
        assert!(!page.search_heart.as_ref().unwrap().favorite);
    }

    #[test]
    fn test_policy_removes_hearts_on_list_pages() {
        let mut page = sample_page();
        let favorites = Favorites::new();
        let settings = Settings {
            disable_hearts_on_list_page: true,
            ..Settings::default()
        };

        let on_detail = PageFeatures::for_page(PageKind::Detail, &settings);
        apply_page_policy(&mut page, &on_detail, &favorites, &settings, "/posts/1");
        assert!(page.heart_count() > 0);

        let on_list = PageFeatures::for_page(PageKind::List, &settings);
        let inserted = apply_page_policy(&mut page, &on_list, &favorites, &settings, "/posts");
        assert_eq!(inserted, 0);
        assert_eq!(page.heart_count(), 0);
    }

    #[test]
    fn test_detect_artists() {
        let page = FakePage::default()
            .artist(&["first"], "first")
            .tag("tag-artist", "not in artist list")
            .artist(&[], "  second\n badge")
            .artist(&["first"], "first");

        assert_eq!(detect_artists(&page), vec!["first".to_string(), "second".to_string()]);
    }
}
