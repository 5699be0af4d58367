/// The live site page as a `PageDom`
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Node, NodeList};

use crate::annotator::{Heart, PageDom, TagRow};
use crate::favorites::FavoriteKind;

const ARTIST_NAMES: &str =
    ".tag-list.artist-tag-list .tag-list-item.tag-artist .tag-list-search .tag-list-name";
const TAG_ITEMS: &str = ".tag-list:not(.artist-tag-list) .tag-list-item";
const SEARCH_FORM: &str = ".post-search-form";

pub const HEART_CLASS: &str = "e621-heart";
pub const SEARCH_HEART_CLASS: &str = "e621-search-heart";
const HAS_HEART_CLASS: &str = "e621-has-heart";
const NOTICE_CLASS: &str = "e621-notice";
const NOTICE_MS: u32 = 3000;

const HEART_FILLED: &str = "M240,94c0,70-103.79,126.66-108.21,129a8,8,0,0,1-7.58,0C119.79,220.66,16,164,16,94A62.07,62.07,0,0,1,78,32c20.65,0,38.73,8.88,50,23.89C139.27,40.88,157.35,32,178,32A62.07,62.07,0,0,1,240,94Z";
const HEART_OUTLINE: &str = "M240,94c0,70-103.79,126.66-108.21,129a8,8,0,0,1-7.58,0C119.79,220.66,16,164,16,94A62.07,62.07,0,0,1,78,32c20.65,0,38.73,8.88,50,23.89C139.27,40.88,157.35,32,178,32A62.07,62.07,0,0,1,240,94ZM128,177.5c10.36-6.44,96-59.23,96-83.5a46,46,0,0,0-82.62-27.22L128,80l-13.38-13.22A46,46,0,0,0,32,94c0,24.27,85.64,77.06,96,83.5Z";

pub struct WebPage {
    document: Document,
}

impl WebPage {
    pub fn new(document: Document) -> Self {
        WebPage { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn select_all(&self, selector: &str) -> Vec<Element> {
        match self.document.query_selector_all(selector) {
            Ok(list) => elements(&list),
            Err(e) => {
                log::warn!("Bad selector {}: {:?}", selector, e);
                Vec::new()
            }
        }
    }

    fn select(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn create_heart(&self, class: &str, heart: &Heart) -> Option<Element> {
        let element = self.document.create_element("span").ok()?;
        element.set_class_name(class);
        element.set_attribute("data-type", heart.kind.as_str()).ok()?;
        element.set_attribute("data-name", &heart.name).ok()?;
        element.set_attribute("data-color", &heart.color).ok()?;
        Some(element)
    }
}

fn elements(list: &NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn classes(element: &Element) -> Vec<String> {
    let list = element.class_list();
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

fn direct_text_nodes(element: &Element) -> Vec<String> {
    let children = element.child_nodes();
    (0..children.length())
        .filter_map(|i| children.item(i))
        .filter(|node| node.node_type() == Node::TEXT_NODE)
        .filter_map(|node| node.text_content())
        .collect()
}

fn count_element(name: &Element) -> Option<Element> {
    name.query_selector(".tag-list-count")
        .ok()
        .flatten()
        .or_else(|| {
            name.parent_element()?
                .query_selector(".tag-list-count")
                .ok()
                .flatten()
        })
}

/// Name text with the post count removed
fn text_without_count(name: &Element) -> String {
    let text = name.text_content().unwrap_or_default();
    match count_element(name).and_then(|c| c.text_content()) {
        Some(count) if !count.is_empty() => text.replacen(&count, "", 1),
        _ => text,
    }
}

fn kind_from_attr(value: Option<String>) -> Option<FavoriteKind> {
    let value = value?;
    FavoriteKind::ALL.into_iter().find(|kind| kind.as_str() == value)
}

fn heart_markup(heart: &Heart) -> String {
    let (path, opacity) = if heart.favorite {
        (HEART_FILLED, "1")
    } else {
        (HEART_OUTLINE, "0.6")
    };
    format!(
        r#"<svg width="{size}" height="{size}" viewBox="0 0 256 256" style="width:100%;height:100%"><path d="{path}" fill="{color}" opacity="{opacity}"/></svg>"#,
        size = heart.size,
        path = path,
        color = heart.color,
        opacity = opacity,
    )
}

impl PageDom for WebPage {
    type Element = Element;

    fn tag_rows(&self) -> Vec<TagRow<Element>> {
        let mut rows = Vec::new();

        for name in self.select_all(ARTIST_NAMES) {
            let row_classes = name
                .closest(".tag-list-item")
                .ok()
                .flatten()
                .map(|item| classes(&item))
                .unwrap_or_default();
            rows.push(TagRow {
                in_artist_list: true,
                classes: row_classes,
                text_nodes: direct_text_nodes(&name),
                text: text_without_count(&name),
                element: name,
            });
        }

        for item in self.select_all(TAG_ITEMS) {
            let Some(name) = item.query_selector(".tag-list-name").ok().flatten() else {
                continue;
            };
            rows.push(TagRow {
                in_artist_list: false,
                classes: classes(&item),
                text_nodes: direct_text_nodes(&name),
                text: text_without_count(&name),
                element: name,
            });
        }

        rows
    }

    fn has_heart(&self, row: &Element) -> bool {
        let selector = format!(".{}", HEART_CLASS);
        if matches!(row.query_selector(&selector), Ok(Some(_))) {
            return true;
        }
        row.closest(".tag-list-item")
            .ok()
            .flatten()
            .map(|item| matches!(item.query_selector(&selector), Ok(Some(_))))
            .unwrap_or(false)
    }

    fn attach_heart(&mut self, row: &Element, heart: &Heart) {
        let Some(element) = self.create_heart(HEART_CLASS, heart) else {
            log::warn!("Could not create heart for {}", heart.name);
            return;
        };
        self.render_heart(&element, heart);

        let attached = match count_element(row) {
            Some(count) => count.parent_node().map(|parent| {
                let _ = parent.insert_before(&element, count.next_sibling().as_ref());
                if let Ok(parent) = parent.dyn_into::<Element>() {
                    let _ = parent.class_list().add_1(HAS_HEART_CLASS);
                }
            }),
            None => {
                let _ = row.class_list().add_1(HAS_HEART_CLASS);
                row.append_child(&element).ok().map(|_| ())
            }
        };
        if attached.is_none() {
            log::warn!("Could not attach heart for {}", heart.name);
        }
    }

    fn hearts(&self) -> Vec<(Element, Heart)> {
        self.select_all(&format!(".{}", HEART_CLASS))
            .into_iter()
            .filter_map(|element| {
                let heart = Heart {
                    kind: kind_from_attr(element.get_attribute("data-type"))?,
                    name: element.get_attribute("data-name")?,
                    color: element.get_attribute("data-color").unwrap_or_default(),
                    favorite: element.get_attribute("data-favorite").as_deref() == Some("true"),
                    size: element
                        .get_attribute("data-size")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(0),
                };
                Some((element, heart))
            })
            .collect()
    }

    fn render_heart(&mut self, element: &Element, heart: &Heart) {
        let _ = element.set_attribute("data-favorite", if heart.favorite { "true" } else { "false" });
        let _ = element.set_attribute("data-size", &heart.size.to_string());
        if heart.kind == FavoriteKind::Search {
            let _ = element.set_attribute("data-name", &heart.name);
        }
        element.set_inner_html(&heart_markup(heart));

        if let Some(html) = element.dyn_ref::<HtmlElement>() {
            let style = html.style();
            let size = format!("{}px", heart.size);
            let _ = style.set_property("width", &size);
            let _ = style.set_property("height", &size);
            let _ = style.set_property("display", "inline-flex");
            let _ = style.set_property("vertical-align", "middle");
            let _ = style.set_property("margin-left", "8px");
            let _ = style.set_property("cursor", "pointer");
        }
    }

    fn search_form(&self) -> Option<Element> {
        self.select(SEARCH_FORM)
    }

    fn search_heart(&self) -> Option<Element> {
        self.select(&format!(".{}", SEARCH_HEART_CLASS))
    }

    fn attach_search_heart(&mut self, form: &Element, heart: &Heart) {
        let Some(element) = self.create_heart(SEARCH_HEART_CLASS, heart) else {
            return;
        };
        self.render_heart(&element, heart);
        if let Err(e) = form.append_child(&element) {
            log::warn!("Could not attach search heart: {:?}", e);
        }
    }

    fn remove_hearts(&mut self) -> usize {
        let hearts = self.select_all(&format!(".{}, .{}", HEART_CLASS, SEARCH_HEART_CLASS));
        let removed = hearts.len();
        for heart in hearts {
            heart.remove();
        }
        for marked in self.select_all(&format!(".{}", HAS_HEART_CLASS)) {
            let _ = marked.class_list().remove_1(HAS_HEART_CLASS);
        }
        removed
    }

    fn show_notice(&mut self, text: &str, error: bool) {
        let (Some(body), Ok(notice)) = (self.document.body(), self.document.create_element("div")) else {
            log::warn!("Could not show notice: {}", text);
            return;
        };
        notice.set_class_name(NOTICE_CLASS);
        notice.set_text_content(Some(text));
        if let Some(html) = notice.dyn_ref::<HtmlElement>() {
            let style = html.style();
            let background = if error { "#c9190b" } else { "#3e8635" };
            let _ = style.set_property("position", "fixed");
            let _ = style.set_property("top", "16px");
            let _ = style.set_property("right", "16px");
            let _ = style.set_property("z-index", "10000");
            let _ = style.set_property("padding", "8px 12px");
            let _ = style.set_property("border-radius", "4px");
            let _ = style.set_property("color", "#fff");
            let _ = style.set_property("background", background);
        }
        if let Err(e) = body.append_child(&notice) {
            log::warn!("Could not show notice: {:?}", e);
            return;
        }
        Timeout::new(NOTICE_MS, move || notice.remove()).forget();
    }
}
