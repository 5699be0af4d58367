/// Popup UI: the three favorites lists with add, filter, sort, reorder,
/// import and export

use std::future::Future;
use std::rc::Rc;

use chrono::Utc;
use gloo_timers::callback::Timeout;
use patternfly_yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

use crate::browser::{
    BrowserMessenger, BrowserStorage, detach_listener, from_js, js_error, onRuntimeMessage, openUrl,
    pickJsonFile, saveTextFile,
};
use crate::errors::StoreError;
use crate::favorites::{FavoriteKind, Favorites, SortOrder, filter_and_sort};
use crate::notifier::Envelope;
use crate::store::FavoriteStore;

type PopupStore = FavoriteStore<BrowserStorage, BrowserMessenger>;

const NOTICE_MS: u32 = 3000;

#[derive(Clone, PartialEq)]
enum AppState {
    Loading,
    Ready,
    Error(String),
}

#[derive(Clone, PartialEq)]
struct Notice {
    text: String,
    error: bool,
}

fn show_notice(notice: &UseStateHandle<Option<Notice>>, text: String, error: bool) {
    notice.set(Some(Notice { text, error }));
    let notice = notice.clone();
    Timeout::new(NOTICE_MS, move || notice.set(None)).forget();
}

/// Run a store action, then re-render the lists and report the outcome
fn spawn_action<F, Fut>(
    store: Rc<PopupStore>,
    favorites: UseStateHandle<Favorites>,
    notice: UseStateHandle<Option<Notice>>,
    action: F,
) where
    F: FnOnce(Rc<PopupStore>) -> Fut + 'static,
    Fut: Future<Output = Result<Option<String>, StoreError>> + 'static,
{
    spawn_local(async move {
        let result = action(store.clone()).await;
        favorites.set(store.favorites());
        match result {
            Ok(Some(message)) => show_notice(&notice, message, false),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Popup action failed: {}", e);
                show_notice(&notice, e.to_string(), true);
            }
        }
    });
}

async fn pick_file() -> Result<Option<String>, StoreError> {
    let value = pickJsonFile()
        .await
        .map_err(|e| StoreError::ImportFormat(js_error(&e)))?;
    Ok(value.as_string())
}

#[function_component(App)]
pub fn app() -> Html {
    let store = use_memo((), |_| {
        FavoriteStore::new(BrowserStorage, BrowserMessenger::with_tabs())
    });
    let state = use_state(|| AppState::Loading);
    let favorites = use_state(Favorites::new);
    let active_kind = use_state(|| FavoriteKind::Artist);
    let input = use_state(String::new);
    let filter = use_state(String::new);
    let sort = use_state(SortOrder::default);
    let notice = use_state(|| None::<Notice>);

    // Load on mount and follow changes made in other contexts
    {
        let store = store.clone();
        let state = state.clone();
        let favorites = favorites.clone();
        use_effect_with((), move |_| {
            {
                let store = store.clone();
                let favorites = favorites.clone();
                spawn_local(async move {
                    match store.load().await {
                        Ok(()) => {
                            favorites.set(store.favorites());
                            state.set(AppState::Ready);
                        }
                        Err(e) => state.set(AppState::Error(format!("Failed to load: {}", e))),
                    }
                });
            }

            let listener = Closure::wrap(Box::new(move |message: JsValue, _from_tab: bool| {
                if let Ok(envelope) = from_js::<Envelope>(message) {
                    if !envelope.is_from(store.context_id()) && envelope.message.is_change() {
                        let store = store.clone();
                        let favorites = favorites.clone();
                        spawn_local(async move {
                            if store.reload().await.is_ok() {
                                favorites.set(store.favorites());
                            }
                        });
                    }
                }
                JsValue::UNDEFINED
            }) as Box<dyn FnMut(JsValue, bool) -> JsValue>);
            let remove_listener = onRuntimeMessage(&listener);

            move || {
                detach_listener(&remove_listener);
                drop(listener);
            }
        });
    }

    let kind = *active_kind;

    let on_tab_click = {
        let active_kind = active_kind.clone();
        let filter = filter.clone();
        move |kind: FavoriteKind| {
            let active_kind = active_kind.clone();
            let filter = filter.clone();
            Callback::from(move |_: MouseEvent| {
                active_kind.set(kind);
                filter.set(String::new());
            })
        }
    };

    let on_input = {
        let input = input.clone();
        Callback::from(move |e: InputEvent| {
            let target: HtmlInputElement = e.target_unchecked_into();
            input.set(target.value());
        })
    };

    let on_filter = {
        let filter = filter.clone();
        Callback::from(move |e: InputEvent| {
            let target: HtmlInputElement = e.target_unchecked_into();
            filter.set(target.value());
        })
    };

    let on_sort = {
        let sort = sort.clone();
        Callback::from(move |e: Event| {
            let target: HtmlSelectElement = e.target_unchecked_into();
            sort.set(SortOrder::from_value(&target.value()));
        })
    };

    let on_add = {
        let store = store.clone();
        let favorites = favorites.clone();
        let notice = notice.clone();
        let input = input.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            let name = (*input).clone();
            let input = input.clone();
            spawn_action(store.clone(), favorites.clone(), notice.clone(), move |store| async move {
                let record = store.add(kind, &name).await?;
                input.set(String::new());
                Ok(Some(format!("Added \"{}\"", record.name)))
            });
        })
    };

    let on_remove = {
        let store = store.clone();
        let favorites = favorites.clone();
        let notice = notice.clone();
        move |index: usize| {
            let store = store.clone();
            let favorites = favorites.clone();
            let notice = notice.clone();
            Callback::from(move |_: MouseEvent| {
                spawn_action(store.clone(), favorites.clone(), notice.clone(), move |store| async move {
                    let removed = store.remove(kind, index).await?;
                    Ok(Some(format!("Removed \"{}\"", removed.name)))
                });
            })
        }
    };

    let on_move = {
        let store = store.clone();
        let favorites = favorites.clone();
        let notice = notice.clone();
        move |from: usize, to: usize| {
            let store = store.clone();
            let favorites = favorites.clone();
            let notice = notice.clone();
            Callback::from(move |_: MouseEvent| {
                spawn_action(store.clone(), favorites.clone(), notice.clone(), move |store| async move {
                    store.reorder(kind, from, to).await?;
                    Ok(None)
                });
            })
        }
    };

    let on_open = {
        let store = store.clone();
        let favorites = favorites.clone();
        let notice = notice.clone();
        move |index: usize, url: String| {
            let store = store.clone();
            let favorites = favorites.clone();
            let notice = notice.clone();
            Callback::from(move |e: MouseEvent| {
                e.prevent_default();
                let url = url.clone();
                spawn_action(store.clone(), favorites.clone(), notice.clone(), move |store| async move {
                    store.touch(kind, index).await?;
                    openUrl(&url);
                    Ok(None)
                });
            })
        }
    };

    let on_export_kind = {
        let store = store.clone();
        let notice = notice.clone();
        Callback::from(move |_| match store.export_kind(kind) {
            Ok(file) => saveTextFile(&file.contents, &file.file_name),
            Err(e) => show_notice(&notice, e.to_string(), true),
        })
    };

    let on_import_kind = {
        let store = store.clone();
        let favorites = favorites.clone();
        let notice = notice.clone();
        Callback::from(move |_| {
            spawn_action(store.clone(), favorites.clone(), notice.clone(), move |store| async move {
                let Some(text) = pick_file().await? else {
                    return Ok(None);
                };
                let added = store.import_kind(kind, &text).await?;
                Ok(Some(format!("Imported {} {} favorites", added, kind)))
            });
        })
    };

    let on_export_all = {
        let store = store.clone();
        let notice = notice.clone();
        Callback::from(move |_| match store.export_all(Utc::now()) {
            Ok(file) => saveTextFile(&file.contents, &file.file_name),
            Err(e) => show_notice(&notice, e.to_string(), true),
        })
    };

    let on_import_all = {
        let store = store.clone();
        let favorites = favorites.clone();
        let notice = notice.clone();
        Callback::from(move |_| {
            spawn_action(store.clone(), favorites.clone(), notice.clone(), move |store| async move {
                let Some(text) = pick_file().await? else {
                    return Ok(None);
                };
                let counts = store.import_all(&text).await?;
                Ok(Some(format!(
                    "Imported {} artists, {} tags, {} searches",
                    counts.artist, counts.tag, counts.search
                )))
            });
        })
    };

    let is_ready = *state == AppState::Ready;
    let already = {
        let name = input.trim();
        !name.is_empty() && favorites.contains(kind, name)
    };
    let reorderable = *sort == SortOrder::Manual && filter.is_empty();
    let list = favorites.list(kind);
    let rows = filter_and_sort(list, &filter, *sort);
    let limit = store.settings().favorites_limit;

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"e621 Favorites"}</h1>

            // Tab navigation
            <div class="pf-v5-c-tabs tabs-nav">
                <ul class="pf-v5-c-tabs__list">
                    {for FavoriteKind::ALL.into_iter().map(|tab| html! {
                        <li class={if tab == kind { "pf-v5-c-tabs__item pf-m-current" } else { "pf-v5-c-tabs__item" }}>
                            <button class="pf-v5-c-tabs__link" onclick={on_tab_click(tab)}>
                                <span class="pf-v5-c-tabs__item-text">
                                    {format!("{} ({})", tab_label(tab), favorites.list(tab).len())}
                                </span>
                            </button>
                        </li>
                    })}
                </ul>
            </div>

            if let Some(current) = (*notice).clone() {
                <div class="message-top-margin">
                    <Alert
                        r#type={if current.error { AlertType::Danger } else { AlertType::Success }}
                        title={current.text}
                        inline={true}
                    >
                    </Alert>
                </div>
            }

            {match &*state {
                AppState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                AppState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                AppState::Ready => html! {},
            }}

            <div class="tab-pane-content">
                <form class="add-form" onsubmit={on_add}>
                    <input
                        class="pf-v5-c-form-control"
                        type="text"
                        placeholder={format!("Add {}...", kind)}
                        value={(*input).clone()}
                        oninput={on_input}
                        disabled={!is_ready}
                    />
                    <Button r#type={ButtonType::Submit} variant={ButtonVariant::Primary} disabled={!is_ready || already}>
                        {"Add"}
                    </Button>
                </form>
                if already {
                    <p class="already-text">{"Already in favorites"}</p>
                }

                <div class="list-controls">
                    <input
                        class="pf-v5-c-form-control"
                        type="search"
                        placeholder="Filter..."
                        value={(*filter).clone()}
                        oninput={on_filter}
                    />
                    <select class="pf-v5-c-form-control" onchange={on_sort}>
                        {for [SortOrder::Manual, SortOrder::Alphabetical, SortOrder::Newest, SortOrder::MostUsed]
                            .into_iter()
                            .map(|order| html! {
                                <option value={order.value()} selected={order == *sort}>{sort_label(order)}</option>
                            })}
                    </select>
                </div>

                if rows.is_empty() {
                    <p class="empty-text">{"No favorites yet"}</p>
                } else {
                    <ul class="favorites-list">
                        {for rows.iter().map(|(index, record)| {
                            let index = *index;
                            html! {
                                <li class="favorite-item" key={record.name.clone()}>
                                    <a href={record.url.clone()} onclick={on_open(index, record.url.clone())}>
                                        {&record.name}
                                    </a>
                                    if record.frequency > 0 {
                                        <span class="favorite-frequency">{record.frequency}</span>
                                    }
                                    if reorderable {
                                        <Button
                                            variant={ButtonVariant::Plain}
                                            disabled={index == 0}
                                            onclick={on_move(index, index.saturating_sub(1))}
                                        >
                                            {"▲"}
                                        </Button>
                                        <Button
                                            variant={ButtonVariant::Plain}
                                            disabled={index + 1 >= list.len()}
                                            onclick={on_move(index, index + 1)}
                                        >
                                            {"▼"}
                                        </Button>
                                    }
                                    <Button variant={ButtonVariant::Danger} onclick={on_remove(index)}>
                                        {"Delete"}
                                    </Button>
                                </li>
                            }
                        })}
                    </ul>
                }

                <div class="flex-column-gap">
                    <Button onclick={on_export_kind} disabled={!is_ready} variant={ButtonVariant::Secondary} block={true}>
                        {format!("Export {}", tab_label(kind))}
                    </Button>
                    <Button onclick={on_import_kind} disabled={!is_ready} variant={ButtonVariant::Secondary} block={true}>
                        {format!("Import {}", tab_label(kind))}
                    </Button>
                    <Button onclick={on_export_all} disabled={!is_ready} variant={ButtonVariant::Secondary} block={true}>
                        {"Export everything"}
                    </Button>
                    <Button onclick={on_import_all} disabled={!is_ready} variant={ButtonVariant::Secondary} block={true}>
                        {"Import everything"}
                    </Button>
                </div>
            </div>

            <p class="footer-popup">
                {format!("{} / {} {}", list.len(), limit, kind)}
            </p>
        </div>
    }
}

fn tab_label(kind: FavoriteKind) -> &'static str {
    match kind {
        FavoriteKind::Artist => "Artists",
        FavoriteKind::Tag => "Tags",
        FavoriteKind::Search => "Searches",
    }
}

fn sort_label(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Manual => "Manual",
        SortOrder::Alphabetical => "A-Z",
        SortOrder::Newest => "Newest",
        SortOrder::MostUsed => "Most used",
    }
}
