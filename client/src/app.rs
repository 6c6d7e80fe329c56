use std::sync::Arc;

use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use nusantara_shared::{Atlas, WikiLang, YearRange};

use crate::api;
use crate::map_view::MapView;
use crate::selection::SelectionPanel;
use crate::timeline::{Timeline, year_bounds};
use crate::view_events::ViewEventBus;
use crate::viewport::Viewport;

/// Year shown on first load, clamped into the atlas range.
pub(crate) const DEFAULT_YEAR: i32 = 1350;

/// Newtype wrappers give same-typed signals distinct Leptos context slots.
#[derive(Clone, Copy)]
pub(crate) struct AtlasData(pub RwSignal<Option<Arc<Atlas>>>);
#[derive(Clone, Copy)]
pub(crate) struct LoadError(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct SelectedYear(pub RwSignal<i32>);
#[derive(Clone, Copy)]
pub(crate) struct Playing(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct Hovered(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct Selected(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct WikiLanguage(pub RwSignal<WikiLang>);
/// Map view notifications. Handlers hold `Rc`s, so the bus stays thread-local.
#[derive(Clone, Copy)]
pub(crate) struct ViewEvents(pub StoredValue<ViewEventBus, LocalStorage>);

pub(crate) fn initial_year(bounds: YearRange) -> i32 {
    bounds.clamp(DEFAULT_YEAR)
}

fn remove_loading_shell() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    if let Some(shell) = document.get_element_by_id("app-loading-shell") {
        shell.remove();
    }
}

/// Root application component. Provides global reactive signals via context.
#[component]
pub fn App() -> impl IntoView {
    let atlas: RwSignal<Option<Arc<Atlas>>> = RwSignal::new(None);
    let load_error: RwSignal<Option<String>> = RwSignal::new(None);
    let year: RwSignal<i32> = RwSignal::new(DEFAULT_YEAR);
    let playing: RwSignal<bool> = RwSignal::new(false);
    let hovered: RwSignal<Option<String>> = RwSignal::new(None);
    let selected: RwSignal<Option<String>> = RwSignal::new(None);
    let wiki_lang: RwSignal<WikiLang> = RwSignal::new(WikiLang::default());
    let viewport: RwSignal<Viewport> = RwSignal::new(Viewport::default());
    let events: StoredValue<ViewEventBus, LocalStorage> =
        StoredValue::new_local(ViewEventBus::new());

    provide_context(AtlasData(atlas));
    provide_context(LoadError(load_error));
    provide_context(SelectedYear(year));
    provide_context(Playing(playing));
    provide_context(Hovered(hovered));
    provide_context(Selected(selected));
    provide_context(WikiLanguage(wiki_lang));
    provide_context(ViewEvents(events));
    provide_context(viewport);

    spawn_local(async move {
        match api::fetch_atlas().await {
            Ok(loaded) => {
                year.set(initial_year(year_bounds(&loaded)));
                atlas.set(Some(Arc::new(loaded)));
            }
            Err(e) => {
                web_sys::console::error_1(&format!("atlas load failed: {e}").into());
                load_error.set(Some(e));
            }
        }
        remove_loading_shell();
    });

    // A selection that no longer exists in the visible year is dropped.
    Effect::new(move || {
        let year = year.get();
        let Some(id) = selected.get_untracked() else {
            return;
        };
        let still_active = atlas.with(|atlas| {
            atlas
                .as_ref()
                .is_some_and(|atlas| atlas.active_set(year).iter().any(|t| t.empire.id == id))
        });
        if !still_active {
            selected.set(None);
        }
    });

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden; background: #9ec5d6;">
            <MapView />
            <ErrorBanner />
            <Legend />
            <SelectionPanel />
            <Timeline />
        </div>
    }
}

#[component]
fn ErrorBanner() -> impl IntoView {
    let LoadError(load_error) = expect_context();

    move || {
        load_error.get().map(|message| {
            view! {
                <div
                    class="error-banner"
                    style="position: absolute; top: 12px; left: 50%; transform: translateX(-50%); z-index: 30; \
                           padding: 8px 16px; border-radius: 4px; background: #7a1f1f; color: #fff; font-family: Georgia, serif;"
                >
                    {format!("Could not load the empire atlas ({message}).")}
                </div>
            }
        })
    }
}

/// Active empires for the selected year with their current era color.
#[component]
fn Legend() -> impl IntoView {
    let AtlasData(atlas) = expect_context();
    let SelectedYear(year) = expect_context();
    let Selected(selected) = expect_context();

    let entries = Memo::new(move |_| {
        let year = year.get();
        atlas.with(|atlas| {
            let Some(atlas) = atlas else {
                return Vec::new();
            };
            atlas
                .active_set(year)
                .iter()
                .map(|territory| {
                    let info = atlas.territory_info(&territory.empire.id, year);
                    (info.id, info.name, info.color)
                })
                .collect::<Vec<_>>()
        })
    });

    view! {
        <div
            class="legend"
            style="position: absolute; top: 12px; right: 12px; z-index: 20; min-width: 180px; padding: 10px 12px; \
                   background: rgba(20, 24, 32, 0.82); color: #eee; border-radius: 6px; font-family: Georgia, serif;"
        >
            <div style="font-weight: bold; margin-bottom: 6px;">{move || format!("Empires in {}", year.get())}</div>
            <Show
                when=move || !entries.with(|e| e.is_empty())
                fallback=|| view! { <div style="opacity: 0.7; font-style: italic;">"No known empires"</div> }
            >
                <For
                    each=move || entries.get()
                    key=|(id, name, color)| (id.clone(), name.clone(), color.clone())
                    children=move |(id, name, color)| {
                        view! {
                            <div
                                style="display: flex; align-items: center; gap: 8px; cursor: pointer; padding: 2px 0;"
                                on:click=move |_| selected.set(Some(id.clone()))
                            >
                                <span style=format!(
                                    "display: inline-block; width: 14px; height: 14px; border: 1px solid #000; background: {color};"
                                ) />
                                <span>{name}</span>
                            </div>
                        }
                    }
                />
            </Show>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_year_is_clamped_into_atlas_range() {
        assert_eq!(initial_year(YearRange::new(1200, 1600)), 1350);
        assert_eq!(initial_year(YearRange::new(1400, 1500)), 1400);
        assert_eq!(initial_year(YearRange::new(1100, 1300)), 1300);
    }
}
