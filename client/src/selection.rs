use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use nusantara_shared::{TerritoryInfo, WikiLang, WikiSummary};

use crate::api;
use crate::app::{AtlasData, Selected, SelectedYear, WikiLanguage};

#[derive(Clone, PartialEq)]
enum WikiState {
    Idle,
    Loading,
    Loaded(WikiSummary),
    Failed(String),
}

/// Details for the selected empire plus a short Wikipedia summary.
#[component]
pub fn SelectionPanel() -> impl IntoView {
    let AtlasData(atlas) = expect_context();
    let SelectedYear(year) = expect_context();
    let Selected(selected) = expect_context();
    let WikiLanguage(lang) = expect_context();

    let wiki: RwSignal<WikiState> = RwSignal::new(WikiState::Idle);
    // Responses for an earlier selection or language are discarded.
    let wiki_nonce: RwSignal<u64> = RwSignal::new(0);

    let info = Memo::new(move |_| -> Option<TerritoryInfo> {
        let id = selected.get()?;
        let year = year.get();
        atlas.with(|atlas| atlas.as_ref().map(|atlas| atlas.territory_info(&id, year)))
    });

    let slug = Memo::new(move |_| -> Option<String> {
        let id = selected.get()?;
        atlas.with(|atlas| {
            atlas
                .as_ref()
                .and_then(|atlas| atlas.get(&id))
                .map(|empire| empire.wiki_slug().to_string())
        })
    });

    Effect::new(move || {
        let slug = slug.get();
        let lang = lang.get();
        wiki_nonce.update(|n| *n += 1);
        let nonce = wiki_nonce.get_untracked();
        let Some(slug) = slug else {
            wiki.set(WikiState::Idle);
            return;
        };
        wiki.set(WikiState::Loading);
        spawn_local(async move {
            let result = api::fetch_wiki_summary(&slug, lang).await;
            if wiki_nonce.get_untracked() != nonce {
                return;
            }
            match result {
                Ok(summary) => wiki.set(WikiState::Loaded(summary)),
                Err(e) => {
                    web_sys::console::warn_1(&format!("wiki summary for {slug}: {e}").into());
                    wiki.set(WikiState::Failed(e));
                }
            }
        });
    });

    let lang_button = move |target: WikiLang, label: &'static str| {
        view! {
            <button
                style:font-weight=move || if lang.get() == target { "bold" } else { "normal" }
                on:click=move |_| lang.set(target)
            >
                {label}
            </button>
        }
    };

    move || {
        info.get().map(|info| {
            view! {
                <div
                    class="selection-panel"
                    style="position: absolute; top: 12px; left: 64px; z-index: 20; width: 320px; max-height: 60%; \
                           overflow-y: auto; padding: 12px 14px; background: rgba(20, 24, 32, 0.88); color: #eee; \
                           border-radius: 6px; font-family: Georgia, serif;"
                >
                    <div style="display: flex; justify-content: space-between; align-items: center;">
                        <div style="display: flex; align-items: center; gap: 8px;">
                            <span style=format!(
                                "display: inline-block; width: 14px; height: 14px; border: 1px solid #000; background: {};",
                                info.color
                            ) />
                            <strong style="font-size: 1.1rem;">{info.name.clone()}</strong>
                        </div>
                        <button title="Close" on:click=move |_| selected.set(None)>"×"</button>
                    </div>
                    <div style="margin-top: 6px;">
                        <div>"Era: " {info.era.clone()}</div>
                        <div>"Ruler: " {info.ruler.clone()}</div>
                    </div>
                    <div style="margin-top: 10px; display: flex; gap: 6px;">
                        {lang_button(WikiLang::En, "English")}
                        {lang_button(WikiLang::Id, "Bahasa Indonesia")}
                    </div>
                    <div style="margin-top: 8px; font-size: 0.9rem; line-height: 1.4;">
                        {move || match wiki.get() {
                            WikiState::Idle => ().into_any(),
                            WikiState::Loading => {
                                view! { <div style="opacity: 0.7;">"Loading summary…"</div> }.into_any()
                            }
                            WikiState::Failed(message) => {
                                view! { <div style="opacity: 0.7;">{format!("Summary unavailable: {message}")}</div> }
                                    .into_any()
                            }
                            WikiState::Loaded(summary) => {
                                view! {
                                    <div>
                                        <div inner_html=summary.html></div>
                                        <a href=summary.url target="_blank" rel="noopener" style="color: #9fc8ff;">
                                            {format!("Read “{}” on Wikipedia", summary.title)}
                                        </a>
                                    </div>
                                }
                                    .into_any()
                            }
                        }}
                    </div>
                </div>
            }
        })
    }
}
