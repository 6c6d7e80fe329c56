use std::cell::RefCell;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;

use nusantara_shared::{Atlas, YearRange};

use crate::app::{AtlasData, Playing, SelectedYear};

/// Slider range used until the atlas has loaded, or when it has no empires.
pub(crate) const FALLBACK_YEARS: YearRange = YearRange::new(1200, 1600);
/// One year per tick while playing.
pub(crate) const PLAYBACK_TICK_MS: i32 = 150;

struct PlaybackIntervalBinding {
    window: web_sys::Window,
    interval_id: i32,
    _callback: Closure<dyn Fn()>,
}

thread_local! {
    static PLAYBACK_INTERVAL_BINDING: RefCell<Option<PlaybackIntervalBinding>> = const { RefCell::new(None) };
}

pub(crate) fn year_bounds(atlas: &Atlas) -> YearRange {
    atlas.year_bounds().unwrap_or(FALLBACK_YEARS)
}

/// Advance one year, wrapping to the first year after the last.
pub(crate) fn next_year(current: i32, bounds: YearRange) -> i32 {
    if current >= bounds.max || current < bounds.min {
        bounds.min
    } else {
        current + 1
    }
}

pub(crate) fn parse_slider_year(raw: &str, bounds: YearRange) -> Option<i32> {
    raw.trim().parse::<i32>().ok().map(|year| bounds.clamp(year))
}

fn stop_playback_interval() {
    PLAYBACK_INTERVAL_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            old.window.clear_interval_with_handle(old.interval_id);
        }
    });
}

fn start_playback_interval(year: RwSignal<i32>, bounds: Memo<YearRange>) {
    stop_playback_interval();
    let Some(window) = web_sys::window() else {
        return;
    };
    let cb = Closure::<dyn Fn()>::new(move || {
        let bounds = bounds.get_untracked();
        year.update(|y| *y = next_year(*y, bounds));
    });
    let Ok(interval_id) = window
        .set_interval_with_callback_and_timeout_and_arguments_0(
            cb.as_ref().unchecked_ref(),
            PLAYBACK_TICK_MS,
        )
    else {
        return;
    };
    PLAYBACK_INTERVAL_BINDING.with(|slot| {
        *slot.borrow_mut() = Some(PlaybackIntervalBinding {
            window: window.clone(),
            interval_id,
            _callback: cb,
        });
    });
}

/// Year scrubber with play/pause along the bottom edge of the map.
#[component]
pub fn Timeline() -> impl IntoView {
    let AtlasData(atlas) = expect_context();
    let SelectedYear(year) = expect_context();
    let Playing(playing) = expect_context();

    let bounds = Memo::new(move |_| {
        atlas.with(|atlas| atlas.as_deref().map(year_bounds).unwrap_or(FALLBACK_YEARS))
    });

    Effect::new(move || {
        if playing.get() {
            start_playback_interval(year, bounds);
        } else {
            stop_playback_interval();
        }
    });
    on_cleanup(stop_playback_interval);

    let on_input = move |e: web_sys::Event| {
        let Some(target) = e.target() else {
            return;
        };
        let Ok(input) = target.dyn_into::<web_sys::HtmlInputElement>() else {
            return;
        };
        if let Some(value) = parse_slider_year(&input.value(), bounds.get_untracked()) {
            year.set(value);
        }
    };

    view! {
        <div
            class="timeline"
            style="position: absolute; left: 50%; bottom: 16px; transform: translateX(-50%); z-index: 20; \
                   display: flex; align-items: center; gap: 12px; width: min(720px, 90%); padding: 10px 16px; \
                   background: rgba(20, 24, 32, 0.82); color: #eee; border-radius: 6px; font-family: Georgia, serif;"
        >
            <button
                style="min-width: 64px;"
                on:click=move |_| playing.update(|p| *p = !*p)
            >
                {move || if playing.get() { "Pause" } else { "Play" }}
            </button>
            <span style="opacity: 0.7;">{move || bounds.get().min}</span>
            <input
                type="range"
                style="flex: 1;"
                min=move || bounds.get().min
                max=move || bounds.get().max
                step="1"
                prop:value=move || year.get().to_string()
                on:input=on_input
            />
            <span style="opacity: 0.7;">{move || bounds.get().max}</span>
            <span style="min-width: 48px; text-align: right; font-weight: bold; font-size: 1.2rem;">
                {move || year.get()}
            </span>
        </div>
    }
}
