use std::cell::Cell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use nusantara_shared::colors::{brighten, parse_hex_color};
use nusantara_shared::{Atlas, LatLng};

use crate::app::{AtlasData, Hovered, SelectedYear, Selected, ViewEvents};
use crate::colors::rgba_css;
use crate::label_layer::LabelLayer;
use crate::render_loop::FrameScheduler;
use crate::view_events::ViewEvent;
use crate::viewport::{Point, Viewport, ZoomAnimation, snap_zoom};

const OCEAN: &str = "#9ec5d6";
const FILL_ALPHA: f64 = 0.6;
const HOVER_LIGHTEN: f64 = 0.12;
const BORDER_WIDTH: f64 = 2.0;
const SELECTED_BORDER_WIDTH: f64 = 3.5;
const WHEEL_ZOOM_STEP: f64 = 0.5;
const BUTTON_ZOOM_STEP: f64 = 1.0;
/// Pointer travel below which a press counts as a click rather than a drag.
const CLICK_SLOP_PX: f64 = 5.0;

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
        .max(1.0)
}

/// Topmost active territory under a container point.
fn hit_test(atlas: &Atlas, year: i32, vp: &Viewport, point: Point) -> Option<String> {
    let at: LatLng = vp.container_to_lat_lng(point);
    atlas
        .active_set(year)
        .iter()
        .rev()
        .find(|territory| territory.boundary.contains(at))
        .map(|territory| territory.empire.id.clone())
}

struct DrawInput<'a> {
    atlas: &'a Atlas,
    year: i32,
    vp: &'a Viewport,
    hovered: Option<&'a str>,
    selected: Option<&'a str>,
}

fn draw_territories(ctx: &CanvasRenderingContext2d, width: f64, height: f64, input: DrawInput<'_>) {
    ctx.set_fill_style_str(OCEAN);
    ctx.fill_rect(0.0, 0.0, width, height);

    for territory in input.atlas.active_set(input.year) {
        let empire = territory.empire;
        let info = input.atlas.territory_info(&empire.id, input.year);
        let mut fill = parse_hex_color(&info.color).unwrap_or_else(|| empire.color_rgb());
        if input.hovered == Some(empire.id.as_str()) {
            fill = brighten(fill, HOVER_LIGHTEN);
        }

        ctx.begin_path();
        for ring in territory.boundary.rings() {
            for (i, &[lng, lat]) in ring.iter().enumerate() {
                let p = input.vp.lat_lng_to_container(LatLng::new(lat, lng));
                if i == 0 {
                    ctx.move_to(p.x, p.y);
                } else {
                    ctx.line_to(p.x, p.y);
                }
            }
            ctx.close_path();
        }

        ctx.set_fill_style_str(&rgba_css(fill, FILL_ALPHA));
        ctx.fill();
        ctx.set_stroke_style_str(&rgba_css(empire.border_rgb(), 1.0));
        ctx.set_line_width(if input.selected == Some(empire.id.as_str()) {
            SELECTED_BORDER_WIDTH
        } else {
            BORDER_WIDTH
        });
        ctx.stroke();
    }
}

/// Base map: Canvas 2D territories under the label pane, with drag-pan and animated wheel zoom.
#[component]
pub fn MapView() -> impl IntoView {
    let viewport: RwSignal<Viewport> = expect_context();
    let AtlasData(atlas) = expect_context();
    let SelectedYear(year) = expect_context();
    let Hovered(hovered) = expect_context();
    let Selected(selected) = expect_context();
    let ViewEvents(events) = expect_context();

    let emit = move |kind: ViewEvent| events.get_value().emit(kind);

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let zoom_anim: Rc<Cell<Option<ZoomAnimation>>> = Rc::new(Cell::new(None));

    let is_dragging = Rc::new(Cell::new(false));
    let drag_moved = Rc::new(Cell::new(false));
    let drag_start = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last_pos = Rc::new(Cell::new((0.0f64, 0.0f64)));

    let scheduler = Rc::new(FrameScheduler::new({
        let zoom_anim = zoom_anim.clone();
        move |timestamp| {
            let Some(canvas) = canvas_ref.get_untracked() else {
                return false;
            };
            let canvas: &HtmlCanvasElement = &canvas;
            let Some(parent) = canvas.parent_element() else {
                return false;
            };
            let w = parent.client_width() as f64;
            let h = parent.client_height() as f64;
            if w <= 0.0 || h <= 0.0 {
                return false;
            }

            let size = viewport.with_untracked(|vp| vp.size());
            if size.x != w || size.y != h {
                viewport.update_untracked(|vp| {
                    vp.set_size(w, h);
                    vp.settle();
                });
                emit(ViewEvent::MoveEnd);
            }

            if let Some(anim) = zoom_anim.get() {
                if anim.is_finished(timestamp) {
                    zoom_anim.set(None);
                    web_sys::HtmlElement::style(canvas)
                        .remove_property("transform")
                        .ok();
                    viewport.update_untracked(|vp| {
                        vp.zoom_around(anim.focus, anim.to_zoom);
                        vp.settle();
                    });
                    emit(ViewEvent::Zoom);
                    emit(ViewEvent::ZoomEnd);
                    emit(ViewEvent::MoveEnd);
                    viewport.notify();
                } else {
                    web_sys::HtmlElement::style(canvas)
                        .set_property("transform", &anim.css_transform(timestamp))
                        .ok();
                    emit(ViewEvent::Zoom);
                    // The scaled snapshot stands in for the map until the zoom lands.
                    return true;
                }
            }

            let dpr = device_pixel_ratio();
            let pw = (w * dpr).round().max(1.0) as u32;
            let ph = (h * dpr).round().max(1.0) as u32;
            if canvas.width() != pw || canvas.height() != ph {
                canvas.set_width(pw);
                canvas.set_height(ph);
            }
            let Some(ctx) = canvas
                .get_context("2d")
                .ok()
                .flatten()
                .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
            else {
                return false;
            };
            ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();

            atlas.with_untracked(|atlas| {
                let Some(atlas) = atlas else {
                    ctx.set_fill_style_str(OCEAN);
                    ctx.fill_rect(0.0, 0.0, w, h);
                    return;
                };
                let hov = hovered.get_untracked();
                let sel = selected.get_untracked();
                viewport.with_untracked(|vp| {
                    draw_territories(
                        &ctx,
                        w,
                        h,
                        DrawInput {
                            atlas,
                            year: year.get_untracked(),
                            vp,
                            hovered: hov.as_deref(),
                            selected: sel.as_deref(),
                        },
                    );
                });
            });
            false
        }
    }));

    // Any state the canvas draws from needs a repaint.
    {
        let scheduler = scheduler.clone();
        Effect::new(move || {
            viewport.track();
            atlas.track();
            year.track();
            hovered.track();
            selected.track();
            scheduler.request();
        });
    }

    let start_zoom = {
        let zoom_anim = zoom_anim.clone();
        let scheduler = scheduler.clone();
        move |focus: Point, target: f64| {
            if zoom_anim.get().is_some() {
                return;
            }
            let from = viewport.with_untracked(|vp| vp.zoom());
            let to = snap_zoom(target);
            if (to - from).abs() < f64::EPSILON {
                return;
            }
            zoom_anim.set(Some(ZoomAnimation::new(from, to, focus, now_ms())));
            emit(ViewEvent::ZoomStart);
            scheduler.request();
        }
    };

    let local_point = move |client_x: f64, client_y: f64| -> Point {
        canvas_ref
            .get_untracked()
            .map(|el| {
                let rect = el.get_bounding_client_rect();
                Point::new(client_x - rect.left(), client_y - rect.top())
            })
            .unwrap_or(Point::new(client_x, client_y))
    };

    let on_wheel = {
        let start_zoom = start_zoom.clone();
        move |e: WheelEvent| {
            e.prevent_default();
            let delta = e.delta_y();
            if delta == 0.0 {
                return;
            }
            let focus = local_point(e.client_x() as f64, e.client_y() as f64);
            let step = if delta > 0.0 {
                -WHEEL_ZOOM_STEP
            } else {
                WHEEL_ZOOM_STEP
            };
            let current = viewport.with_untracked(|vp| vp.zoom());
            start_zoom(focus, current + step);
        }
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_moved = drag_moved.clone();
        let drag_start = drag_start.clone();
        let last_pos = last_pos.clone();
        let zoom_anim = zoom_anim.clone();
        move |e: PointerEvent| {
            if zoom_anim.get().is_some() {
                return;
            }
            let pos = (e.client_x() as f64, e.client_y() as f64);
            is_dragging.set(true);
            drag_moved.set(false);
            drag_start.set(pos);
            last_pos.set(pos);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let drag_moved = drag_moved.clone();
        let drag_start = drag_start.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            let pos = (e.client_x() as f64, e.client_y() as f64);
            if is_dragging.get() {
                let (lx, ly) = last_pos.get();
                last_pos.set(pos);
                let (sx, sy) = drag_start.get();
                if (pos.0 - sx).abs() >= CLICK_SLOP_PX || (pos.1 - sy).abs() >= CLICK_SLOP_PX {
                    drag_moved.set(true);
                }
                if !drag_moved.get() {
                    return;
                }
                let mut moved = false;
                viewport.update(|vp| moved = vp.pan_by(lx - pos.0, ly - pos.1));
                if moved {
                    emit(ViewEvent::Move);
                }
            } else {
                let Some(hit) = atlas.with_untracked(|atlas| {
                    let atlas = atlas.as_ref()?;
                    let point = local_point(pos.0, pos.1);
                    Some(viewport.with_untracked(|vp| {
                        hit_test(atlas, year.get_untracked(), vp, point)
                    }))
                }) else {
                    return;
                };
                if hit != hovered.get_untracked() {
                    hovered.set(hit);
                }
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        let drag_moved = drag_moved.clone();
        move |e: PointerEvent| {
            if !is_dragging.replace(false) {
                return;
            }
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
            if drag_moved.get() {
                viewport.update(|vp| vp.settle());
                emit(ViewEvent::MoveEnd);
            }
        }
    };

    let on_pointer_leave = move |_: PointerEvent| {
        if hovered.get_untracked().is_some() {
            hovered.set(None);
        }
    };

    let on_click = {
        let drag_moved = drag_moved.clone();
        move |e: MouseEvent| {
            if drag_moved.get() {
                return;
            }
            let point = local_point(e.client_x() as f64, e.client_y() as f64);
            let hit = atlas.with_untracked(|atlas| {
                let atlas = atlas.as_ref()?;
                viewport.with_untracked(|vp| hit_test(atlas, year.get_untracked(), vp, point))
            });
            if hit != selected.get_untracked() {
                selected.set(hit);
            }
        }
    };

    let zoom_by = move |step: f64| {
        let (zoom, size) = viewport.with_untracked(|vp| (vp.zoom(), vp.size()));
        start_zoom(size.scale(0.5), zoom + step);
    };
    let zoom_by_out = zoom_by.clone();

    view! {
        <div
            class="map-view"
            style="position: absolute; inset: 0; overflow: hidden; cursor: grab; touch-action: none;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
            on:click=on_click
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; transform-origin: 0 0;"
            />
            <LabelLayer />
        </div>
        <div class="zoom-controls" style="position: absolute; top: 12px; left: 12px; z-index: 20; display: flex; flex-direction: column; gap: 4px;">
            <button title="Zoom in" on:click=move |_| zoom_by(BUTTON_ZOOM_STEP)>"+"</button>
            <button title="Zoom out" on:click=move |_| zoom_by_out(-BUTTON_ZOOM_STEP)>"−"</button>
        </div>
    }
}
