use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use nusantara_shared::{Atlas, LabelPlacement};

use crate::anchoring::{AnchorLayer, FrameReport, FrameTicket, LabelSource, LabelSurface};
use crate::app::{AtlasData, SelectedYear, ViewEvents};
use crate::render_loop::FrameScheduler;
use crate::view_events::{Subscriptions, ViewEvent, ViewEventBus};
use crate::viewport::Viewport;

const LABEL_STYLE: &str = "position: absolute; left: 0; top: 0; visibility: hidden; \
    color: white; font-weight: bold; font-family: Georgia, serif; letter-spacing: 2px; \
    text-transform: uppercase; white-space: nowrap; user-select: none; pointer-events: none; \
    text-shadow: -2px -2px 0 #000, 2px -2px 0 #000, -2px 2px 0 #000, 2px 2px 0 #000, 0 0 8px rgba(0,0,0,0.9);";

pub struct DomLabel {
    el: HtmlElement,
}

/// Absolutely positioned `div`s inside the label pane.
pub struct DomLabelSurface {
    pane: HtmlElement,
}

impl DomLabelSurface {
    pub fn new(pane: HtmlElement) -> Self {
        Self { pane }
    }

    fn build(&self, id: &str, text: &str, placement: &LabelPlacement) -> Option<HtmlElement> {
        let document = self.pane.owner_document()?;
        let el = document
            .create_element("div")
            .ok()?
            .dyn_into::<HtmlElement>()
            .ok()?;
        el.set_attribute("style", LABEL_STYLE).ok()?;
        el.set_attribute("data-territory", id).ok()?;
        el.set_text_content(Some(text));
        let style = el.style();
        style
            .set_property("font-size", &format!("{}px", placement.font_size_px))
            .ok()?;
        // Screen y grows downward, so geographic counter-clockwise becomes a negative CSS angle.
        style
            .set_property(
                "transform",
                &format!(
                    "translate(-50%, -50%) rotate({}deg)",
                    -placement.rotation_degrees
                ),
            )
            .ok()?;
        self.pane.append_child(&el).ok()?;
        Some(el)
    }
}

impl LabelSurface for DomLabelSurface {
    type Handle = Option<DomLabel>;

    fn create(&mut self, id: &str, text: &str, placement: &LabelPlacement) -> Self::Handle {
        let built = self.build(id, text, placement);
        if built.is_none() {
            web_sys::console::warn_1(&format!("could not create label element for {id}").into());
        }
        built.map(|el| DomLabel { el })
    }

    fn set_position(&mut self, handle: &Self::Handle, x: f64, y: f64) {
        if let Some(label) = handle {
            let style = label.el.style();
            style.set_property("left", &format!("{x:.2}px")).ok();
            style.set_property("top", &format!("{y:.2}px")).ok();
        }
    }

    fn set_visible(&mut self, handle: &Self::Handle, visible: bool) {
        if let Some(label) = handle {
            let value = if visible { "visible" } else { "hidden" };
            label.el.style().set_property("visibility", value).ok();
        }
    }

    fn remove(&mut self, handle: Self::Handle) {
        if let Some(label) = handle {
            label.el.remove();
        }
    }
}

fn log_report(context: &str, report: &FrameReport) {
    for (id, err) in &report.skipped {
        web_sys::console::warn_1(&format!("{context}: label '{id}' skipped: {err}").into());
    }
}

/// Keep the pane registered with the base map between settles.
fn apply_pane_offset(pane: &HtmlElement, vp: &Viewport) {
    let offset = vp.pane_offset();
    pane.style()
        .set_property(
            "transform",
            &format!("translate3d({:.2}px, {:.2}px, 0)", offset.x, offset.y),
        )
        .ok();
}

type SharedLayer = Rc<RefCell<AnchorLayer<DomLabelSurface>>>;

/// Everything one mounted label pane owns. Dropping it tears the layer down and
/// unsubscribes every view-event handler it registered.
struct LabelRuntime {
    layer: SharedLayer,
    _scheduler: Rc<FrameScheduler>,
    _subscriptions: Subscriptions,
}

impl LabelRuntime {
    fn mount(pane: HtmlElement, viewport: RwSignal<Viewport>, bus: &ViewEventBus) -> Self {
        let layer: SharedLayer = Rc::new(RefCell::new(AnchorLayer::new(DomLabelSurface::new(
            pane.clone(),
        ))));
        let pending: Rc<Cell<Option<FrameTicket>>> = Rc::new(Cell::new(None));

        let scheduler = Rc::new(FrameScheduler::new({
            let layer = layer.clone();
            let pending = pending.clone();
            let pane = pane.clone();
            move |_timestamp| {
                let vp = viewport.get_untracked();
                apply_pane_offset(&pane, &vp);
                if let Some(ticket) = pending.take() {
                    let report = layer.borrow_mut().run_frame(ticket, &vp);
                    log_report("frame", &report);
                }
                false
            }
        }));

        let mut subscriptions = Subscriptions::new(bus);

        for kind in [ViewEvent::Move, ViewEvent::Zoom] {
            let layer = layer.clone();
            let pending = pending.clone();
            let scheduler = scheduler.clone();
            subscriptions.on(kind, move |event| {
                let ticket = if event == ViewEvent::Zoom {
                    layer.borrow_mut().on_zoom()
                } else {
                    layer.borrow_mut().on_move()
                };
                if ticket.is_some() {
                    pending.set(ticket);
                    scheduler.request();
                }
            });
        }

        subscriptions.on(ViewEvent::ZoomStart, {
            let layer = layer.clone();
            let pending = pending.clone();
            let scheduler = scheduler.clone();
            move |_| {
                scheduler.cancel();
                pending.set(None);
                layer.borrow_mut().on_zoom_start();
            }
        });

        for kind in [ViewEvent::ZoomEnd, ViewEvent::MoveEnd] {
            let layer = layer.clone();
            let pending = pending.clone();
            let pane = pane.clone();
            subscriptions.on(kind, move |event| {
                pending.set(None);
                let vp = viewport.get_untracked();
                apply_pane_offset(&pane, &vp);
                let mut layer = layer.borrow_mut();
                let report = if event == ViewEvent::ZoomEnd {
                    layer.on_zoom_end(&vp)
                } else {
                    layer.on_move_end(&vp)
                };
                log_report("settle", &report);
            });
        }

        apply_pane_offset(&pane, &viewport.get_untracked());

        Self {
            layer,
            _scheduler: scheduler,
            _subscriptions: subscriptions,
        }
    }

    fn sync(&self, atlas: &Atlas, year: i32, vp: &Viewport) {
        let active = atlas.active_set(year);
        let sources = active.iter().map(|territory| LabelSource {
            id: &territory.empire.id,
            revision: territory.boundary_year,
            text: atlas.territory_info(&territory.empire.id, year).name,
            boundary: territory.boundary,
        });
        let report = self.layer.borrow_mut().sync_active_set(sources, vp);
        for (id, err) in &report.skipped {
            web_sys::console::warn_1(&format!("sync: label '{id}' skipped: {err}").into());
        }
    }
}

impl Drop for LabelRuntime {
    fn drop(&mut self) {
        if let Ok(mut layer) = self.layer.try_borrow_mut() {
            layer.destroy();
        }
    }
}

/// Label pane stacked over the base map. Labels follow the view through view events,
/// never through the reactive render cycle.
#[component]
pub fn LabelLayer() -> impl IntoView {
    let viewport: RwSignal<Viewport> = expect_context();
    let AtlasData(atlas) = expect_context();
    let SelectedYear(year) = expect_context();
    let ViewEvents(events) = expect_context();

    let pane_ref = NodeRef::<leptos::html::Div>::new();
    let runtime: StoredValue<Option<LabelRuntime>, LocalStorage> = StoredValue::new_local(None);

    Effect::new(move || {
        let Some(pane) = pane_ref.get() else {
            return;
        };
        let atlas: Option<Arc<Atlas>> = atlas.get();
        let Some(atlas) = atlas else {
            return;
        };
        let year = year.get();
        let vp = viewport.get_untracked();

        runtime.update_value(|slot| {
            let runtime = slot.get_or_insert_with(|| {
                let pane: HtmlElement = pane.unchecked_into();
                events.with_value(|bus| LabelRuntime::mount(pane, viewport, bus))
            });
            runtime.sync(&atlas, year, &vp);
        });
    });

    view! {
        <div
            node_ref=pane_ref
            class="label-pane"
            style="position: absolute; left: 0; top: 0; width: 0; height: 0; overflow: visible; pointer-events: none; z-index: 5;"
        />
    }
}
