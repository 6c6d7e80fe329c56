//! Keeps territory labels pinned to their geographic anchors while the map pans and zooms.
//!
//! Geometry is analysed once per label, when its territory enters the active set or its
//! boundary snapshot changes. View events only re-project the cached anchor. During an
//! animated zoom every label is hidden and then revealed at its settled position.
//! Settling only re-projects: the active-set diff runs when the selected year or atlas
//! changes (see `label_layer`), not on move-end or zoom-end.

use std::collections::BTreeMap;

use nusantara_shared::{Boundary, LabelPlacement, PlacementParams, compute_label_placement_with};

use crate::viewport::{Point, ProjectionError, Viewport};

/// Geographic to layer-pixel projection owned by the map view.
pub trait LayerProjection {
    fn project_to_layer_point(&self, lat: f64, lng: f64) -> Result<Point, ProjectionError>;
}

impl LayerProjection for Viewport {
    fn project_to_layer_point(&self, lat: f64, lng: f64) -> Result<Point, ProjectionError> {
        Viewport::project_to_layer_point(self, lat, lng)
    }
}

/// Where label elements live. New elements start hidden.
pub trait LabelSurface {
    type Handle;

    fn create(&mut self, id: &str, text: &str, placement: &LabelPlacement) -> Self::Handle;
    fn set_position(&mut self, handle: &Self::Handle, x: f64, y: f64);
    fn set_visible(&mut self, handle: &Self::Handle, visible: bool);
    fn remove(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelState {
    /// Element exists but has never been positioned, or its anchor could not be projected yet.
    Created,
    Tracking,
    /// Hidden for the duration of an animated zoom.
    Suspended,
    Destroyed,
}

/// One active territory as seen by the label layer.
#[derive(Debug, Clone)]
pub struct LabelSource<'a> {
    pub id: &'a str,
    /// Changes whenever the boundary snapshot does (the snapshot year).
    pub revision: i32,
    pub text: String,
    pub boundary: &'a Boundary,
}

/// Stamp on a requested frame. Frames carrying an outdated ticket write nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    generation: u64,
    sequence: u64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameReport {
    pub stale: bool,
    pub positioned: usize,
    pub skipped: Vec<(String, ProjectionError)>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub reanchored: Vec<String>,
    pub removed: Vec<String>,
    /// Territories whose shape yields no anchor; they get no element.
    pub unplaced: Vec<String>,
    pub skipped: Vec<(String, ProjectionError)>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        !(self.created.is_empty() && self.reanchored.is_empty() && self.removed.is_empty())
    }
}

struct Label<H> {
    revision: i32,
    text: String,
    placement: LabelPlacement,
    handle: Option<H>,
    state: LabelState,
}

pub struct AnchorLayer<S: LabelSurface> {
    surface: S,
    params: PlacementParams,
    labels: BTreeMap<String, Label<S::Handle>>,
    generation: u64,
    next_sequence: u64,
    pending: Option<FrameTicket>,
    zooming: bool,
    destroyed: bool,
}

impl<S: LabelSurface> AnchorLayer<S> {
    pub fn new(surface: S) -> Self {
        Self::with_params(surface, PlacementParams::default())
    }

    pub fn with_params(surface: S, params: PlacementParams) -> Self {
        Self {
            surface,
            params,
            labels: BTreeMap::new(),
            generation: 0,
            next_sequence: 0,
            pending: None,
            zooming: false,
            destroyed: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn label_state(&self, id: &str) -> Option<LabelState> {
        self.labels.get(id).map(|label| label.state)
    }

    pub fn placement(&self, id: &str) -> Option<&LabelPlacement> {
        self.labels.get(id).map(|label| &label.placement)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn invalidate_frames(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    /// Diff the active set against the labels already owned, keyed by territory id.
    pub fn sync_active_set<'a>(
        &mut self,
        sources: impl IntoIterator<Item = LabelSource<'a>>,
        projection: &impl LayerProjection,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        if self.destroyed {
            return report;
        }

        let incoming: BTreeMap<&str, LabelSource<'a>> =
            sources.into_iter().map(|source| (source.id, source)).collect();

        let gone: Vec<String> = self
            .labels
            .keys()
            .filter(|id| !incoming.contains_key(id.as_str()))
            .cloned()
            .collect();
        for id in gone {
            if let Some(label) = self.labels.remove(&id) {
                self.retire(label);
            }
            report.removed.push(id);
        }

        for (id, source) in incoming {
            let unchanged = self
                .labels
                .get(id)
                .map(|label| label.revision == source.revision && label.text == source.text);
            match unchanged {
                Some(true) => {}
                Some(false) => {
                    if let Some(old) = self.labels.remove(id) {
                        self.retire(old);
                    }
                    self.admit(&source, projection, &mut report);
                    report.reanchored.push(id.to_string());
                }
                None => {
                    self.admit(&source, projection, &mut report);
                    report.created.push(id.to_string());
                }
            }
        }

        if report.changed() {
            self.invalidate_frames();
        }
        report
    }

    fn admit(
        &mut self,
        source: &LabelSource<'_>,
        projection: &impl LayerProjection,
        report: &mut SyncReport,
    ) {
        let placement = compute_label_placement_with(source.boundary, &self.params);
        let mut label = Label {
            revision: source.revision,
            text: source.text.clone(),
            placement,
            handle: None,
            state: LabelState::Created,
        };

        if placement.position.is_none() {
            report.unplaced.push(source.id.to_string());
        } else {
            let handle = self.surface.create(source.id, &source.text, &placement);
            label.handle = Some(handle);
            if self.zooming {
                label.state = LabelState::Suspended;
            } else if let Err(err) = Self::place_with(&mut self.surface, &mut label, projection) {
                report.skipped.push((source.id.to_string(), err));
            }
        }

        self.labels.insert(source.id.to_string(), label);
    }

    fn retire(&mut self, label: Label<S::Handle>) {
        if let Some(handle) = label.handle {
            self.surface.remove(handle);
        }
    }

    /// Project and reveal one label. On failure the label keeps its state and stays as it was.
    fn place_with(
        surface: &mut S,
        label: &mut Label<S::Handle>,
        projection: &impl LayerProjection,
    ) -> Result<(), ProjectionError> {
        let (Some(handle), Some(anchor)) = (label.handle.as_ref(), label.placement.position) else {
            return Ok(());
        };
        let point = projection.project_to_layer_point(anchor.lat, anchor.lng)?;
        surface.set_position(handle, point.x, point.y);
        if label.state != LabelState::Tracking {
            surface.set_visible(handle, true);
            label.state = LabelState::Tracking;
        }
        Ok(())
    }

    /// Ticket for a throttled re-projection frame. `None` once destroyed or while zooming.
    pub fn request_frame(&mut self) -> Option<FrameTicket> {
        if self.destroyed || self.zooming {
            return None;
        }
        let ticket = FrameTicket {
            generation: self.generation,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.pending = Some(ticket);
        Some(ticket)
    }

    pub fn on_move(&mut self) -> Option<FrameTicket> {
        self.request_frame()
    }

    pub fn on_zoom(&mut self) -> Option<FrameTicket> {
        self.request_frame()
    }

    pub fn on_zoom_start(&mut self) {
        if self.destroyed {
            return;
        }
        self.zooming = true;
        self.invalidate_frames();
        for label in self.labels.values_mut() {
            if let Some(handle) = label.handle.as_ref() {
                self.surface.set_visible(handle, false);
                label.state = LabelState::Suspended;
            }
        }
    }

    pub fn on_zoom_end(&mut self, projection: &impl LayerProjection) -> FrameReport {
        self.zooming = false;
        self.settle(projection)
    }

    pub fn on_move_end(&mut self, projection: &impl LayerProjection) -> FrameReport {
        self.settle(projection)
    }

    /// Reposition every label and reveal the suspended ones.
    fn settle(&mut self, projection: &impl LayerProjection) -> FrameReport {
        let mut report = FrameReport::default();
        if self.destroyed {
            report.stale = true;
            return report;
        }
        self.invalidate_frames();
        for (id, label) in self.labels.iter_mut() {
            if label.handle.is_none() {
                continue;
            }
            match Self::place_with(&mut self.surface, label, projection) {
                Ok(()) => report.positioned += 1,
                Err(err) => report.skipped.push((id.clone(), err)),
            }
        }
        report
    }

    /// Re-project cached anchors of tracking labels. Suspended and never-placed labels wait
    /// for the next settle.
    pub fn run_frame(&mut self, ticket: FrameTicket, projection: &impl LayerProjection) -> FrameReport {
        let mut report = FrameReport::default();
        if self.destroyed || self.pending != Some(ticket) || ticket.generation != self.generation {
            report.stale = true;
            return report;
        }
        self.pending = None;

        for (id, label) in self.labels.iter_mut() {
            if label.state != LabelState::Tracking {
                continue;
            }
            match Self::place_with(&mut self.surface, label, projection) {
                Ok(()) => report.positioned += 1,
                Err(err) => report.skipped.push((id.clone(), err)),
            }
        }
        report
    }

    /// Remove every element. The layer ignores all calls afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.invalidate_frames();
        self.destroyed = true;
        for label in self.labels.values_mut() {
            label.state = LabelState::Destroyed;
            if let Some(handle) = label.handle.take() {
                self.surface.remove(handle);
            }
        }
    }
}
