use nusantara_shared::{Bounds, LatLng};

pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 5.0;
pub const MAX_ZOOM: f64 = 10.0;
pub const ZOOM_SNAP: f64 = 0.25;
pub const ZOOM_ANIMATION_MS: f64 = 250.0;
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

pub const INITIAL_CENTER: LatLng = LatLng::new(-2.5, 118.0);
pub const INITIAL_ZOOM: f64 = 5.0;
pub const MAX_BOUNDS: Bounds = Bounds {
    min_lat: -11.0,
    max_lat: 8.0,
    min_lng: 92.0,
    max_lng: 141.0,
};

/// Pixel coordinate. Which space (absolute, layer, container) depends on the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    pub fn floor(self) -> Point {
        Point::new(self.x.floor(), self.y.floor())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("non-finite coordinate ({lat}, {lng})")]
    NonFinite { lat: f64, lng: f64 },
    #[error("latitude {0} outside the mercator domain")]
    OutOfDomain(f64),
}

/// Spherical web mercator to absolute pixels at `zoom`. Latitude is clamped to the mercator limit.
pub fn project(lat_lng: LatLng, zoom: f64) -> Point {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lat = lat_lng.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let sin = lat.to_radians().sin();
    let y = 0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * std::f64::consts::PI);
    Point::new(scale * (lat_lng.lng + 180.0) / 360.0, scale * y)
}

pub fn unproject(point: Point, zoom: f64) -> LatLng {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lng = point.x / scale * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * point.y / scale);
    let lat = (2.0 * n.exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    LatLng::new(lat, lng)
}

pub fn snap_zoom(zoom: f64) -> f64 {
    ((zoom / ZOOM_SNAP).round() * ZOOM_SNAP).clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Center, zoom and container size of the map, with a layer origin that only moves when the view settles.
///
/// Layer points are absolute pixels minus `pixel_origin`; container points are what the
/// user sees. Between settles the two differ by [`Viewport::pane_offset`].
#[derive(Debug, Clone)]
pub struct Viewport {
    center: LatLng,
    zoom: f64,
    size: Point,
    pixel_origin: Point,
    max_bounds: Bounds,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(INITIAL_CENTER, INITIAL_ZOOM, Point::new(1024.0, 768.0))
    }
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        let mut vp = Self {
            center,
            zoom: snap_zoom(zoom),
            size,
            pixel_origin: Point::default(),
            max_bounds: MAX_BOUNDS,
        };
        vp.center = vp.clamp_center(center);
        vp.settle();
        vp
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn pixel_origin(&self) -> Point {
        self.pixel_origin
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.size = Point::new(width.max(1.0), height.max(1.0));
    }

    /// Absolute pixel of the container's top-left corner.
    fn top_left(&self) -> Point {
        project(self.center, self.zoom).sub(self.size.scale(0.5))
    }

    /// Re-anchor the layer origin at the current view. Called once a move or zoom ends.
    pub fn settle(&mut self) {
        self.pixel_origin = self.top_left().floor();
    }

    /// Translation that maps layer space onto container space until the next settle.
    pub fn pane_offset(&self) -> Point {
        self.pixel_origin.sub(self.top_left())
    }

    pub fn project_to_layer_point(&self, lat: f64, lng: f64) -> Result<Point, ProjectionError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(ProjectionError::NonFinite { lat, lng });
        }
        if lat.abs() > MAX_LATITUDE {
            return Err(ProjectionError::OutOfDomain(lat));
        }
        Ok(project(LatLng::new(lat, lng), self.zoom).sub(self.pixel_origin))
    }

    pub fn layer_point_to_lat_lng(&self, point: Point) -> LatLng {
        unproject(point.add(self.pixel_origin), self.zoom)
    }

    pub fn layer_to_container(&self, point: Point) -> Point {
        point.add(self.pane_offset())
    }

    pub fn container_to_layer(&self, point: Point) -> Point {
        point.sub(self.pane_offset())
    }

    pub fn lat_lng_to_container(&self, lat_lng: LatLng) -> Point {
        project(lat_lng, self.zoom).sub(self.top_left())
    }

    pub fn container_to_lat_lng(&self, point: Point) -> LatLng {
        unproject(point.add(self.top_left()), self.zoom)
    }

    /// Move the view by a pixel offset (positive x pans east). Returns whether the center moved.
    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        let target = project(self.center, self.zoom).add(Point::new(dx, dy));
        let next = self.clamp_center(unproject(target, self.zoom));
        let moved = next != self.center;
        self.center = next;
        moved
    }

    /// Zoom to `new_zoom` (snapped and clamped), keeping the map under `focus` fixed.
    /// Returns whether the zoom level changed.
    pub fn zoom_around(&mut self, focus: Point, new_zoom: f64) -> bool {
        let new_zoom = snap_zoom(new_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        let focus_lat_lng = self.container_to_lat_lng(focus);
        let center_px = project(focus_lat_lng, new_zoom)
            .sub(focus)
            .add(self.size.scale(0.5));
        self.zoom = new_zoom;
        self.center = self.clamp_center(unproject(center_px, new_zoom));
        true
    }

    fn clamp_center(&self, center: LatLng) -> LatLng {
        let b = &self.max_bounds;
        LatLng::new(
            center.lat.clamp(b.min_lat, b.max_lat),
            center.lng.clamp(b.min_lng, b.max_lng),
        )
    }
}

fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Animated zoom of the map pane from one level to another around a container point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomAnimation {
    pub from_zoom: f64,
    pub to_zoom: f64,
    pub focus: Point,
    pub started_at: f64,
    pub duration_ms: f64,
}

impl ZoomAnimation {
    pub fn new(from_zoom: f64, to_zoom: f64, focus: Point, started_at: f64) -> Self {
        Self {
            from_zoom,
            to_zoom,
            focus,
            started_at,
            duration_ms: ZOOM_ANIMATION_MS,
        }
    }

    pub fn progress(&self, now: f64) -> f64 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration_ms).clamp(0.0, 1.0)
    }

    pub fn is_finished(&self, now: f64) -> bool {
        self.progress(now) >= 1.0
    }

    /// Scale of the pane relative to the starting zoom.
    pub fn scale_at(&self, now: f64) -> f64 {
        let t = ease_out_cubic(self.progress(now));
        let zoom = self.from_zoom + (self.to_zoom - self.from_zoom) * t;
        2_f64.powf(zoom - self.from_zoom)
    }

    /// CSS transform for a pane with `transform-origin: 0 0` that scales around `focus`.
    pub fn css_transform(&self, now: f64) -> String {
        let scale = self.scale_at(now);
        let tx = self.focus.x * (1.0 - scale);
        let ty = self.focus.y * (1.0 - scale);
        format!("translate({tx:.3}px, {ty:.3}px) scale({scale:.5})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < tolerance,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    #[test]
    fn project_matches_known_tiles() {
        let origin = project(LatLng::new(0.0, 0.0), 0.0);
        assert_close(origin.x, 128.0, 1e-9);
        assert_close(origin.y, 128.0, 1e-9);

        let east = project(LatLng::new(0.0, 180.0), 1.0);
        assert_close(east.x, 512.0, 1e-9);

        let north = project(LatLng::new(MAX_LATITUDE, 0.0), 0.0);
        assert_close(north.y, 0.0, 1e-6);
    }

    #[test]
    fn unproject_inverts_project() {
        for zoom in [5.0, 7.25, 10.0] {
            for (lat, lng) in [(-2.5, 118.0), (-7.9, 112.6), (3.1, 101.4), (-10.9, 140.9)] {
                let back = unproject(project(LatLng::new(lat, lng), zoom), zoom);
                assert_close(back.lat, lat, 1e-9);
                assert_close(back.lng, lng, 1e-9);
            }
        }
    }

    #[test]
    fn layer_point_round_trips_through_pans_and_zooms() {
        let anchor = LatLng::new(-7.5, 112.5);
        let mut vp = Viewport::default();

        let steps: [(f64, f64, Option<f64>); 4] = [
            (120.0, -40.0, None),
            (-300.0, 15.0, None),
            (0.0, 0.0, Some(7.0)),
            (55.5, 80.25, Some(6.25)),
        ];

        for (dx, dy, zoom) in steps {
            vp.pan_by(dx, dy);
            if let Some(z) = zoom {
                vp.zoom_around(Point::new(512.0, 384.0), z);
            }
            vp.settle();

            let layer = vp
                .project_to_layer_point(anchor.lat, anchor.lng)
                .expect("anchor inside mercator domain");
            let expected = project(anchor, vp.zoom()).sub(vp.pixel_origin());
            assert_close(layer.x, expected.x, 1e-9);
            assert_close(layer.y, expected.y, 1e-9);

            let back = vp.layer_point_to_lat_lng(layer);
            assert_close(back.lat, anchor.lat, 1e-9);
            assert_close(back.lng, anchor.lng, 1e-9);
        }
    }

    #[test]
    fn projection_rejects_bad_input() {
        let vp = Viewport::default();
        assert!(matches!(
            vp.project_to_layer_point(f64::NAN, 110.0),
            Err(ProjectionError::NonFinite { .. })
        ));
        assert!(matches!(
            vp.project_to_layer_point(0.0, f64::INFINITY),
            Err(ProjectionError::NonFinite { .. })
        ));
        assert_eq!(
            vp.project_to_layer_point(89.0, 110.0),
            Err(ProjectionError::OutOfDomain(89.0))
        );
    }

    #[test]
    fn pane_offset_tracks_unsettled_pans() {
        let mut vp = Viewport::default();
        let anchor = LatLng::new(-2.5, 118.0);
        let before = vp.lat_lng_to_container(anchor);

        vp.pan_by(40.0, -25.0);
        let layer = vp
            .project_to_layer_point(anchor.lat, anchor.lng)
            .expect("in domain");
        let container = vp.layer_to_container(layer);
        assert_close(container.x, before.x - 40.0, 1e-6);
        assert_close(container.y, before.y + 25.0, 1e-6);
        let back = vp.container_to_layer(container);
        assert_close(back.x, layer.x, 1e-9);
        assert_close(back.y, layer.y, 1e-9);

        vp.settle();
        let offset = vp.pane_offset();
        assert!(offset.x.abs() < 1.0 && offset.y.abs() < 1.0);
    }

    #[test]
    fn zoom_around_keeps_focus_fixed() {
        let mut vp = Viewport::default();
        let focus = Point::new(300.0, 200.0);
        let under_cursor = vp.container_to_lat_lng(focus);

        assert!(vp.zoom_around(focus, 6.0));
        let after = vp.lat_lng_to_container(under_cursor);
        assert_close(after.x, focus.x, 1e-6);
        assert_close(after.y, focus.y, 1e-6);
    }

    #[test]
    fn zoom_snaps_and_clamps() {
        assert_eq!(snap_zoom(5.1), 5.0);
        assert_eq!(snap_zoom(5.13), 5.25);
        assert_eq!(snap_zoom(2.0), MIN_ZOOM);
        assert_eq!(snap_zoom(14.0), MAX_ZOOM);

        let mut vp = Viewport::default();
        assert!(!vp.zoom_around(Point::new(0.0, 0.0), 4.0));
        assert_eq!(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn center_stays_inside_max_bounds() {
        let mut vp = Viewport::default();
        vp.pan_by(-1_000_000.0, -1_000_000.0);
        assert_eq!(vp.center().lng, MAX_BOUNDS.min_lng);
        assert_eq!(vp.center().lat, MAX_BOUNDS.max_lat);

        let clamped = Viewport::new(LatLng::new(-40.0, 150.0), 5.0, Point::new(800.0, 600.0));
        assert_eq!(clamped.center(), LatLng::new(-11.0, 141.0));
    }

    #[test]
    fn zoom_animation_eases_out_to_target() {
        let anim = ZoomAnimation::new(5.0, 6.0, Point::new(100.0, 50.0), 1_000.0);
        assert_eq!(anim.scale_at(1_000.0), 1.0);
        assert_close(anim.scale_at(1_250.0), 2.0, 1e-12);
        assert!(anim.is_finished(1_300.0));
        assert!(!anim.is_finished(1_100.0));

        // ease-out covers more than half the distance by the midpoint
        let mid = anim.scale_at(1_125.0);
        assert!(mid > 2_f64.powf(0.5), "midpoint scale {mid}");

        assert_eq!(
            anim.css_transform(1_250.0),
            "translate(-100.000px, -50.000px) scale(2.00000)"
        );
    }
}
