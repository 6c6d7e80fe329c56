use serde::{Deserialize, Serialize};

use crate::geometry::{Boundary, Bounds, LatLng, open_ring, polygon_centroid};

/// Tunable constants of the label engine. The defaults are aesthetic choices, not invariants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementParams {
    /// Pixels of font size per degree of `sqrt(bounding-box area)`.
    pub font_scale: f64,
    /// Aspect ratio above which a label follows the shape's principal axis.
    pub rotation_aspect_threshold: f64,
    pub min_font_px: u32,
    pub max_font_px: u32,
    /// Covariance below which the principal axis is taken as axis-aligned.
    pub axis_epsilon: f64,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            font_scale: 80.0,
            rotation_aspect_threshold: 2.5,
            min_font_px: 14,
            max_font_px: 28,
            axis_epsilon: 1e-4,
        }
    }
}

/// Where and how a territory label is drawn.
///
/// `rotation_degrees` is counter-clockwise from east in geographic space; a screen
/// surface with a downward y axis must negate it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelPlacement {
    pub position: Option<LatLng>,
    pub rotation_degrees: i32,
    pub font_size_px: u32,
    pub bounds_summary: Option<Bounds>,
}

impl LabelPlacement {
    /// Sentinel for shapes that cannot carry a label.
    pub fn unplaced(params: &PlacementParams) -> Self {
        Self {
            position: None,
            rotation_degrees: 0,
            font_size_px: params.min_font_px,
            bounds_summary: None,
        }
    }

    pub fn is_placed(&self) -> bool {
        self.position.is_some()
    }
}

/// Principal axes of a point cloud, from the closed-form 2x2 covariance eigen-decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrincipalAxes {
    /// Major-axis direction in (-90, 90].
    pub angle_degrees: f64,
    pub major_axis: f64,
    pub minor_axis: f64,
}

impl PrincipalAxes {
    pub fn aspect_ratio(&self) -> f64 {
        if self.minor_axis > 0.0 {
            self.major_axis / self.minor_axis
        } else if self.major_axis > 0.0 {
            f64::INFINITY
        } else {
            1.0
        }
    }
}

pub fn principal_axes(points: &[[f64; 2]], epsilon: f64) -> Option<PrincipalAxes> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p[0], y + p[1]));
    let (mean_x, mean_y) = (sum_x / n, sum_y / n);

    let (mut cov_xx, mut cov_xy, mut cov_yy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p[0] - mean_x;
        let dy = p[1] - mean_y;
        cov_xx += dx * dx;
        cov_xy += dx * dy;
        cov_yy += dy * dy;
    }

    let trace = cov_xx + cov_yy;
    let det = cov_xx * cov_yy - cov_xy * cov_xy;
    // Rounding can push the discriminant a hair below zero for isotropic clouds.
    let spread = (trace * trace / 4.0 - det).max(0.0).sqrt();
    let lambda1 = trace / 2.0 + spread;
    let lambda2 = (trace / 2.0 - spread).max(0.0);

    let angle = if cov_xy.abs() > epsilon {
        (lambda1 - cov_xx).atan2(cov_xy)
    } else if cov_xx > cov_yy {
        0.0
    } else {
        std::f64::consts::FRAC_PI_2
    };

    Some(PrincipalAxes {
        angle_degrees: normalize_half_turn(angle.to_degrees()),
        major_axis: lambda1.sqrt(),
        minor_axis: lambda2.sqrt(),
    })
}

/// Fold an angle into (-90, 90]; text reads the same after a half turn.
fn normalize_half_turn(mut degrees: f64) -> f64 {
    while degrees > 90.0 {
        degrees -= 180.0;
    }
    while degrees <= -90.0 {
        degrees += 180.0;
    }
    degrees
}

fn label_rotation(axes: &PrincipalAxes, params: &PlacementParams) -> f64 {
    if axes.aspect_ratio() <= params.rotation_aspect_threshold {
        return 0.0;
    }
    let angle = axes.angle_degrees;
    let magnitude = angle.abs();
    if magnitude > 45.0 && magnitude < 135.0 {
        if angle > 0.0 { angle - 90.0 } else { angle + 90.0 }
    } else {
        angle
    }
}

pub fn font_size_for(bounds: &Bounds, params: &PlacementParams) -> u32 {
    let raw = bounds.area().max(0.0).sqrt() * params.font_scale;
    let clamped = raw.clamp(params.min_font_px as f64, params.max_font_px as f64);
    clamped.round() as u32
}

pub fn compute_label_placement(boundary: &Boundary) -> LabelPlacement {
    compute_label_placement_with(boundary, &PlacementParams::default())
}

/// Derive the label anchor, rotation and font size for a boundary.
///
/// Pure and total: malformed or empty shapes produce [`LabelPlacement::unplaced`].
pub fn compute_label_placement_with(
    boundary: &Boundary,
    params: &PlacementParams,
) -> LabelPlacement {
    let rings = boundary.rings();
    let Some(bounds) = Bounds::from_points(rings.iter().flat_map(|ring| ring.iter())) else {
        return LabelPlacement::unplaced(params);
    };

    let position = boundary
        .primary_ring()
        .and_then(|ring| polygon_centroid(ring))
        .unwrap_or_else(|| bounds.center());

    let points: Vec<[f64; 2]> = rings
        .iter()
        .flat_map(|ring| open_ring(ring).iter().copied())
        .collect();
    let rotation = principal_axes(&points, params.axis_epsilon)
        .map(|axes| label_rotation(&axes, params))
        .unwrap_or(0.0);

    LabelPlacement {
        position: Some(position),
        rotation_degrees: rotation.round() as i32,
        font_size_px: font_size_for(&bounds, params),
        bounds_summary: Some(bounds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Ring;

    fn assert_near(actual: f64, expected: f64, tolerance: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < tolerance,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    fn close(mut points: Vec<[f64; 2]>) -> Ring {
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
        points
    }

    fn square(min_lng: f64, min_lat: f64, side: f64) -> Ring {
        close(vec![
            [min_lng, min_lat],
            [min_lng + side, min_lat],
            [min_lng + side, min_lat + side],
            [min_lng, min_lat + side],
        ])
    }

    fn regular_polygon(center: [f64; 2], radius: f64, sides: usize) -> Ring {
        close(
            (0..sides)
                .map(|i| {
                    let theta = std::f64::consts::TAU * i as f64 / sides as f64;
                    [
                        center[0] + radius * theta.cos(),
                        center[1] + radius * theta.sin(),
                    ]
                })
                .collect(),
        )
    }

    /// Rectangle of `length` x `width` centered at `center`, long side rotated by `degrees`.
    fn rotated_rectangle(center: [f64; 2], length: f64, width: f64, degrees: f64) -> Ring {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let corners = [
            [-length / 2.0, -width / 2.0],
            [length / 2.0, -width / 2.0],
            [length / 2.0, width / 2.0],
            [-length / 2.0, width / 2.0],
        ];
        close(
            corners
                .iter()
                .map(|[x, y]| [center[0] + x * cos - y * sin, center[1] + x * sin + y * cos])
                .collect(),
        )
    }

    fn inside_convex(ring: &[[f64; 2]], point: LatLng) -> bool {
        let mut sign = 0.0f64;
        for pair in ring.windows(2) {
            let [x1, y1] = pair[0];
            let [x2, y2] = pair[1];
            let cross = (x2 - x1) * (point.lat - y1) - (y2 - y1) * (point.lng - x1);
            if cross.abs() < 1e-12 {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    #[test]
    fn convex_polygon_anchor_lies_inside_hull() {
        let ring = close(vec![
            [100.0, -2.0],
            [104.0, -3.0],
            [107.0, 0.5],
            [103.5, 4.0],
            [99.0, 1.0],
        ]);
        let placement = compute_label_placement(&Boundary::Polygon(ring.clone()));
        let position = placement.position.expect("placed");
        assert!(inside_convex(&ring, position), "{position:?} outside hull");
    }

    #[test]
    fn regular_shapes_center_and_stay_horizontal() {
        for sides in [4, 6, 8] {
            let ring = regular_polygon([110.0, -5.0], 2.0, sides);
            let placement = compute_label_placement(&Boundary::Polygon(ring));
            let position = placement.position.expect("placed");
            assert_near(position.lat, -5.0, 1e-7);
            assert_near(position.lng, 110.0, 1e-7);
            assert_eq!(placement.rotation_degrees, 0, "{sides} sides");
        }
    }

    #[test]
    fn axis_aligned_square_is_round() {
        let ring = square(0.0, 0.0, 4.0);
        let axes = principal_axes(open_ring(&ring), 1e-4).expect("axes");
        assert_near(axes.aspect_ratio(), 1.0, 1e-9);
    }

    #[test]
    fn collinear_ring_anchors_at_vertex_mean() {
        let ring = vec![[100.0, 0.0], [102.0, 1.0], [104.0, 2.0], [100.0, 0.0]];
        let placement = compute_label_placement(&Boundary::Polygon(ring));
        let position = placement.position.expect("placed");
        assert!(position.lat.is_finite() && position.lng.is_finite());
        assert_near(position.lat, 1.0, 1e-9);
        assert_near(position.lng, 102.0, 1e-9);
    }

    #[test]
    fn elongated_rectangle_follows_principal_axis() {
        let ring = rotated_rectangle([110.0, -6.0], 10.0, 2.0, 30.0);
        let placement = compute_label_placement(&Boundary::Polygon(ring));
        assert!((placement.rotation_degrees - 30).abs() <= 1);
        let position = placement.position.expect("placed");
        assert_near(position.lat, -6.0, 1e-7);
        assert_near(position.lng, 110.0, 1e-7);
    }

    #[test]
    fn negative_tilt_keeps_its_sign() {
        let ring = rotated_rectangle([110.0, -6.0], 10.0, 2.0, -20.0);
        let placement = compute_label_placement(&Boundary::Polygon(ring));
        assert!((placement.rotation_degrees + 20).abs() <= 1);
    }

    #[test]
    fn near_vertical_shape_folds_toward_horizontal() {
        let ring = rotated_rectangle([110.0, -6.0], 10.0, 2.0, 70.0);
        let placement = compute_label_placement(&Boundary::Polygon(ring));
        assert!((placement.rotation_degrees + 20).abs() <= 1);
    }

    #[test]
    fn moderately_elongated_shape_stays_horizontal() {
        let ring = rotated_rectangle([110.0, -6.0], 4.0, 2.0, 30.0);
        let placement = compute_label_placement(&Boundary::Polygon(ring));
        assert_eq!(placement.rotation_degrees, 0);
    }

    #[test]
    fn rotation_threshold_is_tunable() {
        let ring = rotated_rectangle([110.0, -6.0], 4.0, 2.0, 30.0);
        let params = PlacementParams {
            rotation_aspect_threshold: 1.5,
            ..PlacementParams::default()
        };
        let placement = compute_label_placement_with(&Boundary::Polygon(ring), &params);
        assert!((placement.rotation_degrees - 30).abs() <= 1);
    }

    #[test]
    fn angle_normalization_is_half_open() {
        assert_eq!(normalize_half_turn(90.0), 90.0);
        assert_eq!(normalize_half_turn(-90.0), 90.0);
        assert_eq!(normalize_half_turn(135.0), -45.0);
        assert_eq!(normalize_half_turn(-135.0), 45.0);
        assert_eq!(normalize_half_turn(180.0), 0.0);
    }

    #[test]
    fn font_size_is_monotonic_then_clamped() {
        let sizes: Vec<u32> = [0.2, 0.25, 0.3]
            .iter()
            .map(|side| {
                compute_label_placement(&Boundary::Polygon(square(100.0, 0.0, *side))).font_size_px
            })
            .collect();
        assert_eq!(sizes, vec![16, 20, 24]);

        let mut previous = 0;
        for step in 0..200 {
            let side = step as f64 * 0.01;
            let bounds = Bounds {
                min_lat: 0.0,
                max_lat: side,
                min_lng: 0.0,
                max_lng: side,
            };
            let size = font_size_for(&bounds, &PlacementParams::default());
            assert!((14..=28).contains(&size));
            assert!(size >= previous);
            previous = size;
        }
    }

    #[test]
    fn font_size_clamps_degenerate_and_huge_shapes() {
        let point_ring = vec![[100.0, 0.0], [100.0, 0.0]];
        let tiny = compute_label_placement(&Boundary::Polygon(point_ring));
        assert_eq!(tiny.font_size_px, 14);

        let huge = compute_label_placement(&Boundary::Polygon(square(60.0, -40.0, 80.0)));
        assert_eq!(huge.font_size_px, 28);
    }

    #[test]
    fn exclave_does_not_capture_the_label() {
        let exclave = square(130.0, 0.0, 0.1);
        let mainland = square(100.0, -5.0, 10.0);
        assert_near(crate::geometry::ring_area(&exclave), 0.01, 1e-9);
        assert_near(crate::geometry::ring_area(&mainland), 100.0, 1e-9);

        let boundary = Boundary::MultiPolygon(vec![exclave, mainland]);
        let position = compute_label_placement(&boundary).position.expect("placed");
        assert!(position.lng > 100.0 && position.lng < 110.0);
        assert!(position.lat > -5.0 && position.lat < 5.0);
    }

    #[test]
    fn collection_uses_first_feature_ring() {
        let boundary = Boundary::Collection(vec![
            Boundary::Polygon(square(100.0, 0.0, 2.0)),
            Boundary::Polygon(square(120.0, 0.0, 8.0)),
        ]);
        let placement = compute_label_placement(&boundary);
        let position = placement.position.expect("placed");
        assert_near(position.lng, 101.0, 1e-9);
        assert_near(position.lat, 1.0, 1e-9);
        let bounds = placement.bounds_summary.expect("bounds");
        assert_near(bounds.max_lng, 128.0, 1e-9);
    }

    #[test]
    fn collection_without_first_geometry_uses_bounds_center() {
        let boundary = Boundary::Collection(vec![
            Boundary::Empty,
            Boundary::Polygon(square(100.0, 0.0, 2.0)),
        ]);
        let position = compute_label_placement(&boundary).position.expect("placed");
        assert_near(position.lng, 101.0, 1e-9);
        assert_near(position.lat, 1.0, 1e-9);
    }

    #[test]
    fn empty_boundary_is_unplaced() {
        for boundary in [
            Boundary::Empty,
            Boundary::Polygon(Vec::new()),
            Boundary::MultiPolygon(Vec::new()),
            Boundary::Collection(vec![Boundary::Empty]),
        ] {
            let placement = compute_label_placement(&boundary);
            assert!(!placement.is_placed());
            assert!(placement.bounds_summary.is_none());
        }
    }

    #[test]
    fn placement_is_deterministic() {
        let boundary = Boundary::Polygon(rotated_rectangle([105.0, 1.0], 6.0, 1.0, 12.0));
        assert_eq!(
            compute_label_placement(&boundary),
            compute_label_placement(&boundary)
        );
    }
}
