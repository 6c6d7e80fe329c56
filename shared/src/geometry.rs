use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};

/// Geographic point in latitude/longitude order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Closed ring of `[lng, lat]` points (GeoJSON order). First and last point are identical.
pub type Ring = Vec<[f64; 2]>;

/// Territory shape for one historical snapshot.
///
/// Decoding from GeoJSON never fails: anything unrecognizable becomes [`Boundary::Empty`],
/// which the label engine turns into an unplaced label.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Boundary {
    #[default]
    Empty,
    Polygon(Ring),
    MultiPolygon(Vec<Ring>),
    /// Named sub-shapes of one logical territory (a GeoJSON feature collection).
    /// Empty features are kept so "first feature" keeps its meaning.
    Collection(Vec<Boundary>),
}

impl Boundary {
    /// Decode a GeoJSON geometry, feature, or feature collection.
    ///
    /// Only outer rings are kept; holes are irrelevant for label placement.
    pub fn from_geojson(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("Polygon") => value
                .get("coordinates")
                .and_then(decode_polygon)
                .map(Boundary::Polygon)
                .unwrap_or_default(),
            Some("MultiPolygon") => {
                let rings: Vec<Ring> = value
                    .get("coordinates")
                    .and_then(Value::as_array)
                    .map(|polygons| polygons.iter().filter_map(decode_polygon).collect())
                    .unwrap_or_default();
                if rings.is_empty() {
                    Boundary::Empty
                } else {
                    Boundary::MultiPolygon(rings)
                }
            }
            Some("Feature") => value
                .get("geometry")
                .map(Self::from_geojson)
                .unwrap_or_default(),
            Some("FeatureCollection") => {
                let features: Vec<Boundary> = value
                    .get("features")
                    .and_then(Value::as_array)
                    .map(|features| features.iter().map(Self::from_geojson).collect())
                    .unwrap_or_default();
                if features.iter().all(Boundary::is_empty) {
                    Boundary::Empty
                } else {
                    Boundary::Collection(features)
                }
            }
            _ => Boundary::Empty,
        }
    }

    pub fn to_geojson(&self) -> Value {
        match self {
            Boundary::Empty => Value::Null,
            Boundary::Polygon(ring) => json!({ "type": "Polygon", "coordinates": [ring] }),
            Boundary::MultiPolygon(rings) => {
                let polygons: Vec<[&Ring; 1]> = rings.iter().map(|ring| [ring]).collect();
                json!({ "type": "MultiPolygon", "coordinates": polygons })
            }
            Boundary::Collection(features) => {
                let features: Vec<Value> = features
                    .iter()
                    .map(|feature| {
                        json!({
                            "type": "Feature",
                            "properties": {},
                            "geometry": feature.to_geojson(),
                        })
                    })
                    .collect();
                json!({ "type": "FeatureCollection", "features": features })
            }
        }
    }

    /// Every outer ring of the shape, in declaration order.
    pub fn rings(&self) -> Vec<&Ring> {
        let mut out = Vec::new();
        self.collect_rings(&mut out);
        out
    }

    fn collect_rings<'a>(&'a self, out: &mut Vec<&'a Ring>) {
        match self {
            Boundary::Empty => {}
            Boundary::Polygon(ring) => out.push(ring),
            Boundary::MultiPolygon(rings) => out.extend(rings.iter()),
            Boundary::Collection(features) => {
                for feature in features {
                    feature.collect_rings(out);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Boundary::Empty => true,
            Boundary::Polygon(ring) => ring.is_empty(),
            Boundary::MultiPolygon(rings) => rings.iter().all(Vec::is_empty),
            Boundary::Collection(features) => features.iter().all(Boundary::is_empty),
        }
    }

    /// The ring a label should be anchored in.
    ///
    /// Multi-polygons pick their largest ring so a small exclave never wins over the
    /// main landmass; collections defer to their first feature.
    pub fn primary_ring(&self) -> Option<&Ring> {
        match self {
            Boundary::Empty => None,
            Boundary::Polygon(ring) => (!ring.is_empty()).then_some(ring),
            Boundary::MultiPolygon(rings) => {
                let mut largest: Option<(&Ring, f64)> = None;
                for ring in rings.iter().filter(|ring| !ring.is_empty()) {
                    let area = ring_area(ring);
                    match largest {
                        Some((_, best)) if area <= best => {}
                        _ => largest = Some((ring, area)),
                    }
                }
                largest.map(|(ring, _)| ring)
            }
            Boundary::Collection(features) => features.first().and_then(Boundary::primary_ring),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.rings().into_iter().flatten())
    }

    /// Hit test against any outer ring.
    pub fn contains(&self, point: LatLng) -> bool {
        self.rings()
            .into_iter()
            .any(|ring| ring_contains(ring, point))
    }
}

impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Boundary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Boundary::from_geojson(&value))
    }
}

fn decode_point(value: &Value) -> Option<[f64; 2]> {
    let coords = value.as_array()?;
    let lng = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    (lng.is_finite() && lat.is_finite()).then_some([lng, lat])
}

fn decode_ring(value: &Value) -> Option<Ring> {
    let mut ring: Ring = value.as_array()?.iter().filter_map(decode_point).collect();
    let first = *ring.first()?;
    if ring.last() != Some(&first) {
        ring.push(first);
    }
    Some(ring)
}

/// Outer ring of a GeoJSON polygon's `coordinates`.
fn decode_polygon(value: &Value) -> Option<Ring> {
    value.as_array()?.first().and_then(decode_ring)
}

/// Ring points without the closing duplicate.
pub fn open_ring(ring: &[[f64; 2]]) -> &[[f64; 2]] {
    match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

/// Signed shoelace area over consecutive point pairs. Counter-clockwise rings are positive.
pub fn ring_signed_area(ring: &[[f64; 2]]) -> f64 {
    ring.windows(2)
        .map(|pair| pair[0][0] * pair[1][1] - pair[1][0] * pair[0][1])
        .sum::<f64>()
        * 0.5
}

pub fn ring_area(ring: &[[f64; 2]]) -> f64 {
    ring_signed_area(ring).abs()
}

const DEGENERATE_AREA_RATIO: f64 = 1e-10;

/// Area-weighted centroid of a closed ring, returned as (lat, lng).
///
/// A signed area that is zero up to rounding (collinear or self-cancelling ring) falls back
/// to the plain mean of the vertices. Returns `None` only for an empty ring.
pub fn polygon_centroid(ring: &[[f64; 2]]) -> Option<LatLng> {
    // Work relative to the first vertex; the formula is translation-invariant and
    // raw degree coordinates (~100) lose precision in the cross products.
    let [ox, oy] = *ring.first()?;
    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut cross_magnitude = 0.0;
    for pair in ring.windows(2) {
        let (x1, y1) = (pair[0][0] - ox, pair[0][1] - oy);
        let (x2, y2) = (pair[1][0] - ox, pair[1][1] - oy);
        let cross = x1 * y2 - x2 * y1;
        area += cross;
        cross_magnitude += (x1 * y2).abs() + (x2 * y1).abs();
        cx += (x1 + x2) * cross;
        cy += (y1 + y2) * cross;
    }
    area *= 0.5;

    // Cancellation leaves rounding noise proportional to the product magnitudes.
    if area.abs() <= DEGENERATE_AREA_RATIO * cross_magnitude || area == 0.0 {
        return vertex_mean(ring);
    }

    Some(LatLng::new(
        oy + cy / (6.0 * area),
        ox + cx / (6.0 * area),
    ))
}

/// Unweighted mean of the ring's distinct vertices.
pub fn vertex_mean(ring: &[[f64; 2]]) -> Option<LatLng> {
    let points = open_ring(ring);
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sum_lng, sum_lat) = points
        .iter()
        .fold((0.0, 0.0), |(lng, lat), p| (lng + p[0], lat + p[1]));
    Some(LatLng::new(sum_lat / n, sum_lng / n))
}

/// Even-odd crossing test; points exactly on an edge may land either way.
pub fn ring_contains(ring: &[[f64; 2]], point: LatLng) -> bool {
    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    for pair in ring.windows(2) {
        let [x1, y1] = pair[0];
        let [x2, y2] = pair[1];
        if (y1 > y) != (y2 > y) {
            let cross_x = x1 + (y - y1) * (x2 - x1) / (y2 - y1);
            if x < cross_x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 2]>) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for &[lng, lat] in points {
            let b = bounds.get_or_insert(Bounds {
                min_lat: lat,
                max_lat: lat,
                min_lng: lng,
                max_lng: lng,
            });
            b.min_lat = b.min_lat.min(lat);
            b.max_lat = b.max_lat.max(lat);
            b.min_lng = b.min_lng.min(lng);
            b.max_lng = b.max_lng.max(lng);
        }
        bounds
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}
