pub mod api;
pub mod atlas;
pub mod colors;
pub mod geometry;
pub mod placement;

pub use api::{ActiveEntry, WikiLang, WikiSummary};
pub use atlas::*;
pub use colors::empire_color;
pub use geometry::{Boundary, Bounds, LatLng, Ring};
pub use placement::{
    LabelPlacement, PlacementParams, PrincipalAxes, compute_label_placement,
    compute_label_placement_with,
};
