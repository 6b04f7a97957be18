//! Data models for saved map markers.
//!
//! - `LatLon`: coordinate, usable as a map key
//! - `MarkerColor`: the fixed seven-entry palette and batch color assignment
//! - `PointDescription`: label, type tag and the pending-address flag
//! - `Marker`, `MarkerRecord`: materialized marker and its stored form

pub mod color;
pub mod coordinate;
pub mod description;
pub mod marker;

pub use color::{assign_colors, MarkerColor, MARKER_COLORS_COUNT};
pub use coordinate::LatLon;
pub use description::{
    DescriptionKind, PointDescription, ADDRESS_NOT_FOUND, MAP_MARKER_TYPE_NAME, SEARCHING_ADDRESS,
};
pub use marker::{Marker, MarkerList, MarkerRecord, MarkerState};
