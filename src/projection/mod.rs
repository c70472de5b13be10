//! Coordinate ↔ tile conversions, bounding boxes and great-circle navigation.
//!
//! Everything in here is pure and allocation free, so it can be called from
//! any thread without coordination.

pub mod bounding_box;
pub mod coordinate;
pub mod tile;
