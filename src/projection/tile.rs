//! Web-Mercator (XYZ) tile addressing.

use crate::projection::bounding_box::BoundingBox;
use crate::projection::coordinate::Coordinate;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::ops::Range;

/// A tile coordinate (x/y at zoom `level`).
///
/// Rows grow southwards: `y == 0` is the northernmost row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
    /// Zoom level
    pub level: u32,
}

impl TileId {
    pub const fn new(x: i32, y: i32, level: u32) -> Self {
        Self { x, y, level }
    }

    /// The north-west corner of the tile.
    pub fn coordinate(&self) -> Coordinate {
        corner(self.x, self.y, self.level)
    }

    /// The area covered by the tile.
    ///
    /// The lower-left corner is taken from the row below (`y + 1`) because
    /// tile rows and latitudes grow in opposite directions.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            corner(self.x, self.y + 1, self.level),
            corner(self.x + 1, self.y, self.level),
        )
    }

    /// Cache key fragment in the usual `z/x/y` order.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.level, self.x, self.y)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

fn corner(x: i32, y: i32, level: u32) -> Coordinate {
    let scale = 2f64.powi(level as i32);

    let lon = f64::from(x) / scale * 360.0 - 180.0;

    let n = PI - 2.0 * PI * f64::from(y) / scale;
    let lat = n.sinh().atan().to_degrees();

    Coordinate::from_degrees(lon, lat)
}

/// The pair of corner tiles produced by [`BoundingBox::tiles`].
///
/// `lower_left` is the tile under the south-west corner shifted one row south,
/// `upper_right` the tile under the north-east corner shifted one column east.
/// Together they describe the half-open ranges returned by
/// [`TileRange::columns`] and [`TileRange::rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub lower_left: TileId,
    pub upper_right: TileId,
}

impl TileRange {
    pub fn level(&self) -> u32 {
        self.lower_left.level
    }

    /// Columns covered, west to east.
    pub fn columns(&self) -> Range<i32> {
        self.lower_left.x..self.upper_right.x
    }

    /// Rows covered, north to south.
    pub fn rows(&self) -> Range<i32> {
        self.upper_right.y..self.lower_left.y
    }

    pub fn len(&self) -> usize {
        self.columns().len() * self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every tile in the range, row by row.
    pub fn iter(&self) -> impl Iterator<Item = TileId> + '_ {
        let level = self.level();
        self.rows()
            .flat_map(move |y| self.columns().map(move |x| TileId::new(x, y, level)))
    }
}
