use crate::projection::coordinate::Coordinate;
use crate::projection::tile::TileRange;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle given by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lower_left: Coordinate,
    pub upper_right: Coordinate,
}

impl BoundingBox {
    pub const fn new(lower_left: Coordinate, upper_right: Coordinate) -> Self {
        Self {
            lower_left,
            upper_right,
        }
    }

    /// Strict containment: a point lying on an edge or a corner is outside.
    pub fn contains(&self, c: Coordinate) -> bool {
        self.lower_left.x < c.x
            && self.lower_left.y < c.y
            && c.x < self.upper_right.x
            && c.y < self.upper_right.y
    }

    /// Tiles covering the box at `zoom`.
    ///
    /// The lower-left corner is projected with a one row offset and the
    /// upper-right corner with a one column offset, so that the result is an
    /// inclusive cover expressed as half-open ranges.
    ///
    /// # Examples
    ///
    /// ```
    /// use aviwx::{BoundingBox, Coordinate};
    ///
    /// let finland = BoundingBox::new(
    ///     Coordinate::from_degrees(20.0, 59.0),
    ///     Coordinate::from_degrees(31.0, 70.0),
    /// );
    /// let range = finland.tiles(6);
    /// assert_eq!(range.columns(), 35..38);
    /// assert_eq!(range.rows(), 14..19);
    /// ```
    pub fn tiles(&self, zoom: u32) -> TileRange {
        TileRange {
            lower_left: self.lower_left.tile(zoom, 0, 1),
            upper_right: self.upper_right.tile(zoom, 1, 0),
        }
    }
}
