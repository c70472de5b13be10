//! Geographic coordinates in radians and great-circle navigation on a sphere.

use crate::projection::tile::TileId;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

pub const RADIANS_TO_DEGREES: f64 = 180.0 / PI;
pub const DEGREES_TO_RADIANS: f64 = PI / 180.0;

/// Latitude (degrees) of the top and bottom edge of the Web-Mercator grid.
pub const MAX_LATITUDE_DEGREES: f64 = 85.051_128_779_806_59;

/// Mean Earth radius in kilometers used for great-circle math.
pub const EARTH_RADIUS_KM: f64 = 6371.01;

/// A point on the globe, stored in radians.
///
/// `x` is the longitude in `(-π, π]` and `y` the latitude in `[-π/2, π/2]`.
/// Conversions to and from degrees only happen through the explicit
/// `*_degrees` helpers.
///
/// # Examples
///
/// ```
/// use aviwx::Coordinate;
///
/// let helsinki = Coordinate::from_degrees(24.94, 60.17);
/// assert!((helsinki.latitude() - 60.17).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Longitude in radians.
    pub x: f64,
    /// Latitude in radians.
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Builds a coordinate from a longitude and latitude given in degrees.
    pub fn from_degrees(longitude: f64, latitude: f64) -> Self {
        Self {
            x: longitude * DEGREES_TO_RADIANS,
            y: latitude * DEGREES_TO_RADIANS,
        }
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.x * RADIANS_TO_DEGREES
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.y * RADIANS_TO_DEGREES
    }

    /// Returns the Web-Mercator tile containing this coordinate at `zoom`,
    /// shifted by `offset_x` columns and `offset_y` rows.
    ///
    /// The offsets are used to address the tile one step past an edge, which
    /// turns a pair of corner tiles into a half-open tile range (see
    /// [`crate::BoundingBox::tiles`]).
    ///
    /// # Examples
    ///
    /// ```
    /// use aviwx::{Coordinate, TileId};
    ///
    /// let origin = Coordinate::from_degrees(0.0, 0.0);
    /// assert_eq!(origin.tile(1, 0, 0), TileId::new(1, 1, 1));
    /// ```
    pub fn tile(&self, zoom: u32, offset_x: i32, offset_y: i32) -> TileId {
        let scale = 2f64.powi(zoom as i32);
        // Poles and the antimeridian project onto the grid edge.
        let last = scale - 1.0;

        let lon = self.x * RADIANS_TO_DEGREES;
        let x = ((lon + 180.0) / 360.0 * scale).floor().clamp(0.0, last) as i32;

        let limit = MAX_LATITUDE_DEGREES * DEGREES_TO_RADIANS;
        let lat = self.y.clamp(-limit, limit);
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale)
            .floor()
            .clamp(0.0, last) as i32;

        TileId::new(x.saturating_add(offset_x), y.saturating_add(offset_y), zoom)
    }

    /// Finds the point reached by travelling `distance_km` along a great
    /// circle starting at `self` with an initial bearing of `bearing_deg`
    /// (degrees clockwise from north), using [`EARTH_RADIUS_KM`].
    ///
    /// The computation uses the spherical law of cosines. The longitude
    /// becomes `NaN` when the path ends at (or passes through) a pole and
    /// when it ends at the antipode of `self`, where `sin(nA)` tends to zero;
    /// callers must tolerate that result.
    pub fn destination(&self, distance_km: f64, bearing_deg: f64) -> Coordinate {
        self.destination_on_sphere(distance_km, bearing_deg, EARTH_RADIUS_KM)
    }

    /// Same as [`Coordinate::destination`] on a sphere of `radius_km`.
    pub fn destination_on_sphere(
        &self,
        distance_km: f64,
        bearing_deg: f64,
        radius_km: f64,
    ) -> Coordinate {
        let lat1 = self.y;
        let lon1 = self.x;
        let bearing = bearing_deg * DEGREES_TO_RADIANS;

        // Angular distance travelled and resulting colatitude.
        let n_c = distance_km / radius_km;
        let n_a = (n_c.cos() * (FRAC_PI_2 - lat1).cos()
            + (FRAC_PI_2 - lat1).sin() * n_c.sin() * bearing.cos())
        .acos();
        let d_lon = (n_c.sin() * bearing.sin() / n_a.sin()).asin();

        Coordinate::new(wrap_longitude(lon1 + d_lon), FRAC_PI_2 - n_a)
    }
}

/// Brings a longitude back into `(-π, π]`. `NaN` passes through untouched.
fn wrap_longitude(x: f64) -> f64 {
    if x > PI {
        x - 2.0 * PI
    } else if x <= -PI {
        x + 2.0 * PI
    } else {
        x
    }
}
