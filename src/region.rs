//! The monitored region and its on-disk persistence.

use crate::projection::bounding_box::BoundingBox;
use crate::projection::coordinate::{Coordinate, DEGREES_TO_RADIANS, MAX_LATITUDE_DEGREES};
use crate::projection::tile::TileRange;
use crate::store::error::StoreError;
use crate::store::write_atomic;
use haversine::{distance, Location as HaversineLocation, Units};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::io;
use std::path::{Path, PathBuf};

const REGION_FILE_NAME: &str = "region.json";

/// A circular area around `center` that scopes which stations are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Coordinate,
    pub radius_km: f64,
}

impl Region {
    pub fn new(center: Coordinate, radius_km: f64) -> Self {
        Self { center, radius_km }
    }

    /// Great-circle distance from the center to a point given in degrees.
    pub fn distance_km(&self, latitude: f64, longitude: f64) -> f64 {
        distance(
            HaversineLocation {
                latitude: self.center.latitude(),
                longitude: self.center.longitude(),
            },
            HaversineLocation {
                latitude,
                longitude,
            },
            Units::Kilometers,
        )
    }

    /// True if the point (degrees) lies within `radius_km` of the center.
    ///
    /// # Examples
    ///
    /// ```
    /// use aviwx::{Coordinate, Region};
    ///
    /// let helsinki = Region::new(Coordinate::from_degrees(24.94, 60.17), 100.0);
    /// assert!(!helsinki.in_range(60.45, 22.26)); // Turku, ~150 km
    /// assert!(helsinki.in_range(60.32, 24.96)); // EFHK
    /// ```
    pub fn in_range(&self, latitude: f64, longitude: f64) -> bool {
        self.distance_km(latitude, longitude) <= self.radius_km
    }

    /// The box spanned by the four cardinal points at `radius_km`, limited
    /// to the Web-Mercator grid.
    ///
    /// A region that reaches a pole or straddles the antimeridian gets the
    /// full longitude span `(-π, π)`.
    pub fn bounding_box(&self, earth_radius_km: f64) -> BoundingBox {
        let reach = |bearing| {
            self.center
                .destination_on_sphere(self.radius_km, bearing, earth_radius_km)
        };
        let angular = self.radius_km / earth_radius_km;
        let reaches_north_pole = self.center.y + angular >= FRAC_PI_2;
        let reaches_south_pole = self.center.y - angular <= -FRAC_PI_2;

        let limit = MAX_LATITUDE_DEGREES * DEGREES_TO_RADIANS;
        let north = if reaches_north_pole { limit } else { reach(0.0).y.clamp(-limit, limit) };
        let south = if reaches_south_pole { -limit } else { reach(180.0).y.clamp(-limit, limit) };

        let (west, east) = (reach(270.0).x, reach(90.0).x);
        // also catches NaN longitudes
        let (west, east) = if reaches_north_pole || reaches_south_pole || !(west < east) {
            (-PI, PI)
        } else {
            (west, east)
        };

        BoundingBox::new(Coordinate::new(west, south), Coordinate::new(east, north))
    }

    /// Tiles that must be rendered to cover the region at `zoom`.
    pub fn tiles(&self, zoom: u32, earth_radius_km: f64) -> TileRange {
        self.bounding_box(earth_radius_km).tiles(zoom)
    }
}

/// Loads and saves the single active [`Region`] as JSON in the cache directory.
#[derive(Debug, Clone)]
pub struct RegionStore {
    path: PathBuf,
}

impl RegionStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(REGION_FILE_NAME),
        }
    }

    /// The stored region, or `None` if none was ever saved.
    pub async fn load(&self) -> Result<Option<Region>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::RegionDecode(self.path.clone(), e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::CacheRead(self.path.clone(), e)),
        }
    }

    /// Persists `region`, returning whether the stored value changed.
    pub async fn save(&self, region: &Region) -> Result<bool, StoreError> {
        let current = self.load().await.unwrap_or_else(|e| {
            warn!("Ignoring unreadable region file: {}", e);
            None
        });
        if current.as_ref() == Some(region) {
            return Ok(false);
        }

        let json = serde_json::to_vec_pretty(region).map_err(StoreError::RegionEncode)?;
        write_atomic(&self.path, json).await?;
        info!(
            "Saved region ({:.4}, {:.4}) r={} km to {}",
            region.center.latitude(),
            region.center.longitude(),
            region.radius_km,
            self.path.display()
        );
        Ok(true)
    }
}
