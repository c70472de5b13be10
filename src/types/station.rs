//! Aviation weather stations as known to the upstream source and the local store.

use crate::projection::coordinate::Coordinate;
use serde::{Deserialize, Serialize};

/// A reporting station.
///
/// Stations are replaced wholesale on every station refresh and are never
/// edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// ICAO location indicator, e.g. "EFHK". Unique key.
    pub identifier: String,
    /// Human readable site name, if the source provides one.
    pub name: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// The station issues METAR reports.
    pub has_metar: bool,
    /// The station issues TAF forecasts.
    pub has_taf: bool,
}

impl Station {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::from_degrees(self.longitude, self.latitude)
    }

    /// True when the station publishes anything this crate can ingest.
    pub fn reports_weather(&self) -> bool {
        self.has_metar || self.has_taf
    }
}
