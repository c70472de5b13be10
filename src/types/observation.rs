//! METAR and TAF reports tied to a station.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two report categories fetched from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationKind {
    /// Routine surface observation.
    Metar,
    /// Terminal aerodrome forecast.
    Taf,
}

impl ObservationKind {
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            ObservationKind::Metar => "metar",
            ObservationKind::Taf => "taf",
        }
    }

    /// The report type keyword as it appears in raw text.
    pub fn keyword(&self) -> &'static str {
        match self {
            ObservationKind::Metar => "METAR",
            ObservationKind::Taf => "TAF",
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// A decoded METAR.
///
/// Heights are in hundreds of feet and visibility in meters, as reported.
/// `9999` visibility means 10 km or more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metar {
    pub identifier: String,
    pub datetime: DateTime<Utc>,
    pub raw: String,
    /// Lowest broken, overcast or vertical visibility layer.
    pub cloud_height: Option<i32>,
    pub visibility: Option<i32>,
    /// Air temperature, °C.
    pub temperature: Option<i32>,
    /// Dew point, °C.
    pub dew_point: Option<i32>,
}

impl Metar {
    /// Temperature minus dew point.
    pub fn spread(&self) -> Option<i32> {
        Some(self.temperature? - self.dew_point?)
    }

    /// Estimated convective cloud base from the spread, in hundreds of feet
    /// (roughly 400 ft per °C of spread).
    pub fn spread_ceiling(&self) -> Option<i32> {
        self.spread().map(|spread| spread.max(0) * 4)
    }
}

/// A decoded TAF. `datetime` is the issue time, `from`/`to` the validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taf {
    pub identifier: String,
    pub datetime: DateTime<Utc>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub raw: String,
    /// Lowest broken, overcast or vertical visibility layer of the base
    /// forecast, hundreds of feet.
    pub cloud_height: Option<i32>,
    pub visibility: Option<i32>,
}

/// Either kind of report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Observation {
    Metar(Metar),
    Taf(Taf),
}

impl Observation {
    pub fn kind(&self) -> ObservationKind {
        match self {
            Observation::Metar(_) => ObservationKind::Metar,
            Observation::Taf(_) => ObservationKind::Taf,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Observation::Metar(m) => &m.identifier,
            Observation::Taf(t) => &t.identifier,
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        match self {
            Observation::Metar(m) => m.datetime,
            Observation::Taf(t) => t.datetime,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Observation::Metar(m) => &m.raw,
            Observation::Taf(t) => &t.raw,
        }
    }

    pub fn cloud_height(&self) -> Option<i32> {
        match self {
            Observation::Metar(m) => m.cloud_height,
            Observation::Taf(t) => t.cloud_height,
        }
    }

    pub fn visibility(&self) -> Option<i32> {
        match self {
            Observation::Metar(m) => m.visibility,
            Observation::Taf(t) => t.visibility,
        }
    }

    pub fn as_metar(&self) -> Option<&Metar> {
        match self {
            Observation::Metar(m) => Some(m),
            Observation::Taf(_) => None,
        }
    }

    pub fn as_taf(&self) -> Option<&Taf> {
        match self {
            Observation::Taf(t) => Some(t),
            Observation::Metar(_) => None,
        }
    }
}

impl From<Metar> for Observation {
    fn from(value: Metar) -> Self {
        Observation::Metar(value)
    }
}

impl From<Taf> for Observation {
    fn from(value: Taf) -> Self {
        Observation::Taf(value)
    }
}
