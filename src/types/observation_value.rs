//! Defines `ObservationValue`, selecting which measured quantity a weather layer
//! displays for each observation.

use crate::types::observation::Observation;
use std::fmt;

/// The quantity shown on the map for an observation.
///
/// Each variant maps an [`Observation`] to a single integer value, or `None`
/// when the report does not carry that quantity (in which case the
/// observation is simply not drawn for that layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationValue {
    /// Lowest broken/overcast layer, hundreds of feet.
    Ceiling,
    /// Prevailing visibility, meters.
    Visibility,
    /// Cloud base estimated from the temperature/dew point spread, hundreds of
    /// feet. Only METARs carry temperatures.
    Temperature,
}

impl ObservationValue {
    pub const ALL: [ObservationValue; 3] = [
        ObservationValue::Ceiling,
        ObservationValue::Visibility,
        ObservationValue::Temperature,
    ];

    /// Extracts this layer's value from `observation`.
    ///
    /// # Examples
    ///
    /// ```
    /// use aviwx::{Metar, Observation, ObservationValue};
    /// use chrono::Utc;
    ///
    /// let obs = Observation::Metar(Metar {
    ///     identifier: "EFHK".into(),
    ///     datetime: Utc::now(),
    ///     raw: String::new(),
    ///     cloud_height: Some(12),
    ///     visibility: Some(9999),
    ///     temperature: Some(8),
    ///     dew_point: Some(3),
    /// });
    /// assert_eq!(ObservationValue::Ceiling.value(&obs), Some(12));
    /// assert_eq!(ObservationValue::Temperature.value(&obs), Some(20));
    /// ```
    pub fn value(&self, observation: &Observation) -> Option<i32> {
        match self {
            ObservationValue::Ceiling => observation.cloud_height(),
            ObservationValue::Visibility => observation.visibility(),
            ObservationValue::Temperature => observation.as_metar()?.spread_ceiling(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObservationValue::Ceiling => "ceiling",
            ObservationValue::Visibility => "visibility",
            ObservationValue::Temperature => "temperature",
        }
    }
}

impl fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
