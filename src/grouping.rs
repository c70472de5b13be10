//! Partitions observations into fixed-width timeslots for playback.

use crate::types::observation::Observation;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// One bucket `[from, to)` and the observations whose `datetime` falls in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeslot {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub observations: Vec<Observation>,
}

/// Non-empty timeslots, oldest first, plus the frame to show initially.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationGroups {
    pub timeslots: Vec<Timeslot>,
    pub selected_frame: Option<usize>,
}

impl ObservationGroups {
    /// Observations of frame `frame`; empty when out of range.
    pub fn go(&self, frame: usize) -> &[Observation] {
        self.timeslots
            .get(frame)
            .map(|slot| slot.observations.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.timeslots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeslots.is_empty()
    }
}

fn bucket_start(datetime: DateTime<Utc>, width_seconds: i64) -> DateTime<Utc> {
    let start = datetime.timestamp().div_euclid(width_seconds) * width_seconds;
    Utc.timestamp_opt(start, 0).single().unwrap_or(datetime)
}

/// Buckets `observations` into `bucket_minutes` wide slots aligned on the
/// Unix epoch (30 minutes gives :00 and :30).
///
/// The selected frame is the newest bucket that has fully elapsed at `now`.
/// If no bucket has elapsed yet, the newest bucket is selected instead.
///
/// # Examples
///
/// ```
/// use aviwx::group;
/// use chrono::Utc;
///
/// let groups = group(Vec::new(), 30, Utc::now());
/// assert!(groups.is_empty());
/// assert_eq!(groups.selected_frame, None);
/// ```
pub fn group(
    mut observations: Vec<Observation>,
    bucket_minutes: i64,
    now: DateTime<Utc>,
) -> ObservationGroups {
    let width = Duration::minutes(bucket_minutes.max(1));
    observations.sort_by_key(Observation::datetime);

    let mut timeslots: Vec<Timeslot> = Vec::new();
    for observation in observations {
        let from = bucket_start(observation.datetime(), width.num_seconds());
        match timeslots.last_mut() {
            Some(slot) if slot.from == from => slot.observations.push(observation),
            _ => timeslots.push(Timeslot {
                from,
                to: from + width,
                observations: vec![observation],
            }),
        }
    }

    let selected_frame = timeslots
        .iter()
        .rposition(|slot| slot.to <= now)
        .or_else(|| timeslots.len().checked_sub(1));

    ObservationGroups {
        timeslots,
        selected_frame,
    }
}
