//! Human readable age of a displayed frame.

use crate::types::observation::Observation;
use chrono::{DateTime, Utc};

pub const NO_DATA: &str = "No data, click to reload.";

const SIX_HOURS: i64 = 6 * 3600;

/// Status line for one frame, e.g. `"2h 5m ago"` or `"1d 3h forecast"`.
///
/// TAF frames report how far away the latest validity end is; other frames
/// report the age of their oldest observation.
pub fn frame_status(observations: &[Observation], now: DateTime<Utc>) -> String {
    let tafs: Vec<_> = observations.iter().filter_map(Observation::as_taf).collect();
    let (reference, suffix) = if !tafs.is_empty() && tafs.len() == observations.len() {
        (tafs.iter().map(|taf| taf.to).max(), "forecast")
    } else {
        (observations.iter().map(Observation::datetime).min(), "ago")
    };
    match reference {
        Some(datetime) => format!("{} {}", format_span((datetime - now).num_seconds().abs()), suffix),
        None => NO_DATA.to_string(),
    }
}

/// Two most significant units, leading zero units dropped.
fn format_span(seconds: i64) -> String {
    if seconds < SIX_HOURS {
        let (hours, minutes) = (seconds / 3600, seconds % 3600 / 60);
        if hours == 0 {
            format!("{minutes}m")
        } else {
            format!("{hours}h {minutes}m")
        }
    } else {
        let (days, hours) = (seconds / 86_400, seconds % 86_400 / 3600);
        if days == 0 {
            format!("{hours}h")
        } else {
            format!("{days}d {hours}h")
        }
    }
}
