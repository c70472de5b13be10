//! Upstream sources of stations and raw observation text.

pub mod adds;
pub mod error;

use crate::fetch::error::FetchError;
use crate::types::observation::ObservationKind;
use crate::types::station::Station;
use std::future::Future;

/// Where stations and raw METAR/TAF records come from.
///
/// [`adds::AddsClient`] talks to aviationweather.gov. Tests plug in an
/// in-process implementation.
pub trait WeatherSource: Send + Sync {
    /// The complete, unfiltered station list.
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Station>, FetchError>> + Send;

    /// One raw text record per report of `kind` for the given stations.
    fn fetch_observations(
        &self,
        kind: ObservationKind,
        identifiers: &[String],
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;
}

/// Splits a raw text response into records. Indented lines continue the
/// record above them (TAF change groups); blank lines are skipped.
pub fn split_records(body: &str) -> Vec<String> {
    let mut records: Vec<String> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let continues = line.starts_with(char::is_whitespace);
        match records.last_mut() {
            Some(last) if continues => {
                last.push(' ');
                last.push_str(trimmed);
            }
            _ => records.push(trimmed.to_string()),
        }
    }
    records
}
