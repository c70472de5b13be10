//! Decoding of raw METAR and TAF text into [`Observation`]s.
//!
//! Only the groups the map layers need are decoded: station, issue time,
//! validity (TAF), prevailing visibility, ceiling and temperature/dew point
//! (METAR). Everything after the first trend or change group is ignored.

use crate::types::observation::{Metar, Observation, ObservationKind, Taf};
use crate::types::station::Station;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use log::debug;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while_m_n};
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::sequence::{pair, preceded, separated_pair, terminated, tuple};
use nom::IResult;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Reported as "9999": 10 km or more.
const MAX_VISIBILITY: i32 = 9999;
const METERS_PER_STATUTE_MILE: f64 = 1609.344;

fn number<'a>(width: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(
        take_while_m_n(width, width, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u32>(),
    )
}

fn integer(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn station_id(input: &str) -> IResult<&str, &str> {
    all_consuming(take_while_m_n(4, 4, |c: char| c.is_ascii_alphanumeric()))(input)
}

/// `DDHHMMZ`
fn issue_time(input: &str) -> IResult<&str, (u32, u32, u32)> {
    all_consuming(terminated(
        tuple((number(2), number(2), number(2))),
        tag("Z"),
    ))(input)
}

/// `DDHH/DDHH`
fn validity(input: &str) -> IResult<&str, ((u32, u32), (u32, u32))> {
    all_consuming(separated_pair(
        pair(number(2), number(2)),
        char('/'),
        pair(number(2), number(2)),
    ))(input)
}

/// `BKN012`, `OVC005CB`, `VV///`
fn cloud_layer(input: &str) -> IResult<&str, (&str, Option<u32>)> {
    pair(
        alt((tag("FEW"), tag("SCT"), tag("BKN"), tag("OVC"), tag("VV"))),
        opt(number(3)),
    )(input)
}

fn celsius(input: &str) -> IResult<&str, i32> {
    map(pair(opt(char('M')), number(2)), |(minus, value)| {
        let value = value as i32;
        if minus.is_some() {
            -value
        } else {
            value
        }
    })(input)
}

/// `08/03`, `M02/M05`, `12/`
fn temperatures(input: &str) -> IResult<&str, (i32, Option<i32>)> {
    all_consuming(separated_pair(celsius, char('/'), opt(celsius)))(input)
}

fn fraction(input: &str) -> IResult<&str, f64> {
    map_res(
        separated_pair(integer, char('/'), integer),
        |(numerator, denominator)| {
            if denominator == 0 {
                Err("zero denominator")
            } else {
                Ok(f64::from(numerator) / f64::from(denominator))
            }
        },
    )(input)
}

/// `10SM`, `P6SM`, `1/2SM`, `M1/4SM`
fn statute_miles(input: &str) -> IResult<&str, f64> {
    all_consuming(terminated(
        preceded(
            opt(alt((char('P'), char('M')))),
            alt((fraction, map(integer, f64::from))),
        ),
        tag("SM"),
    ))(input)
}

fn miles_to_meters(miles: f64) -> i32 {
    ((miles * METERS_PER_STATUTE_MILE).round() as i32).min(MAX_VISIBILITY)
}

/// Trend, change group or remarks: the base report ends here.
fn is_section_end(token: &str) -> bool {
    matches!(token, "RMK" | "NOSIG" | "BECMG" | "TEMPO" | "INTER")
        || token.starts_with("PROB")
        || (token.starts_with("FM") && token[2..].starts_with(|c: char| c.is_ascii_digit()))
}

#[derive(Debug, Default, PartialEq)]
struct Conditions {
    cloud_height: Option<i32>,
    visibility: Option<i32>,
    temperature: Option<i32>,
    dew_point: Option<i32>,
}

fn conditions<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Conditions {
    let mut found = Conditions::default();
    let mut whole_miles = None;

    for token in tokens {
        if is_section_end(token) {
            break;
        }
        if token == "CAVOK" {
            found.visibility = Some(MAX_VISIBILITY);
            continue;
        }
        if found.visibility.is_none() {
            if let Ok((_, meters)) = all_consuming(number(4))(token) {
                found.visibility = Some(meters as i32);
                continue;
            }
            if let Ok((_, miles)) = statute_miles(token) {
                let whole: f64 = whole_miles.take().unwrap_or(0.0);
                found.visibility = Some(miles_to_meters(whole + miles));
                continue;
            }
            // "1" of "1 1/2SM"
            if token.len() <= 2 {
                if let Ok((_, whole)) = all_consuming(integer)(token) {
                    whole_miles = Some(f64::from(whole));
                    continue;
                }
            }
        }
        if let Ok((_, (cover, height))) = cloud_layer(token) {
            let is_ceiling = matches!(cover, "BKN" | "OVC" | "VV");
            if let Some(height) = height.filter(|_| is_ceiling) {
                let height = height as i32;
                found.cloud_height = Some(found.cloud_height.map_or(height, |h| h.min(height)));
            }
            continue;
        }
        if found.temperature.is_none() {
            if let Ok((_, (temperature, dew_point))) = temperatures(token) {
                found.temperature = Some(temperature);
                found.dew_point = dew_point;
            }
        }
    }
    found
}

fn at(month_start: NaiveDate, day: u32, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(month_start.year(), month_start.month(), day)?;
    // "24" is midnight at the end of the day
    let (date, hour) = if hour == 24 {
        (date.succ_opt()?, 0)
    } else {
        (date, hour)
    };
    let naive = date.and_hms_opt(hour, minute, 0)?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Day-of-month groups refer to the current month unless that would put them
/// after `reference`, in which case they belong to the previous month.
fn resolve_not_after(
    reference: DateTime<Utc>,
    day: u32,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let month_start = reference.date_naive().with_day(1)?;
    let month_start = if day > reference.day() {
        month_start.checked_sub_months(Months::new(1))?
    } else {
        month_start
    };
    at(month_start, day, hour, minute)
}

/// Like [`resolve_not_after`] but rolling forward: used for validity periods
/// that start at or after `anchor`.
fn resolve_on_or_after(anchor: DateTime<Utc>, day: u32, hour: u32) -> Option<DateTime<Utc>> {
    let month_start = anchor.date_naive().with_day(1)?;
    let month_start = if day < anchor.day() {
        month_start.checked_add_months(Months::new(1))?
    } else {
        month_start
    };
    at(month_start, day, hour, 0)
}

/// Decodes one raw record without checking whether its station is known.
///
/// `reference` is "now" and anchors the day-of-month groups to a month.
/// Returns `None` for anything that is not a decodable report, including
/// `NIL` and cancelled reports.
pub fn parse_record(
    kind: ObservationKind,
    raw: &str,
    reference: DateTime<Utc>,
) -> Option<Observation> {
    let mut tokens = raw.split_whitespace().peekable();
    while tokens
        .next_if(|t| matches!(*t, "METAR" | "SPECI" | "TAF" | "AMD" | "COR" | "RTD"))
        .is_some()
    {}

    let (_, identifier) = station_id(tokens.next()?).ok()?;
    let (_, (day, hour, minute)) = issue_time(tokens.next()?).ok()?;
    let datetime = resolve_not_after(reference, day, hour, minute)?;

    let body: Vec<&str> = tokens
        .skip_while(|t| matches!(*t, "AUTO" | "COR" | "AMD"))
        .collect();
    if matches!(body.first(), Some(&"NIL") | Some(&"CNL")) {
        return None;
    }

    let raw = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match kind {
        ObservationKind::Metar => {
            let found = conditions(body.iter().copied());
            Some(Observation::Metar(Metar {
                identifier: identifier.to_string(),
                datetime,
                raw,
                cloud_height: found.cloud_height,
                visibility: found.visibility,
                temperature: found.temperature,
                dew_point: found.dew_point,
            }))
        }
        ObservationKind::Taf => {
            let (validity_group, rest) = body.split_first()?;
            let (_, ((from_day, from_hour), (to_day, to_hour))) = validity(validity_group).ok()?;
            let from = resolve_on_or_after(datetime, from_day, from_hour)?;
            let to = resolve_on_or_after(from, to_day, to_hour)?;
            if rest.first() == Some(&"CNL") {
                return None;
            }
            let found = conditions(rest.iter().copied());
            Some(Observation::Taf(Taf {
                identifier: identifier.to_string(),
                datetime,
                from,
                to,
                raw,
                cloud_height: found.cloud_height,
                visibility: found.visibility,
            }))
        }
    }
}

/// Decodes raw records and ties them to the stations currently known.
///
/// Records for unknown stations are dropped: upstream feeds routinely carry
/// stations outside the monitored region.
pub struct ObservationParser<'a> {
    known: HashSet<&'a str>,
    reference: DateTime<Utc>,
}

impl<'a> ObservationParser<'a> {
    pub fn new(stations: &'a [Station], reference: DateTime<Utc>) -> Self {
        Self {
            known: stations.iter().map(|s| s.identifier.as_str()).collect(),
            reference,
        }
    }

    pub fn parse(&self, kind: ObservationKind, raw: &str) -> Option<Observation> {
        let Some(observation) = parse_record(kind, raw, self.reference) else {
            debug!("Dropping undecodable {} record: {}", kind, raw);
            return None;
        };
        if !self.known.contains(observation.identifier()) {
            debug!(
                "Dropping {} for unknown station {}",
                kind,
                observation.identifier()
            );
            return None;
        }
        Some(observation)
    }

    /// Parses every record, keeping one report per station and time. A later
    /// duplicate replaces the earlier one in place.
    pub fn parse_all(&self, kind: ObservationKind, records: &[String]) -> Vec<Observation> {
        let mut positions: HashMap<(String, DateTime<Utc>), usize> = HashMap::new();
        let mut observations: Vec<Observation> = Vec::with_capacity(records.len());
        for observation in records.iter().filter_map(|raw| self.parse(kind, raw)) {
            let key = (observation.identifier().to_string(), observation.datetime());
            match positions.entry(key) {
                Entry::Occupied(entry) => {
                    debug!("Replacing duplicate {} for {}", kind, entry.key().0);
                    observations[*entry.get()] = observation;
                }
                Entry::Vacant(entry) => {
                    entry.insert(observations.len());
                    observations.push(observation);
                }
            }
        }
        observations
    }
}
