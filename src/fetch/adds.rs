use crate::fetch::error::FetchError;
use crate::fetch::{split_records, WeatherSource};
use crate::types::observation::ObservationKind;
use crate::types::station::Station;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::future::try_join_all;
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::io;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const DEFAULT_BASE_URL: &str = "https://aviationweather.gov";
const STATIONS_PATH: &str = "/data/cache/stations.cache.json.gz";
/// Identifiers per raw text request; keeps URLs well below server limits.
const IDS_PER_REQUEST: usize = 200;

/// Station entry as found in the aviationweather.gov station cache.
#[derive(Debug, Clone, Deserialize)]
pub struct StationRecord {
    #[serde(rename = "icaoId", default)]
    pub icao_id: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "siteType", default)]
    pub site_type: Vec<String>,
}

impl StationRecord {
    /// Records without an ICAO identifier cannot be matched to reports.
    pub fn into_station(self) -> Option<Station> {
        let identifier = self.icao_id.filter(|id| !id.trim().is_empty())?;
        let reports = |kind: &str| self.site_type.iter().any(|t| t.eq_ignore_ascii_case(kind));
        Some(Station {
            has_metar: reports("METAR"),
            has_taf: reports("TAF"),
            identifier: identifier.trim().to_uppercase(),
            name: self.site,
            latitude: self.lat,
            longitude: self.lon,
        })
    }
}

/// [`WeatherSource`] backed by the aviationweather.gov data service.
#[derive(Debug, Clone)]
pub struct AddsClient {
    client: Client,
    base_url: String,
}

impl Default for AddsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AddsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Points the client at another host serving the same API.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.to_string(), e))?;
        match response.error_for_status() {
            Ok(resp) => Ok(resp),
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                match e.status() {
                    Some(status) => Err(FetchError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }),
                    None => Err(FetchError::NetworkRequest(url.to_string(), e)),
                }
            }
        }
    }

    async fn fetch_chunk(
        &self,
        kind: ObservationKind,
        identifiers: &[String],
    ) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/api/data/{}?ids={}&format=raw",
            self.base_url,
            kind.path_segment(),
            identifiers.join(",")
        );
        let body = self
            .get(&url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;
        Ok(split_records(&body))
    }
}

impl WeatherSource for AddsClient {
    async fn fetch_stations(&self) -> Result<Vec<Station>, FetchError> {
        let url = format!("{}{}", self.base_url, STATIONS_PATH);
        let stream = self
            .get(&url)
            .await?
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let stream_reader = StreamReader::new(stream);
        let gzip_decoder = GzipDecoder::new(BufReader::new(stream_reader));
        let mut decoder_reader = BufReader::new(gzip_decoder);
        let mut decompressed_json = Vec::with_capacity(4_000_000);
        decoder_reader.read_to_end(&mut decompressed_json).await?;

        let parse_start = std::time::Instant::now();
        let records = tokio::task::spawn_blocking(move || {
            serde_json::from_slice::<Vec<StationRecord>>(&decompressed_json)
                .map_err(FetchError::from)
        })
        .await??;
        let stations: Vec<Station> = records
            .into_iter()
            .filter_map(StationRecord::into_station)
            .collect();
        info!(
            "Parsed {} stations from {} in {:?}",
            stations.len(),
            url,
            parse_start.elapsed()
        );
        Ok(stations)
    }

    async fn fetch_observations(
        &self,
        kind: ObservationKind,
        identifiers: &[String],
    ) -> Result<Vec<String>, FetchError> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let chunks = try_join_all(
            identifiers
                .chunks(IDS_PER_REQUEST)
                .map(|chunk| self.fetch_chunk(kind, chunk)),
        )
        .await?;
        let records: Vec<String> = chunks.into_iter().flatten().collect();
        info!(
            "Fetched {} raw {} records for {} stations",
            records.len(),
            kind,
            identifiers.len()
        );
        Ok(records)
    }
}
