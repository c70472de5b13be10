//! The observation pipeline: region, station and observation refreshes, local
//! queries and the loaded playback timeline.

use crate::config::Settings;
use crate::error::AviwxError;
use crate::fetch::adds::AddsClient;
use crate::fetch::error::FetchError;
use crate::fetch::WeatherSource;
use crate::grouping::{group, ObservationGroups};
use crate::observations::parser::ObservationParser;
use crate::projection::coordinate::Coordinate;
use crate::projection::tile::TileRange;
use crate::region::{Region, RegionStore};
use crate::status::frame_status;
use crate::store::WeatherStore;
use crate::types::observation::{Observation, ObservationKind};
use crate::types::station::Station;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::{DateTime, Utc};
use log::{info, warn};
use ordered_float::OrderedFloat;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::{watch, Mutex, RwLock};

/// Progress of the refresh currently running, published on a
/// [`watch`] channel (see [`WeatherService::subscribe`]).
///
/// `Failed` stays published until the next refresh starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    Associating,
    Committing,
    Failed(String),
}

impl RefreshState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            RefreshState::Fetching | RefreshState::Associating | RefreshState::Committing
        )
    }
}

struct Timeline {
    kind: ObservationKind,
    groups: ObservationGroups,
}

/// Keeps the monitored region, its stations and their latest METAR/TAF
/// reports, and serves them grouped into timeslots.
///
/// One refresh (stations or observations) runs at a time; a second call made
/// while one is in flight fails with [`AviwxError::RefreshInProgress`].
///
/// # Examples
///
/// ```rust,no_run
/// # use aviwx::{AviwxError, Coordinate, ObservationKind, Region, WeatherService};
/// # #[tokio::main]
/// # async fn main() -> Result<(), AviwxError> {
/// let service = WeatherService::adds().await?;
/// service
///     .set_region(Region::new(Coordinate::from_degrees(24.94, 60.17), 100.0))
///     .await?;
/// let stations = service.refresh_stations().await?;
/// println!("Tracking {} stations", stations.len());
///
/// service.refresh_observations().await?;
/// let groups = service.load(ObservationKind::Metar).await;
/// if let Some(frame) = groups.selected_frame {
///     println!("{}", service.status(frame).await);
/// }
/// # Ok(())
/// # }
/// ```
pub struct WeatherService<S: WeatherSource> {
    source: S,
    settings: Settings,
    store: WeatherStore,
    regions: RegionStore,
    refresh_guard: Mutex<()>,
    state: watch::Sender<RefreshState>,
    timeline: RwLock<Option<Timeline>>,
}

impl WeatherService<AddsClient> {
    /// Service backed by aviationweather.gov with default settings.
    pub async fn adds() -> Result<Self, AviwxError> {
        Self::new(AddsClient::new(), Settings::default()).await
    }
}

#[bon]
impl<S: WeatherSource> WeatherService<S> {
    /// Opens the store and region files in the configured cache directory,
    /// creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AviwxError::CacheDirResolution`] if no cache directory is
    /// configured and the user cache directory cannot be found,
    /// [`AviwxError::CacheDirCreation`] if it cannot be created and
    /// [`AviwxError::Persistence`] if an existing store file cannot be read.
    pub async fn new(source: S, settings: Settings) -> Result<Self, AviwxError> {
        let cache_folder: PathBuf = match &settings.cache_dir {
            Some(dir) => dir.clone(),
            None => get_cache_dir().map_err(AviwxError::CacheDirResolution)?,
        };
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| AviwxError::CacheDirCreation(cache_folder.clone(), e))?;

        let store = WeatherStore::open(&cache_folder).await?;
        let (state, _) = watch::channel(RefreshState::Idle);
        Ok(Self {
            source,
            settings,
            store,
            regions: RegionStore::new(&cache_folder),
            refresh_guard: Mutex::new(()),
            state,
            timeline: RwLock::new(None),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Receives every [`RefreshState`] transition.
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.state.borrow().clone()
    }

    // --- Region ---

    pub async fn region(&self) -> Result<Option<Region>, AviwxError> {
        Ok(self.regions.load().await?)
    }

    /// The stored region, or one of the default radius around `fallback`.
    pub async fn region_or_default(&self, fallback: Coordinate) -> Result<Region, AviwxError> {
        Ok(self
            .region()
            .await?
            .unwrap_or_else(|| Region::new(fallback, self.settings.default_radius_km)))
    }

    /// Saves `region`. When it differs from the stored one, stations,
    /// observations and the loaded timeline are dropped; returns whether that
    /// happened.
    ///
    /// Waits for a refresh in flight to finish first, so nothing fetched for
    /// the previous region is committed afterwards. The store is cleared
    /// before the region is written: if clearing fails the old region stays
    /// in place and a retry clears again.
    pub async fn set_region(&self, region: Region) -> Result<bool, AviwxError> {
        let _guard = self.refresh_guard.lock().await;

        let current = self.regions.load().await.unwrap_or_else(|e| {
            warn!("Ignoring unreadable region file: {}", e);
            None
        });
        if current.as_ref() == Some(&region) {
            return Ok(false);
        }

        info!("Region changed, clearing stations and observations");
        self.store.clear().await?;
        self.close().await;
        Ok(self.regions.save(&region).await?)
    }

    /// Tiles covering the stored region at the configured zoom.
    pub async fn region_tiles(&self) -> Result<TileRange, AviwxError> {
        let region = self.region().await?.ok_or(AviwxError::NoRegion)?;
        Ok(region.tiles(self.settings.tile_zoom, self.settings.earth_radius_km))
    }

    // --- Refresh pipeline ---

    async fn with_timeout<T>(
        &self,
        what: &str,
        fetch: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        let timeout = self.settings.fetch_timeout;
        tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| FetchError::Timeout {
                what: what.to_string(),
                timeout,
            })?
    }

    fn publish(&self, state: RefreshState) {
        self.state.send_replace(state);
    }

    fn finish<T>(&self, result: &Result<T, AviwxError>) {
        self.publish(match result {
            Ok(_) => RefreshState::Idle,
            Err(e) => RefreshState::Failed(e.to_string()),
        });
    }

    /// Stations from the full upstream list that are within `region` and
    /// report METARs or TAFs, closest first.
    async fn stations_in(&self, region: &Region) -> Result<Vec<Station>, FetchError> {
        let all = self
            .with_timeout("stations", self.source.fetch_stations())
            .await?;
        let total = all.len();
        let mut in_range: Vec<(OrderedFloat<f64>, Station)> = all
            .into_iter()
            .filter(Station::reports_weather)
            .map(|s| (OrderedFloat(region.distance_km(s.latitude, s.longitude)), s))
            .filter(|(distance, _)| distance.0 <= region.radius_km)
            .collect();
        in_range.sort_by_key(|(distance, _)| *distance);
        info!("{} of {} stations are within the region", in_range.len(), total);
        Ok(in_range.into_iter().map(|(_, s)| s).collect())
    }

    /// Re-fetches the station list for the stored region and replaces the
    /// local stations with it. All stored observations are dropped.
    ///
    /// # Errors
    ///
    /// [`AviwxError::NoRegion`] when no region is stored (nothing is fetched),
    /// [`AviwxError::Network`] when the fetch fails or times out and
    /// [`AviwxError::Persistence`] when the new set cannot be written.
    pub async fn refresh_stations(&self) -> Result<Vec<Station>, AviwxError> {
        let _guard = self
            .refresh_guard
            .try_lock()
            .map_err(|_| AviwxError::RefreshInProgress)?;
        let result = self.run_station_refresh().await;
        self.finish(&result);
        result
    }

    async fn run_station_refresh(&self) -> Result<Vec<Station>, AviwxError> {
        let region = self.region().await?.ok_or(AviwxError::NoRegion)?;

        self.publish(RefreshState::Fetching);
        let stations = self.stations_in(&region).await?;

        self.publish(RefreshState::Committing);
        self.store.replace_stations(stations.clone()).await?;
        Ok(stations)
    }

    /// Fetches METARs and TAFs for the stored stations concurrently and
    /// replaces both observation sets once both have arrived.
    ///
    /// Records that cannot be decoded or belong to unknown stations are
    /// dropped. If either fetch fails nothing is committed.
    pub async fn refresh_observations(&self) -> Result<Vec<Observation>, AviwxError> {
        let _guard = self
            .refresh_guard
            .try_lock()
            .map_err(|_| AviwxError::RefreshInProgress)?;
        let result = self.run_observation_refresh().await;
        self.finish(&result);
        result
    }

    async fn run_observation_refresh(&self) -> Result<Vec<Observation>, AviwxError> {
        let snapshot = self.store.snapshot().await;
        let ids = |reports: fn(&Station) -> bool| -> Vec<String> {
            snapshot
                .stations
                .iter()
                .filter(|s| reports(s))
                .map(|s| s.identifier.clone())
                .collect()
        };
        let metar_ids = ids(|s| s.has_metar);
        let taf_ids = ids(|s| s.has_taf);

        self.publish(RefreshState::Fetching);
        let (raw_metars, raw_tafs) = tokio::try_join!(
            self.with_timeout(
                "METARs",
                self.source
                    .fetch_observations(ObservationKind::Metar, &metar_ids)
            ),
            self.with_timeout(
                "TAFs",
                self.source.fetch_observations(ObservationKind::Taf, &taf_ids)
            ),
        )?;

        self.publish(RefreshState::Associating);
        let parser = ObservationParser::new(&snapshot.stations, Utc::now());
        let metars: Vec<_> = parser
            .parse_all(ObservationKind::Metar, &raw_metars)
            .into_iter()
            .filter_map(|o| o.as_metar().cloned())
            .collect();
        let tafs: Vec<_> = parser
            .parse_all(ObservationKind::Taf, &raw_tafs)
            .into_iter()
            .filter_map(|o| o.as_taf().cloned())
            .collect();
        info!(
            "Associated {}/{} METARs and {}/{} TAFs",
            metars.len(),
            raw_metars.len(),
            tafs.len(),
            raw_tafs.len()
        );

        self.publish(RefreshState::Committing);
        self.store
            .replace_observations(metars.clone(), tafs.clone())
            .await?;

        Ok(metars
            .into_iter()
            .map(Observation::from)
            .chain(tafs.into_iter().map(Observation::from))
            .collect())
    }

    /// Stations for a region that is still being chosen. Nothing is stored.
    ///
    /// Uses the stored region unless `.region(..)` is given.
    ///
    /// ```rust,no_run
    /// # use aviwx::{AviwxError, Coordinate, Region, WeatherService};
    /// # async fn run() -> Result<(), AviwxError> {
    /// let service = WeatherService::adds().await?;
    /// let candidate = Region::new(Coordinate::from_degrees(18.07, 59.33), 80.0);
    /// let preview = service.query_stations().region(candidate).call().await?;
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn query_stations(&self, region: Option<Region>) -> Result<Vec<Station>, AviwxError> {
        let region = match region {
            Some(region) => region,
            None => self.region().await?.ok_or(AviwxError::NoRegion)?,
        };
        Ok(self.stations_in(&region).await?)
    }

    // --- Local queries ---

    /// Every stored observation of `kind`, oldest first.
    pub async fn observations(&self, kind: ObservationKind) -> Vec<Observation> {
        self.store.snapshot().await.observations(kind)
    }

    /// Stored observations of `kind` with `from <= datetime < from + minutes`.
    pub async fn observations_between(
        &self,
        from: DateTime<Utc>,
        minutes: i64,
        kind: ObservationKind,
    ) -> Vec<Observation> {
        self.store
            .snapshot()
            .await
            .observations_between(kind, from, minutes)
    }

    pub async fn stations(&self) -> Vec<Station> {
        self.store.snapshot().await.stations.clone()
    }

    pub async fn station_count(&self) -> usize {
        self.store.station_count().await
    }

    // --- Timeline ---

    /// Groups the stored observations of `kind` and keeps them as the
    /// loaded timeline.
    pub async fn load(&self, kind: ObservationKind) -> ObservationGroups {
        let groups = group(
            self.observations(kind).await,
            self.settings.bucket_minutes,
            Utc::now(),
        );
        info!(
            "Loaded {} {} timeslots, selected {:?}",
            groups.len(),
            kind,
            groups.selected_frame
        );
        *self.timeline.write().await = Some(Timeline {
            kind,
            groups: groups.clone(),
        });
        groups
    }

    /// Kind of the loaded timeline, if any.
    pub async fn loaded_kind(&self) -> Option<ObservationKind> {
        self.timeline.read().await.as_ref().map(|t| t.kind)
    }

    /// Observations of one frame of the loaded timeline.
    pub async fn frame(&self, frame: usize) -> Vec<Observation> {
        self.timeline
            .read()
            .await
            .as_ref()
            .map(|t| t.groups.go(frame).to_vec())
            .unwrap_or_default()
    }

    /// Status line for one frame of the loaded timeline.
    pub async fn status(&self, frame: usize) -> String {
        frame_status(&self.frame(frame).await, Utc::now())
    }

    /// Drops the loaded timeline.
    pub async fn close(&self) {
        *self.timeline.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockSource {
        stations: Vec<Station>,
        metars: Vec<String>,
        tafs: Vec<String>,
        fail_tafs: bool,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockSource {
        async fn respond(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    impl WeatherSource for MockSource {
        async fn fetch_stations(&self) -> Result<Vec<Station>, FetchError> {
            self.respond().await;
            Ok(self.stations.clone())
        }

        async fn fetch_observations(
            &self,
            kind: ObservationKind,
            _identifiers: &[String],
        ) -> Result<Vec<String>, FetchError> {
            self.respond().await;
            match kind {
                ObservationKind::Metar => Ok(self.metars.clone()),
                ObservationKind::Taf if self.fail_tafs => Err(FetchError::DownloadIo(
                    io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
                )),
                ObservationKind::Taf => Ok(self.tafs.clone()),
            }
        }
    }

    fn station(identifier: &str, latitude: f64, longitude: f64) -> Station {
        Station {
            identifier: identifier.to_string(),
            name: None,
            latitude,
            longitude,
            has_metar: true,
            has_taf: true,
        }
    }

    fn finnish_stations() -> Vec<Station> {
        vec![
            station("EFHK", 60.317, 24.963),
            station("EFTU", 60.514, 22.263),
            Station {
                has_metar: false,
                has_taf: false,
                ..station("EFNU", 60.333, 24.296)
            },
            station("EETN", 59.413, 24.833),
        ]
    }

    fn helsinki() -> Region {
        Region::new(Coordinate::from_degrees(24.94, 60.17), 100.0)
    }

    fn recent_metar(identifier: &str, minutes_ago: i64) -> String {
        let issued = Utc::now() - ChronoDuration::minutes(minutes_ago);
        format!(
            "{} {}Z 24008KT 9999 BKN012 08/03 Q1012",
            identifier,
            issued.format("%d%H%M")
        )
    }

    fn recent_taf(identifier: &str) -> String {
        let issued = Utc::now() - ChronoDuration::minutes(30);
        let until = issued + ChronoDuration::hours(24);
        format!(
            "TAF {} {}Z {}/{} 24010KT 9999 BKN030",
            identifier,
            issued.format("%d%H%M"),
            issued.format("%d%H"),
            until.format("%d%H")
        )
    }

    async fn service(
        source: MockSource,
        settings: Settings,
    ) -> (WeatherService<MockSource>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            cache_dir: Some(tmp.path().join("cache")),
            ..settings
        };
        (WeatherService::new(source, settings).await.unwrap(), tmp)
    }

    #[tokio::test]
    async fn test_refresh_stations_requires_region() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                ..Default::default()
            },
            Settings::default(),
        )
        .await;

        let result = service.refresh_stations().await;
        assert!(matches!(result, Err(AviwxError::NoRegion)));
        assert_eq!(service.source.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(service.refresh_state(), RefreshState::Failed(_)));
    }

    #[tokio::test]
    async fn test_refresh_stations_filters_by_region_and_reports() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();

        let stations = service.refresh_stations().await.unwrap();
        let ids: Vec<_> = stations.iter().map(|s| s.identifier.as_str()).collect();
        // EFTU is out of range, EFNU reports nothing
        assert_eq!(ids, vec!["EFHK", "EETN"]);
        assert_eq!(service.station_count().await, 2);
        assert_eq!(service.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_refresh_observations_associates_known_stations() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                metars: vec![
                    recent_metar("EFHK", 20),
                    recent_metar("EFTU", 20),
                    recent_metar("EETN", 50),
                    "garbage".to_string(),
                ],
                tafs: vec![recent_taf("EFHK"), recent_taf("ESSA")],
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();
        service.refresh_stations().await.unwrap();

        let observations = service.refresh_observations().await.unwrap();
        assert_eq!(observations.len(), 3);

        let metars = service.observations(ObservationKind::Metar).await;
        let ids: Vec<_> = metars.iter().map(|o| o.identifier()).collect();
        // ascending by time: EETN is older
        assert_eq!(ids, vec!["EETN", "EFHK"]);
        assert_eq!(metars[1].cloud_height(), Some(12));

        let tafs = service.observations(ObservationKind::Taf).await;
        assert_eq!(tafs.len(), 1);
        assert_eq!(tafs[0].identifier(), "EFHK");
    }

    #[tokio::test]
    async fn test_failed_taf_fetch_commits_nothing() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                metars: vec![recent_metar("EFHK", 20)],
                fail_tafs: true,
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();
        service.refresh_stations().await.unwrap();

        let result = service.refresh_observations().await;
        assert!(matches!(result, Err(AviwxError::Network(_))));
        assert!(service.observations(ObservationKind::Metar).await.is_empty());
        assert!(service.observations(ObservationKind::Taf).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_a_network_error() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                delay: Some(Duration::from_secs(5)),
                ..Default::default()
            },
            Settings::builder()
                .fetch_timeout(Duration::from_millis(50))
                .build(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();

        let result = service.refresh_stations().await;
        assert!(matches!(
            result,
            Err(AviwxError::Network(FetchError::Timeout { .. }))
        ));
        assert_eq!(service.station_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_rejected() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                delay: Some(Duration::from_millis(200)),
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();

        let (first, second) = tokio::join!(service.refresh_stations(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            service.refresh_observations().await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(AviwxError::RefreshInProgress)));
    }

    #[tokio::test]
    async fn test_region_change_clears_state() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                metars: vec![recent_metar("EFHK", 20)],
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        assert!(service.set_region(helsinki()).await.unwrap());
        service.refresh_stations().await.unwrap();
        service.refresh_observations().await.unwrap();
        service.load(ObservationKind::Metar).await;
        assert_eq!(service.loaded_kind().await, Some(ObservationKind::Metar));

        // same region again: nothing changes
        assert!(!service.set_region(helsinki()).await.unwrap());
        assert_eq!(service.station_count().await, 2);

        let moved = Region::new(Coordinate::from_degrees(22.26, 60.45), 100.0);
        assert!(service.set_region(moved).await.unwrap());
        assert_eq!(service.station_count().await, 0);
        assert!(service.observations(ObservationKind::Metar).await.is_empty());
        assert_eq!(service.loaded_kind().await, None);
    }

    fn santiago() -> Region {
        Region::new(Coordinate::from_degrees(-70.67, -33.45), 100.0)
    }

    #[tokio::test]
    async fn test_region_change_waits_for_observation_refresh() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                metars: vec![recent_metar("EFHK", 20)],
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();
        service.refresh_stations().await.unwrap();

        let slow = MockSource {
            delay: Some(Duration::from_millis(200)),
            metars: vec![recent_metar("EFHK", 20)],
            ..Default::default()
        };
        let service = WeatherService {
            source: slow,
            ..service
        };

        let (refreshed, changed) = tokio::join!(service.refresh_observations(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service.set_region(santiago()).await
        });
        assert!(refreshed.is_ok());
        assert!(changed.unwrap());
        assert_eq!(service.station_count().await, 0);
        assert!(service.observations(ObservationKind::Metar).await.is_empty());
    }

    #[tokio::test]
    async fn test_region_change_waits_for_station_refresh() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                delay: Some(Duration::from_millis(200)),
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();

        let (refreshed, changed) = tokio::join!(service.refresh_stations(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            service.set_region(santiago()).await
        });
        assert_eq!(refreshed.unwrap().len(), 2);
        assert!(changed.unwrap());
        assert_eq!(service.region().await.unwrap(), Some(santiago()));
        assert_eq!(service.station_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_clear_keeps_old_region() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            cache_dir: Some(tmp.path().to_path_buf()),
            ..Settings::default()
        };
        let service = WeatherService::new(
            MockSource {
                stations: finnish_stations(),
                ..Default::default()
            },
            settings,
        )
        .await
        .unwrap();
        service.set_region(helsinki()).await.unwrap();
        service.refresh_stations().await.unwrap();

        // A directory where the store file goes makes the store write fail
        // while the region file stays writable.
        let store_file = tmp.path().join("weather_store.bin");
        std::fs::remove_file(&store_file).unwrap();
        std::fs::create_dir(&store_file).unwrap();

        let result = service.set_region(santiago()).await;
        assert!(matches!(result, Err(AviwxError::Persistence(_))));
        assert_eq!(service.region().await.unwrap(), Some(helsinki()));
        assert_eq!(service.station_count().await, 2);

        std::fs::remove_dir(&store_file).unwrap();
        assert!(service.set_region(santiago()).await.unwrap());
        assert_eq!(service.station_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_records_are_stored_once() {
        let duplicate = recent_metar("EFHK", 20);
        let taf = recent_taf("EFHK");
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                metars: vec![duplicate.clone(), recent_metar("EETN", 20), duplicate],
                tafs: vec![taf.clone(), taf],
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();
        service.refresh_stations().await.unwrap();

        let observations = service.refresh_observations().await.unwrap();
        assert_eq!(observations.len(), 3);
        assert_eq!(service.observations(ObservationKind::Metar).await.len(), 2);
        assert_eq!(service.observations(ObservationKind::Taf).await.len(), 1);

        let groups = service.load(ObservationKind::Metar).await;
        let shown: usize = groups.timeslots.iter().map(|t| t.observations.len()).sum();
        assert_eq!(shown, 2);
    }

    #[tokio::test]
    async fn test_polar_region_tiles() {
        let (service, _tmp) = service(MockSource::default(), Settings::default()).await;
        service
            .set_region(Region::new(Coordinate::from_degrees(0.0, -89.5), 200.0))
            .await
            .unwrap();
        let range = service.region_tiles().await.unwrap();
        assert!(!range.is_empty());
        assert!(range
            .iter()
            .all(|t| (0..64).contains(&t.x) && (0..64).contains(&t.y)));
    }

    #[tokio::test]
    async fn test_load_and_read_frames() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                metars: vec![recent_metar("EFHK", 90), recent_metar("EETN", 180)],
                ..Default::default()
            },
            Settings::default(),
        )
        .await;
        service.set_region(helsinki()).await.unwrap();
        service.refresh_stations().await.unwrap();
        service.refresh_observations().await.unwrap();

        let groups = service.load(ObservationKind::Metar).await;
        assert_eq!(groups.len(), 2);
        let selected = groups.selected_frame.unwrap();
        assert_eq!(selected, 1);
        assert_eq!(service.frame(selected).await[0].identifier(), "EFHK");
        assert!(service.status(selected).await.ends_with(" ago"));

        service.close().await;
        assert!(service.frame(selected).await.is_empty());
        assert_eq!(service.status(selected).await, crate::status::NO_DATA);
    }

    #[tokio::test]
    async fn test_query_stations_does_not_store() {
        let (service, _tmp) = service(
            MockSource {
                stations: finnish_stations(),
                ..Default::default()
            },
            Settings::default(),
        )
        .await;

        assert!(matches!(
            service.query_stations().call().await,
            Err(AviwxError::NoRegion)
        ));

        let turku = Region::new(Coordinate::from_degrees(22.26, 60.45), 50.0);
        let preview = service.query_stations().region(turku).call().await.unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].identifier, "EFTU");
        assert_eq!(service.station_count().await, 0);
    }

    #[tokio::test]
    async fn test_region_or_default() {
        let (service, _tmp) = service(MockSource::default(), Settings::default()).await;
        let fallback = Coordinate::from_degrees(10.0, 50.0);

        let region = service.region_or_default(fallback).await.unwrap();
        assert_eq!(region, Region::new(fallback, 100.0));

        service.set_region(helsinki()).await.unwrap();
        assert_eq!(service.region_or_default(fallback).await.unwrap(), helsinki());
        assert!(!service.region_tiles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            cache_dir: Some(tmp.path().to_path_buf()),
            ..Settings::default()
        };
        {
            let service = WeatherService::new(
                MockSource {
                    stations: finnish_stations(),
                    metars: vec![recent_metar("EFHK", 20)],
                    ..Default::default()
                },
                settings.clone(),
            )
            .await
            .unwrap();
            service.set_region(helsinki()).await.unwrap();
            service.refresh_stations().await.unwrap();
            service.refresh_observations().await.unwrap();
        }

        let reopened = WeatherService::new(MockSource::default(), settings)
            .await
            .unwrap();
        assert_eq!(reopened.region().await.unwrap(), Some(helsinki()));
        assert_eq!(reopened.station_count().await, 2);
        assert_eq!(reopened.observations(ObservationKind::Metar).await.len(), 1);
    }
}
