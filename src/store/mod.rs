//! Local persistence of stations and observations.
//!
//! The whole state lives in one immutable [`Snapshot`]. A write builds the next
//! snapshot, persists it to disk (write to a temporary file, then rename) and
//! only then swaps it in, so readers see either the old or the new state and a
//! failed write leaves the old state in place.

pub mod error;

use crate::store::error::StoreError;
use crate::types::observation::{Metar, Observation, ObservationKind, Taf};
use crate::types::station::Station;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, RwLock};

const BINCODE_CACHE_FILE_NAME: &str = "weather_store.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// One consistent view of everything persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stations: Vec<Station>,
    pub metars: Vec<Metar>,
    pub tafs: Vec<Taf>,
}

impl Snapshot {
    fn of_kind(&self, kind: ObservationKind) -> Vec<Observation> {
        match kind {
            ObservationKind::Metar => self.metars.iter().cloned().map(Observation::from).collect(),
            ObservationKind::Taf => self.tafs.iter().cloned().map(Observation::from).collect(),
        }
    }

    /// All observations of `kind`, oldest first.
    pub fn observations(&self, kind: ObservationKind) -> Vec<Observation> {
        let mut observations = self.of_kind(kind);
        observations.sort_by_key(Observation::datetime);
        observations
    }

    /// Observations of `kind` with `from <= datetime < from + minutes`, oldest first.
    pub fn observations_between(
        &self,
        kind: ObservationKind,
        from: DateTime<Utc>,
        minutes: i64,
    ) -> Vec<Observation> {
        let to = from + Duration::minutes(minutes);
        let mut observations: Vec<_> = self
            .of_kind(kind)
            .into_iter()
            .filter(|o| o.datetime() >= from && o.datetime() < to)
            .collect();
        observations.sort_by_key(Observation::datetime);
        observations
    }
}

/// Transactional store holding the current [`Snapshot`].
///
/// Created either backed by a file in the cache directory
/// ([`WeatherStore::open`]) or purely in memory ([`WeatherStore::in_memory`]).
pub struct WeatherStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<Snapshot>>,
    // Serializes writers so each transaction starts from the latest snapshot.
    write_lock: Mutex<()>,
}

impl WeatherStore {
    pub fn in_memory() -> Self {
        Self::with_snapshot(None, Snapshot::default())
    }

    /// Opens the store file in `cache_dir`, starting empty if there is none.
    pub async fn open(cache_dir: &Path) -> Result<Self, StoreError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);

        let snapshot = if tokio::fs::try_exists(&cache_file)
            .await
            .map_err(|e| StoreError::CacheRead(cache_file.clone(), e))?
        {
            let path_clone = cache_file.clone();
            let snapshot =
                tokio::task::spawn_blocking(move || Self::read_snapshot(&path_clone)).await??;
            info!(
                "Cache hit: {} stations, {} METARs, {} TAFs from {}",
                snapshot.stations.len(),
                snapshot.metars.len(),
                snapshot.tafs.len(),
                cache_file.display()
            );
            snapshot
        } else {
            info!("No store file at {}, starting empty", cache_file.display());
            Snapshot::default()
        };

        Ok(Self::with_snapshot(Some(cache_file), snapshot))
    }

    fn with_snapshot(path: Option<PathBuf>, snapshot: Snapshot) -> Self {
        Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        }
    }

    fn read_snapshot(cache_path: &Path) -> Result<Snapshot, StoreError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| StoreError::CacheRead(cache_path.to_path_buf(), e))?;
        let (snapshot, _) = bincode::serde::decode_from_slice::<Snapshot, _>(&bytes, BINCODE_CONFIG)
            .map_err(|e| StoreError::CacheDecode(cache_path.to_path_buf(), Box::from(e)))?;
        Ok(snapshot)
    }

    /// The current state. Cheap: clones an `Arc`.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Runs one write transaction: `change` derives the next snapshot from the
    /// current one, which is then persisted and published as a whole.
    pub async fn write<F>(&self, change: F) -> Result<Arc<Snapshot>, StoreError>
    where
        F: FnOnce(&Snapshot) -> Snapshot,
    {
        let _writer = self.write_lock.lock().await;
        let next = Arc::new(change(&*self.snapshot().await));

        if let Some(path) = &self.path {
            let to_encode = next.clone();
            let bytes = tokio::task::spawn_blocking(move || {
                bincode::serde::encode_to_vec(&*to_encode, BINCODE_CONFIG)
                    .map_err(|e| StoreError::CacheEncode(Box::new(e)))
            })
            .await??;
            write_atomic(path, bytes).await?;
        }

        *self.current.write().await = next.clone();
        Ok(next)
    }

    /// Replaces the station set. Observations reference stations, so they
    /// are dropped in the same transaction.
    pub async fn replace_stations(&self, stations: Vec<Station>) -> Result<(), StoreError> {
        self.write(move |_| Snapshot {
            stations,
            metars: Vec::new(),
            tafs: Vec::new(),
        })
        .await?;
        Ok(())
    }

    /// Replaces both METAR and TAF sets at once, keeping the stations.
    ///
    /// Reports for stations missing from the snapshot being replaced are
    /// dropped, so the committed set only references stored stations.
    pub async fn replace_observations(
        &self,
        metars: Vec<Metar>,
        tafs: Vec<Taf>,
    ) -> Result<(), StoreError> {
        self.write(move |current| {
            let known: HashSet<&str> = current
                .stations
                .iter()
                .map(|s| s.identifier.as_str())
                .collect();
            let (before_metars, before_tafs) = (metars.len(), tafs.len());
            let metars: Vec<Metar> = metars
                .into_iter()
                .filter(|m| known.contains(m.identifier.as_str()))
                .collect();
            let tafs: Vec<Taf> = tafs
                .into_iter()
                .filter(|t| known.contains(t.identifier.as_str()))
                .collect();
            if metars.len() < before_metars || tafs.len() < before_tafs {
                debug!(
                    "Dropped {} METARs and {} TAFs for stations no longer stored",
                    before_metars - metars.len(),
                    before_tafs - tafs.len()
                );
            }
            Snapshot {
                stations: current.stations.clone(),
                metars,
                tafs,
            }
        })
        .await?;
        Ok(())
    }

    /// Drops everything.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.write(|_| Snapshot::default()).await?;
        Ok(())
    }

    pub async fn station_count(&self) -> usize {
        self.snapshot().await.stations.len()
    }
}

/// Writes `bytes` to a temporary file next to `path` and renames it over
/// `path`.
pub(crate) async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
    let path_buf = path.to_path_buf();
    let written = bytes.len();
    tokio::task::spawn_blocking(move || {
        let dir = path_buf.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir)
            .map_err(|e| StoreError::CacheWrite(path_buf.clone(), e))?;
        temp_file
            .write_all(&bytes)
            .and_then(|_| temp_file.as_file().sync_all())
            .map_err(|e| StoreError::CacheWrite(path_buf.clone(), e))?;
        temp_file
            .persist(&path_buf)
            .map_err(|e| StoreError::CacheWrite(path_buf.clone(), e.error))?;
        Ok::<(), StoreError>(())
    })
    .await??;
    info!("Wrote {} bytes to {}", written, path.display());
    Ok(())
}
