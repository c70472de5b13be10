//! Tunable values for projection, grouping and fetching.

use crate::projection::coordinate::EARTH_RADIUS_KM;
use bon::Builder;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BUCKET_MINUTES: i64 = 30;
pub const DEFAULT_TILE_ZOOM: u32 = 6;
pub const DEFAULT_RADIUS_KM: f64 = 100.0;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`crate::WeatherService`].
///
/// Every field has a default, so `Settings::default()` is a valid
/// configuration. Use the builder to override individual values.
///
/// # Examples
///
/// ```
/// use aviwx::Settings;
/// use std::time::Duration;
///
/// let settings = Settings::builder()
///     .bucket_minutes(60)
///     .fetch_timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(settings.bucket_minutes, 60);
/// assert_eq!(settings.tile_zoom, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct Settings {
    /// Width of one playback timeslot.
    #[builder(default = DEFAULT_BUCKET_MINUTES)]
    pub bucket_minutes: i64,

    /// Sphere radius for great-circle destinations.
    #[builder(default = EARTH_RADIUS_KM)]
    pub earth_radius_km: f64,

    /// Zoom used when converting the region into tiles.
    #[builder(default = DEFAULT_TILE_ZOOM)]
    pub tile_zoom: u32,

    /// Radius of the region proposed when none has been saved yet.
    #[builder(default = DEFAULT_RADIUS_KM)]
    pub default_radius_km: f64,

    /// Upper bound for each upstream fetch.
    #[builder(default = DEFAULT_FETCH_TIMEOUT)]
    pub fetch_timeout: Duration,

    /// Where the store and region files live. `None` selects the user cache
    /// directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::builder().build()
    }
}
