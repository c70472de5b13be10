mod config;
mod error;
mod fetch;
mod grouping;
mod observations;
mod projection;
mod region;
mod service;
mod status;
mod store;
mod types;
mod utils;

pub use config::*;
pub use error::AviwxError;
pub use service::*;

pub use fetch::adds::{AddsClient, StationRecord};
pub use fetch::error::FetchError;
pub use fetch::{split_records, WeatherSource};

pub use grouping::*;
pub use status::{frame_status, NO_DATA};

pub use observations::parser::{parse_record, ObservationParser};

pub use projection::bounding_box::BoundingBox;
pub use projection::coordinate::{Coordinate, EARTH_RADIUS_KM, MAX_LATITUDE_DEGREES};
pub use projection::tile::{TileId, TileRange};

pub use region::{Region, RegionStore};

pub use store::error::StoreError;
pub use store::{Snapshot, WeatherStore};

pub use types::observation::*;
pub use types::observation_value::ObservationValue;
pub use types::station::*;
