use std::path::PathBuf;
use thiserror::Error;

/// Failures of the local transactional store and the region file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode cache data from '{0}'")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode cache data")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Failed to read region file '{0}'")]
    RegionDecode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode region")]
    RegionEncode(#[source] serde_json::Error),

    // Covers errors joining tokio blocking tasks
    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
