use crate::fetch::error::FetchError;
use crate::store::error::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AviwxError {
    /// Upstream fetch failed; the user retries by refreshing again.
    #[error(transparent)]
    Network(#[from] FetchError),

    /// Local write or read failed; the previous state is untouched.
    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error("No monitored region has been configured")]
    NoRegion,

    #[error("Another refresh is already in progress")]
    RefreshInProgress,

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}
