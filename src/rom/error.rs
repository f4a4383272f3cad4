use thiserror::Error;

use crate::fetch::FetchError;
use crate::types::BuildType;

/// Per-ROM failure taxonomy.
///
/// Each variant is reported individually by the batch loop; one device's
/// failure never aborts the remaining devices.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("no {build_type} build found for {device}")]
    NoRomFound {
        device: String,
        build_type: BuildType,
    },

    #[error(transparent)]
    Transport(#[from] FetchError),

    #[error("Disk error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
