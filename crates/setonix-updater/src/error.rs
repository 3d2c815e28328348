use std::path::PathBuf;

use setonix_core::{ManifestError, UpdateError};
use thiserror::Error;

use crate::args::ArgumentError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("The updater was started with missing or invalid arguments:\n{command_line}")]
    InvalidArguments {
        command_line: String,
        #[source]
        source: ArgumentError,
    },
    #[error("The update information is missing or invalid. The update cannot be installed.")]
    InvalidManifest(#[source] ManifestError),
    #[error("The update was aborted.")]
    Aborted,
    #[error("{0}")]
    Update(#[from] UpdateError),
    #[error("Unable to locate the update files: {0}")]
    SourceRootUnavailable(#[source] std::io::Error),
    #[error("The update was installed, but {} could not be restarted: {source}", path.display())]
    Restart {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// Process exit code reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidArguments { .. } => 2,
            Self::InvalidManifest(_) => 3,
            Self::Aborted => 4,
            Self::Update(_) => 5,
            Self::SourceRootUnavailable(_) => 6,
            Self::Restart { .. } => 7,
        }
    }
}
