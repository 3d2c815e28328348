use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::download::DownloadError;

/// Failures while downloading, unpacking or applying an update.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to download update: {0}")]
    Download(#[from] DownloadError),
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("Unable to find new version of {file_name} in {}", directory.display())]
    NewFileNotFound {
        file_name: String,
        directory: PathBuf,
    },
    #[error("no free temporary folder name based on '{name}'")]
    TempFolderExhausted { name: String },
    #[error("updater executable not found at {}", path.display())]
    UpdaterNotFound { path: PathBuf },
}

impl UpdateError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}
