use std::path::PathBuf;

use log::{info, warn};
use thiserror::Error;

use crate::cleanup::{CleanupOutcome, ScratchFile};
use crate::download::{DownloadError, download_file};
use crate::version::Version;
use crate::version_list::{VersionInfo, VersionListError, select_current_version};

#[derive(Debug, Error)]
pub enum UpdateCheckError {
    #[error("Unable to check for newer version: cannot create scratch file: {0}")]
    ScratchFile(#[source] std::io::Error),
    #[error("Unable to download version information: {0}")]
    Download(#[source] DownloadError),
    #[error("Unable to read version information: {0}")]
    Read(#[source] std::io::Error),
    #[error("Unable to determine current version: {0}")]
    CurrentVersionUndetermined(#[source] VersionListError),
}

/// Compares the locally installed version with the remote version list.
pub struct UpdateChecker {
    client: reqwest::Client,
    local_version: Version,
    version_list_url: String,
    temp_root: PathBuf,
    current_version: Option<VersionInfo>,
    last_scratch_cleanup: Option<CleanupOutcome>,
}

impl UpdateChecker {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        local_version: Version,
        version_list_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            local_version,
            version_list_url: version_list_url.into(),
            temp_root: setonix_platform::temp_root(),
            current_version: None,
            last_scratch_cleanup: None,
        }
    }

    /// Place scratch files in `root` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    #[must_use]
    pub fn local_version(&self) -> Version {
        self.local_version
    }

    /// The release resolved by the last successful check.
    #[must_use]
    pub fn current_version(&self) -> Option<&VersionInfo> {
        self.current_version.as_ref()
    }

    /// How removing the scratch copy of the version list went during the
    /// last check.
    #[must_use]
    pub fn last_scratch_cleanup(&self) -> Option<&CleanupOutcome> {
        self.last_scratch_cleanup.as_ref()
    }

    /// Download the version list, resolve the current release and report
    /// whether it is newer than the local version.
    ///
    /// # Errors
    /// Returns an error when the list cannot be downloaded or read, or when
    /// no single current release can be determined from it.
    pub async fn check_for_updates(&mut self) -> Result<bool, UpdateCheckError> {
        self.current_version = None;

        let scratch =
            ScratchFile::create_in(&self.temp_root).map_err(UpdateCheckError::ScratchFile)?;
        let resolved = self.fetch_current_version(&scratch).await;
        self.last_scratch_cleanup = Some(scratch.release());

        let current = resolved?;
        let newer = current.version.is_newer_than(&self.local_version);
        info!(
            "Current release is {} ({}), local version {}: update {}",
            current.version,
            current.release_date,
            self.local_version,
            if newer { "available" } else { "not needed" }
        );
        self.current_version = Some(current);
        Ok(newer)
    }

    async fn fetch_current_version(
        &self,
        scratch: &ScratchFile,
    ) -> Result<VersionInfo, UpdateCheckError> {
        download_file(&self.client, &self.version_list_url, scratch.path())
            .await
            .map_err(UpdateCheckError::Download)?;

        let xml = tokio::fs::read_to_string(scratch.path())
            .await
            .map_err(UpdateCheckError::Read)?;

        select_current_version(&xml).map_err(|error| {
            warn!("Version list at {} is unusable: {error}", self.version_list_url);
            UpdateCheckError::CurrentVersionUndetermined(error)
        })
    }
}
