use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use setonix_platform::{AppPaths, AppPathsError};
use thiserror::Error;

/// Why the settings file was not used. The updater still runs on defaults.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not locate the settings directory: {0}")]
    Paths(#[from] AppPathsError),
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ignoring invalid settings in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterSettings {
    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_exit_poll_interval_ms")]
    pub exit_poll_interval_ms: u64,

    #[serde(default = "default_true")]
    pub recycle_replaced_files: bool,

    #[serde(default = "default_true")]
    pub show_dialogs: bool,

    /// Poll rounds the headless updater waits for the application before
    /// giving up.
    #[serde(default = "default_headless_retry_limit")]
    pub headless_retry_limit: u32,
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_exit_poll_interval_ms() -> u64 {
    2500
}

fn default_headless_retry_limit() -> u32 {
    24
}

fn default_true() -> bool {
    true
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            exit_poll_interval_ms: default_exit_poll_interval_ms(),
            recycle_replaced_files: true,
            show_dialogs: true,
            headless_retry_limit: default_headless_retry_limit(),
        }
    }
}

impl UpdaterSettings {
    /// # Errors
    /// Returns an error when the settings file exists but cannot be used.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&AppPaths::new()?.settings_file())
    }

    /// Read settings from `path`. A missing file yields defaults.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or is not valid JSON.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings to run with plus the reason defaults were used, if any.
    pub fn load_or_default() -> (Self, Option<SettingsError>) {
        match Self::load() {
            Ok(settings) => (settings, None),
            Err(error) => (Self::default(), Some(error)),
        }
    }

    pub fn exit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exit_poll_interval_ms.max(1))
    }
}
