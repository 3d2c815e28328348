//! Self-update core for Setonix.
//!
//! This crate holds everything the application and its standalone updater
//! share:
//! - Version numbers and the remote version list.
//! - Checking for, downloading and unpacking a newer release.
//! - The update manifest with its localized messages.
//! - Applying manifest tasks to an installation.
//! - Best-effort cleanup of scratch files and update folders.

mod auto_update;
mod cleanup;
mod download;
mod engine;
mod error;
mod manifest;
mod strings;
mod update;
mod version;
mod version_list;

/// Update archive download, extraction and updater launch.
pub use auto_update::{UPDATER_EXECUTABLE, UpdateDownloader, start_update};
/// Scratch files and temp folder cleanup with typed outcomes.
pub use cleanup::{
    CLEANUP_ARGUMENT_PREFIX, CleanupOutcome, ScratchFile, cleanup_argument,
    handle_temp_folder_cleanup, remove_temp_folder,
};
/// Streaming HTTP download into a file.
pub use download::{DownloadError, download_file};
/// Ordered application of update tasks.
pub use engine::{DeleteRecycler, Recycler, TrashRecycler, Updater};
pub use error::UpdateError;
/// Update manifest model and parser.
pub use manifest::{MANIFEST_FILE_NAME, ManifestError, UpdateFileTask, UpdateManifest, UpdateTask};
pub use strings::{Locale, LocaleParseError, LocalizedStrings};
/// Comparison of the local version against the remote list.
pub use update::{UpdateCheckError, UpdateChecker};
pub use version::{Version, VersionParseError};
pub use version_list::{
    VersionInfo, VersionListError, parse_version_list, resolve_current_version,
    select_current_version,
};
