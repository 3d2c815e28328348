use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use log::{debug, info, warn};
use setonix_platform::HideWindow;

use crate::cleanup::{CleanupOutcome, ScratchFile};
use crate::download::download_file;
use crate::error::UpdateError;
use crate::version_list::VersionInfo;

const UPDATE_FOLDER_NAME: &str = "setonix_update";
const MAX_FOLDER_ATTEMPTS: u32 = 10_000;

#[cfg(windows)]
pub const UPDATER_EXECUTABLE: &str = "setonix_updater.exe";
#[cfg(not(windows))]
pub const UPDATER_EXECUTABLE: &str = "setonix_updater";

/// Fetches a release archive and unpacks it into a fresh temp folder.
pub struct UpdateDownloader {
    client: reqwest::Client,
    temp_root: PathBuf,
    folder_name: String,
    last_scratch_cleanup: Option<CleanupOutcome>,
}

impl UpdateDownloader {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            temp_root: setonix_platform::temp_root(),
            folder_name: UPDATE_FOLDER_NAME.to_string(),
            last_scratch_cleanup: None,
        }
    }

    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    #[must_use]
    pub fn last_scratch_cleanup(&self) -> Option<&CleanupOutcome> {
        self.last_scratch_cleanup.as_ref()
    }

    /// Download the archive of `release` and extract it.
    ///
    /// Returns the extraction folder. The caller owns it from here on and
    /// hands it to the restarted application for removal.
    ///
    /// # Errors
    /// Returns an error when the archive cannot be downloaded, no extraction
    /// folder can be created or the archive cannot be extracted.
    pub async fn download_update(&mut self, release: &VersionInfo) -> Result<PathBuf, UpdateError> {
        let scratch = ScratchFile::create_in(&self.temp_root)
            .map_err(|error| UpdateError::io("failed to create download file", error))?;

        info!("Downloading update {} from {}", release.version, release.url);
        let extracted = self.fetch_and_extract(&release.url, &scratch).await;
        self.last_scratch_cleanup = Some(scratch.release());
        extracted
    }

    async fn fetch_and_extract(
        &self,
        url: &str,
        scratch: &ScratchFile,
    ) -> Result<PathBuf, UpdateError> {
        download_file(&self.client, url, scratch.path()).await?;

        let folder = create_unique_dir(&self.temp_root, &self.folder_name)?;
        if let Err(error) = extract_zip(scratch.path(), &folder) {
            warn!("Extraction failed, removing {}", folder.display());
            if let Err(cleanup_error) = std::fs::remove_dir_all(&folder) {
                warn!("Failed to remove {}: {cleanup_error}", folder.display());
            }
            return Err(error);
        }
        Ok(folder)
    }
}

/// Create `<root>/<name>`, or `<name>_1`, `<name>_2` and so on when taken.
fn create_unique_dir(root: &Path, name: &str) -> Result<PathBuf, UpdateError> {
    for attempt in 0..MAX_FOLDER_ATTEMPTS {
        let candidate = if attempt == 0 {
            root.join(name)
        } else {
            root.join(format!("{name}_{attempt}"))
        };
        match std::fs::create_dir(&candidate) {
            Ok(()) => {
                debug!("Created update folder {}", candidate.display());
                return Ok(candidate);
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => {
                return Err(UpdateError::io_with_path(
                    "failed to create update folder",
                    &candidate,
                    &error,
                ));
            }
        }
    }
    Err(UpdateError::TempFolderExhausted {
        name: name.to_string(),
    })
}

fn extract_zip(zip_path: &Path, dest: &Path) -> Result<usize, UpdateError> {
    let archive_file = std::fs::File::open(zip_path)
        .map_err(|error| UpdateError::io_with_path("failed to open zip file", zip_path, &error))?;
    let mut archive = zip::ZipArchive::new(archive_file)
        .map_err(|error| UpdateError::zip("failed to read zip archive", error))?;

    let mut files = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|error| UpdateError::zip("failed to read zip entry", error))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path: {}", entry.name());
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            ensure_dir(&target)?;
        } else {
            unpack_file(&mut entry, &target)?;
            #[cfg(unix)]
            restore_mode(&target, entry.unix_mode());
            files += 1;
        }
    }

    debug!("Extracted {files} file(s) to {}", dest.display());
    Ok(files)
}

fn ensure_dir(dir: &Path) -> Result<(), UpdateError> {
    std::fs::create_dir_all(dir).map_err(|error| {
        UpdateError::io_with_path("failed to create extraction directory", dir, &error)
    })
}

/// Write one archive entry to `target`, creating its parent folders.
fn unpack_file(entry: &mut impl std::io::Read, target: &Path) -> Result<(), UpdateError> {
    if let Some(parent) = target.parent() {
        ensure_dir(parent)?;
    }
    std::fs::File::create(target)
        .and_then(|mut out| std::io::copy(entry, &mut out))
        .map(drop)
        .map_err(|error| UpdateError::io_with_path("failed to extract archive entry", target, &error))
}

/// Shipped executables must stay runnable.
#[cfg(unix)]
fn restore_mode(target: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return;
    };
    if let Err(error) = std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode)) {
        warn!("Could not restore permissions of {}: {error}", target.display());
    }
}

/// Launch the updater shipped inside `extracted_dir` so it can replace the
/// files of `executable` once process `calling_pid` has exited.
///
/// # Errors
/// Returns [`UpdateError::UpdaterNotFound`] when the archive did not contain
/// an updater, or an I/O error when it cannot be started.
pub fn start_update<S: AsRef<str>>(
    extracted_dir: &Path,
    calling_pid: u32,
    executable: &Path,
    extra_args: &[S],
) -> Result<Child, UpdateError> {
    let updater = extracted_dir.join(UPDATER_EXECUTABLE);
    if !updater.is_file() {
        return Err(UpdateError::UpdaterNotFound { path: updater });
    }

    info!(
        "Starting {} for process {calling_pid}",
        updater.display()
    );
    let mut command = Command::new(&updater);
    command
        .arg(calling_pid.to_string())
        .arg(executable)
        .args(extra_args.iter().map(AsRef::as_ref))
        .current_dir(extracted_dir)
        .hide_window();
    command
        .spawn()
        .map_err(|error| UpdateError::io_with_path("failed to start updater", &updater, &error))
}
