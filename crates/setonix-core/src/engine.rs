//! Applies the tasks of an update manifest to an installation.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::UpdateError;
use crate::manifest::{UpdateFileTask, UpdateTask};

const STAGING_SUFFIX: &str = "setonix-new";
const BACKUP_SUFFIX: &str = "setonix-old";

/// Disposes of files that an update replaced.
pub trait Recycler {
    /// # Errors
    /// Returns an error when the file could not be disposed of. Callers
    /// only log it.
    fn recycle(&self, path: &Path) -> std::io::Result<()>;
}

/// Moves replaced files to the platform trash, deleting them when no trash
/// is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrashRecycler;

impl Recycler for TrashRecycler {
    fn recycle(&self, path: &Path) -> std::io::Result<()> {
        match trash::delete(path) {
            Ok(()) => Ok(()),
            Err(error) => {
                debug!("Trash unavailable for {} ({error}), deleting", path.display());
                std::fs::remove_file(path)
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteRecycler;

impl Recycler for DeleteRecycler {
    fn recycle(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Copies the files of an extracted update over an installation.
pub struct Updater<R: Recycler = TrashRecycler> {
    source_root: PathBuf,
    target_root: PathBuf,
    recycler: R,
}

impl Updater<TrashRecycler> {
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self::with_recycler(source_root, target_root, TrashRecycler)
    }
}

impl<R: Recycler> Updater<R> {
    #[must_use]
    pub fn with_recycler(
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        recycler: R,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            recycler,
        }
    }

    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    #[must_use]
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Run `tasks` strictly in order, calling `progress` with each file name
    /// before that file is replaced.
    ///
    /// Stops at the first failure. Files replaced before it stay replaced.
    ///
    /// # Errors
    /// Returns [`UpdateError::NewFileNotFound`] when the update lacks a file
    /// named by a task, or an I/O error when a file cannot be replaced.
    pub fn perform_updates(
        &self,
        tasks: &[UpdateTask],
        mut progress: impl FnMut(&str),
    ) -> Result<(), UpdateError> {
        info!(
            "Applying {} task(s) from {} to {}",
            tasks.len(),
            self.source_root.display(),
            self.target_root.display()
        );
        for task in tasks {
            match task {
                UpdateTask::File(file) => {
                    progress(file.file_name());
                    self.replace_file(file)?;
                }
            }
        }
        info!("All update tasks completed");
        Ok(())
    }

    fn replace_file(&self, task: &UpdateFileTask) -> Result<(), UpdateError> {
        let source = task.resolve(&self.source_root);
        if !source.is_file() {
            let directory = source
                .parent()
                .map_or_else(|| self.source_root.clone(), Path::to_path_buf);
            return Err(UpdateError::NewFileNotFound {
                file_name: task.file_name().to_string(),
                directory,
            });
        }

        let target = task.resolve(&self.target_root);
        let staging = sibling(&target, STAGING_SUFFIX);
        let backup = sibling(&target, BACKUP_SUFFIX);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                UpdateError::io_with_path("failed to create target directory", parent, &error)
            })?;
        }

        remove_leftover(&staging)?;
        if let Err(error) = std::fs::copy(&source, &staging) {
            remove_leftover_quietly(&staging);
            return Err(UpdateError::io_with_path(
                "failed to stage new file",
                &staging,
                &error,
            ));
        }

        let had_old = target.exists();
        if had_old {
            remove_leftover(&backup)?;
            if let Err(error) = std::fs::rename(&target, &backup) {
                remove_leftover_quietly(&staging);
                return Err(UpdateError::io_with_path(
                    "failed to move old file aside",
                    &target,
                    &error,
                ));
            }
        }

        if let Err(error) = std::fs::rename(&staging, &target) {
            if had_old && let Err(restore_error) = std::fs::rename(&backup, &target) {
                warn!(
                    "Could not restore {} from {}: {restore_error}",
                    target.display(),
                    backup.display()
                );
            }
            remove_leftover_quietly(&staging);
            return Err(UpdateError::io_with_path(
                "failed to move new file into place",
                &target,
                &error,
            ));
        }

        if had_old && let Err(error) = self.recycler.recycle(&backup) {
            warn!("Failed to recycle {}: {error}", backup.display());
        }

        debug!("Replaced {}", target.display());
        Ok(())
    }
}

/// `dir/.name.suffix` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{suffix}"))
}

fn remove_leftover(path: &Path) -> Result<(), UpdateError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed leftover {}", path.display());
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(UpdateError::io_with_path(
            "failed to remove leftover file",
            path,
            &error,
        )),
    }
}

fn remove_leftover_quietly(path: &Path) {
    if let Err(error) = remove_leftover(path) {
        warn!("{error}");
    }
}
