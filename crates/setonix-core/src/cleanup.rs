//! Best-effort removal of temporary resources.
//!
//! Nothing in here ever returns an error: every attempt yields a
//! [`CleanupOutcome`] that is logged and can be inspected, but never
//! escalates.

use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};

/// Prefix of the argument that asks the next process to remove a temporary
/// update folder.
pub const CLEANUP_ARGUMENT_PREFIX: &str = "--setonix-cleanup=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    NotFound,
    /// The path lies outside the temp root and was left alone.
    Rejected,
    Failed(String),
}

impl CleanupOutcome {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Removed | Self::NotFound)
    }

    fn from_io(path: &Path, result: io::Result<()>) -> Self {
        match result {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Self::Removed
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Self::NotFound,
            Err(error) => {
                warn!("Failed to remove {}: {error}", path.display());
                Self::Failed(error.to_string())
            }
        }
    }
}

/// A short-lived file in the temp root, deleted by [`ScratchFile::release`]
/// or, if the owning operation bails out some other way, on drop.
pub struct ScratchFile {
    path: tempfile::TempPath,
}

impl ScratchFile {
    /// Reserve a fresh, empty scratch file inside `root`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create_in(root: &Path) -> io::Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("setonix_")
            .suffix(".tmp")
            .tempfile_in(root)?
            .into_temp_path();
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self) -> CleanupOutcome {
        let path = self.path.to_path_buf();
        CleanupOutcome::from_io(&path, self.path.close())
    }
}

/// The argument that tells the next invocation to remove `folder`.
#[must_use]
pub fn cleanup_argument(folder: &Path) -> String {
    format!("{CLEANUP_ARGUMENT_PREFIX}{}", folder.display())
}

fn cleanup_target(arg: &str) -> Option<&str> {
    let prefix = arg.get(..CLEANUP_ARGUMENT_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(CLEANUP_ARGUMENT_PREFIX)
        .then(|| &arg[CLEANUP_ARGUMENT_PREFIX.len()..])
}

/// Remove the folders named by cleanup arguments and return the remaining
/// arguments in their original order, plus one outcome per cleanup argument.
///
/// Only folders strictly inside `temp_root` are touched.
pub fn handle_temp_folder_cleanup<S: AsRef<str>>(
    args: &[S],
    temp_root: &Path,
) -> (Vec<String>, Vec<CleanupOutcome>) {
    let mut remaining = Vec::with_capacity(args.len());
    let mut outcomes = Vec::new();

    for arg in args {
        let arg = arg.as_ref();
        match cleanup_target(arg) {
            Some(folder) => outcomes.push(remove_temp_folder(Path::new(folder), temp_root)),
            None => remaining.push(arg.to_string()),
        }
    }

    (remaining, outcomes)
}

/// Delete `folder` recursively if it lies strictly inside `temp_root`, both
/// as written and after resolving symlinks.
#[must_use]
pub fn remove_temp_folder(folder: &Path, temp_root: &Path) -> CleanupOutcome {
    if !is_lexically_inside(folder, temp_root) {
        warn!(
            "Refusing to remove {} outside of {}",
            folder.display(),
            temp_root.display()
        );
        return CleanupOutcome::Rejected;
    }
    if !folder.is_dir() {
        return CleanupOutcome::NotFound;
    }
    if !is_strictly_under(&canonical_or_self(folder), &canonical_or_self(temp_root)) {
        warn!("Refusing to remove {}: resolves outside of the temp root", folder.display());
        return CleanupOutcome::Rejected;
    }
    CleanupOutcome::from_io(folder, std::fs::remove_dir_all(folder))
}

fn is_lexically_inside(folder: &Path, root: &Path) -> bool {
    folder.is_absolute()
        && !folder
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::CurDir))
        && is_strictly_under(folder, root)
}

fn is_strictly_under(folder: &Path, root: &Path) -> bool {
    folder != root && folder.starts_with(root)
}

fn canonical_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
