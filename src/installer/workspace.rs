//! Scratch workspace for one operation
//!
//! The directory is recreated empty on [`TempWorkspace::acquire`] and removed
//! on [`TempWorkspace::release`]. If the workspace is dropped without an
//! explicit release (panic, aborted task) `Drop` removes it instead, so
//! removal happens exactly once on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::progress::Reporter;
use crate::error::{ErrorKind, StageError, StageResult};
use crate::paths::{ARCHIVE_FILE_NAME, STAGING_DIR_NAME};

#[derive(Debug)]
pub struct TempWorkspace {
    root: PathBuf,
    released: bool,
}

impl TempWorkspace {
    /// Create a clean workspace at `root`.
    ///
    /// A leftover directory from an earlier run is removed first; if that
    /// removal fails it is only a warning, creation may still succeed.
    pub fn acquire(root: &Path, reporter: &Reporter) -> StageResult<Self> {
        if root.exists() {
            if let Err(e) = fs::remove_dir_all(root) {
                reporter.warning(format!(
                    "Notice: Could not clean up pre-existing temp directory: {}",
                    e
                ));
            }
        }

        fs::create_dir_all(root.join(STAGING_DIR_NAME)).map_err(|e| {
            StageError::failed(
                ErrorKind::IoFailure,
                format!("Failed to create temp directory {}: {}", root.display(), e),
            )
        })?;

        debug!("Workspace ready: {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            released: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the downloaded archive is written
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE_NAME)
    }

    /// Where the archive is unpacked
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR_NAME)
    }

    /// Remove the workspace. Failure is reported as a warning only.
    pub fn release(mut self, reporter: &Reporter) {
        self.released = true;
        reporter.message("Cleaning up temporary directory...");
        match remove_tree(&self.root) {
            Ok(()) => reporter.message("Temporary directory cleaned up."),
            Err(e) => reporter.warning(format!(
                "Warning: Error during final temporary directory cleanup: {}",
                e
            )),
        }
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_tree(&self.root) {
            warn!("Failed to remove workspace {}: {}", self.root.display(), e);
        }
    }
}

fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
