//! Well-known locations used by the installer
//!
//! - `<program-dir>/temp/`            scratch workspace
//! - `<program-dir>/temp/vscode.zip`  downloaded archive
//! - `<program-dir>/temp/staging/`    unpacked payload
//! - `<destination>/data/`            portable-mode data folder

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name of the scratch directory next to the executable
pub const WORKSPACE_DIR_NAME: &str = "temp";

/// File name the archive is downloaded to
pub const ARCHIVE_FILE_NAME: &str = "vscode.zip";

/// Subdirectory of the workspace the archive is unpacked into
pub const STAGING_DIR_NAME: &str = "staging";

/// Portable-mode data folder name
pub const DATA_DIR_NAME: &str = "data";

/// Directory containing the running executable
pub fn program_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("Failed to get executable path")?;
    let exe_path = exe_path.canonicalize().unwrap_or(exe_path);
    let dir = exe_path
        .parent()
        .with_context(|| format!("Executable has no parent directory: {}", exe_path.display()))?;
    Ok(dir.to_path_buf())
}

/// `<program-dir>/temp`
pub fn default_workspace_dir() -> Result<PathBuf> {
    Ok(program_dir()?.join(WORKSPACE_DIR_NAME))
}

/// Portable data folder for an installation directory
pub fn data_dir(destination: &Path) -> PathBuf {
    destination.join(DATA_DIR_NAME)
}
