//! Merge the unpacked payload into the installation directory
//!
//! Same-named files are overwritten, directories are merged recursively and
//! anything else already in the destination is left alone. Nothing is ever
//! removed from the destination, and a failed merge is not rolled back.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::progress::Reporter;
use crate::error::{classify_copy_error, ErrorKind, StageError, StageResult};

/// Progress at the start of the merge stage
pub const MERGE_PROGRESS_START: u8 = 75;

/// Width of the merge stage's progress band
pub const MERGE_PROGRESS_SPAN: u8 = 20;

/// Merge statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Top-level entries processed
    pub entries: usize,
    pub files_copied: usize,
    pub dirs_created: usize,
}

/// Overall percentage after `done` of `total` top-level entries
pub fn merge_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return MERGE_PROGRESS_START;
    }
    let span = (done.min(total) * MERGE_PROGRESS_SPAN as usize) / total;
    MERGE_PROGRESS_START + span as u8
}

/// Copy every top-level entry of `source` into `destination`.
///
/// The token is checked before each top-level entry, so at most one entry is
/// copied after cancellation is requested.
pub fn merge_directory(
    source: &Path,
    destination: &Path,
    reporter: &Reporter,
    cancel: &CancellationToken,
) -> StageResult<MergeStats> {
    let entries = list_entries(source)?;
    let total = entries.len();
    debug!("Merging {} entries into {}", total, destination.display());

    fs::create_dir_all(destination).map_err(|e| {
        StageError::from_copy_error(&e, format!("Failed to create {}", destination.display()))
    })?;

    let mut stats = MergeStats::default();
    for (index, entry) in entries.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!("Merge cancelled after {} of {} entries", index, total);
            return Err(StageError::Cancelled);
        }

        let name = entry.file_name().unwrap_or_default();
        let target = destination.join(name);

        if entry.is_dir() {
            merge_tree(entry, &target, &mut stats)?;
        } else {
            copy_file(entry, &target)?;
            stats.files_copied += 1;
        }
        stats.entries += 1;

        let done = index + 1;
        reporter.advance(merge_percent(done, total), || {
            format!("Moved {} ({}/{})", name.to_string_lossy(), done, total)
        });
    }

    info!(
        "Merged {} entries ({} files, {} directories) into {}",
        stats.entries,
        stats.files_copied,
        stats.dirs_created,
        destination.display()
    );
    Ok(stats)
}

/// Immediate children of `dir`, sorted by name
fn list_entries(dir: &Path) -> StageResult<Vec<PathBuf>> {
    let read_error = |e: std::io::Error| {
        StageError::failed(
            ErrorKind::UnexpectedFailure,
            format!("Failed to list {}: {}", dir.display(), e),
        )
    };

    let mut entries = fs::read_dir(dir)
        .map_err(read_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;
    entries.sort();
    Ok(entries)
}

/// Recursively merge directory `src` into `dst`
fn merge_tree(src: &Path, dst: &Path, stats: &mut MergeStats) -> StageResult<()> {
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        let relative = entry.path().strip_prefix(src).map_err(|e| {
            StageError::failed(ErrorKind::UnexpectedFailure, e.to_string())
        })?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            if !target.is_dir() {
                fs::create_dir_all(&target).map_err(|e| {
                    StageError::from_copy_error(&e, format!("Failed to create {}", target.display()))
                })?;
                stats.dirs_created += 1;
            }
        } else {
            copy_file(entry.path(), &target)?;
            stats.files_copied += 1;
        }
    }
    Ok(())
}

/// Copy a file with its permissions and timestamps, overwriting `dst`
fn copy_file(src: &Path, dst: &Path) -> StageResult<()> {
    fs::copy(src, dst).map_err(|e| {
        StageError::from_copy_error(&e, format!("Failed to copy {}", dst.display()))
    })?;

    let meta = fs::metadata(src).map_err(|e| {
        StageError::from_copy_error(&e, format!("Failed to read {}", src.display()))
    })?;
    let mtime = FileTime::from_last_modification_time(&meta);
    let atime = FileTime::from_last_access_time(&meta);
    filetime::set_file_times(dst, atime, mtime).map_err(|e| {
        StageError::from_copy_error(&e, format!("Failed to set times on {}", dst.display()))
    })?;

    Ok(())
}

fn walk_error(err: walkdir::Error) -> StageError {
    let kind = err
        .io_error()
        .map(classify_copy_error)
        .unwrap_or(ErrorKind::UnexpectedFailure);
    StageError::failed(kind, err.to_string())
}
