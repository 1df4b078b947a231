//! Error classification for the install pipeline
//!
//! Every stage reports a [`StageError`] rather than a raw I/O or HTTP error,
//! so the orchestrator can turn any failure into a classified outcome.

use std::fmt;
use std::io;

/// Failure classes a pipeline stage can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// HTTP transport error or non-2xx response
    NetworkFailure,
    /// Local filesystem failure outside the merge (workspace, archive file)
    IoFailure,
    /// The archive could not be unpacked
    ExtractionFailure,
    /// Destination entry locked or access denied
    PermissionDenied,
    /// Copy-level failure (disk full, cross-device, type conflict)
    FileOperationFailure,
    /// Anything else
    UnexpectedFailure,
}

impl ErrorKind {
    /// Advice shown to the user next to the error detail
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::NetworkFailure => "Please check your internet connection.",
            ErrorKind::IoFailure => "Check that the installer's folder is writable.",
            ErrorKind::ExtractionFailure => "The downloaded archive is damaged or unsupported. Try again.",
            ErrorKind::PermissionDenied => {
                "VS Code might be running or files are locked. Please close VS Code and try again."
            }
            ErrorKind::FileOperationFailure => {
                "Please check permissions, free disk space, or if VS Code is running."
            }
            ErrorKind::UnexpectedFailure => "Check the log above for details.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::NetworkFailure => "network error",
            ErrorKind::IoFailure => "I/O error",
            ErrorKind::ExtractionFailure => "extraction error",
            ErrorKind::PermissionDenied => "permission error",
            ErrorKind::FileOperationFailure => "file operation error",
            ErrorKind::UnexpectedFailure => "unexpected error",
        };
        f.write_str(label)
    }
}

/// Result of a single pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// The cancellation token was observed; not a failure
    #[error("operation cancelled")]
    Cancelled,

    #[error("{kind}: {detail}")]
    Failed { kind: ErrorKind, detail: String },
}

impl StageError {
    pub fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        StageError::Failed {
            kind,
            detail: detail.into(),
        }
    }

    /// Classify an I/O error raised while copying into the destination
    pub fn from_copy_error(err: &io::Error, context: impl fmt::Display) -> Self {
        Self::failed(classify_copy_error(err), format!("{}: {}", context, err))
    }
}

pub type StageResult<T> = std::result::Result<T, StageError>;

/// Map a copy-time I/O error onto the merge failure classes.
pub fn classify_copy_error(err: &io::Error) -> ErrorKind {
    if is_locked(err) {
        return ErrorKind::PermissionDenied;
    }

    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::StorageFull
        | io::ErrorKind::CrossesDevices
        | io::ErrorKind::ReadOnlyFilesystem
        | io::ErrorKind::FileTooLarge
        | io::ErrorKind::IsADirectory
        | io::ErrorKind::NotADirectory
        | io::ErrorKind::AlreadyExists
        | io::ErrorKind::WriteZero => ErrorKind::FileOperationFailure,
        _ => ErrorKind::UnexpectedFailure,
    }
}

/// ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION: the file is held open by
/// a running process.
#[cfg(windows)]
fn is_locked(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_locked(_err: &io::Error) -> bool {
    false
}
