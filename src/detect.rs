//! Detect an existing VS Code installation in a directory
//!
//! Only the immediate children are inspected. The Insider marker wins when
//! both markers are present.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::installer::Channel;

/// Marker of an Insider installation
pub const INSIDER_MARKER: &str = "Code - Insiders.exe";

/// Marker of a Stable installation
pub const STABLE_MARKER: &str = "Code.exe";

/// What a directory contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Channel of the existing installation, if any
    pub channel: Option<Channel>,
    pub is_update: bool,
}

impl Detection {
    pub fn fresh() -> Self {
        Self {
            channel: None,
            is_update: false,
        }
    }

    pub fn existing(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            is_update: true,
        }
    }

    /// One-line status for the user
    pub fn summary(&self) -> String {
        match self.channel {
            Some(Channel::Insider) => "VS Code Insider detected. Ready to update.".to_string(),
            Some(Channel::Stable) => "VS Code detected. Ready to update.".to_string(),
            None => "No VS Code installation detected. Ready to install.".to_string(),
        }
    }
}

/// Detection errors; never conflated with "nothing installed"
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("Failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classify `dir` as a fresh install target or an existing installation.
pub fn detect_installation(dir: &Path) -> Result<Detection, DetectError> {
    let read_error = |source| DetectError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut has_stable = false;
    let mut has_insider = false;
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let name = entry.file_name();
        if name == INSIDER_MARKER {
            has_insider = true;
        } else if name == STABLE_MARKER {
            has_stable = true;
        }
    }

    let detection = if has_insider {
        Detection::existing(Channel::Insider)
    } else if has_stable {
        Detection::existing(Channel::Stable)
    } else {
        Detection::fresh()
    };
    debug!("Detection for {}: {:?}", dir.display(), detection);
    Ok(detection)
}
