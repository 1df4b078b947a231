//! Installation configuration
//!
//! Defines the per-operation request and the installer-wide configuration.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::downloaders::Endpoints;

/// Release track of VS Code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Insider,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stable => f.write_str("stable"),
            Channel::Insider => f.write_str("insider"),
        }
    }
}

/// Whether the destination is being set up or refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Install,
    Update,
}

impl OperationKind {
    /// Progressive verb for log lines ("Installing VS Code...")
    pub fn verb(&self) -> &'static str {
        match self {
            OperationKind::Install => "Installing",
            OperationKind::Update => "Updating",
        }
    }
}

/// A single install or update. Immutable for the lifetime of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Directory that receives the unpacked payload
    pub destination: PathBuf,

    pub channel: Channel,

    /// Create a `data` folder next to the binary (install only)
    pub portable: bool,

    pub kind: OperationKind,
}

impl InstallRequest {
    pub fn install(destination: impl Into<PathBuf>, channel: Channel, portable: bool) -> Self {
        Self {
            destination: destination.into(),
            channel,
            portable,
            kind: OperationKind::Install,
        }
    }

    pub fn update(destination: impl Into<PathBuf>, channel: Channel) -> Self {
        Self {
            destination: destination.into(),
            channel,
            portable: false,
            kind: OperationKind::Update,
        }
    }

    /// Whether the portable `data` folder step runs for this request
    pub fn wants_portable_layout(&self) -> bool {
        self.kind == OperationKind::Install && self.portable
    }

    /// Validate the request
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.as_os_str().is_empty() {
            return Err(ConfigError::MissingDestination);
        }

        if self.destination.exists() && !self.destination.is_dir() {
            return Err(ConfigError::DestinationNotDirectory(self.destination.clone()));
        }

        Ok(())
    }
}

/// Configuration shared by every operation of one [`super::Installer`]
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Download URL per channel
    pub endpoints: Endpoints,

    /// Scratch directory, recreated for every operation
    pub workspace_dir: PathBuf,
}

impl InstallerConfig {
    /// Default endpoints with the workspace next to the running executable
    pub fn from_program_location() -> anyhow::Result<Self> {
        Ok(Self {
            endpoints: Endpoints::default(),
            workspace_dir: crate::paths::default_workspace_dir()?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Please select a folder first.")]
    MissingDestination,

    #[error("Destination is not a directory: {0}")]
    DestinationNotDirectory(PathBuf),
}
