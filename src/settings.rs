//! Settings management
//!
//! Stores user preferences in ~/.config/vscode-installer/settings.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::downloaders::Endpoints;
use crate::installer::{Channel, InstallerConfig};

fn default_portable() -> bool {
    true
}

/// User settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Channel used for fresh installs
    #[serde(default)]
    pub channel: Channel,

    /// Create the portable `data` folder on fresh installs
    #[serde(default = "default_portable")]
    pub portable: bool,

    /// Mirror for the Stable archive (empty = official endpoint)
    #[serde(default)]
    pub stable_url: String,

    /// Mirror for the Insider archive (empty = official endpoint)
    #[serde(default)]
    pub insider_url: String,

    /// Scratch directory override (empty = `<program-dir>/temp`)
    #[serde(default)]
    pub workspace_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: Channel::default(),
            portable: default_portable(),
            stable_url: String::new(),
            insider_url: String::new(),
            workspace_dir: String::new(),
        }
    }
}

impl Settings {
    /// Get the config directory path (~/.config/vscode-installer)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("vscode-installer");

        Ok(config_dir)
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|path| Self::load_from(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Endpoints with the configured mirrors applied
    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::default();
        if !self.stable_url.is_empty() {
            endpoints.stable = self.stable_url.clone();
        }
        if !self.insider_url.is_empty() {
            endpoints.insider = self.insider_url.clone();
        }
        endpoints
    }

    /// Installer configuration from these settings
    pub fn installer_config(&self) -> Result<InstallerConfig> {
        let workspace_dir = if self.workspace_dir.is_empty() {
            crate::paths::default_workspace_dir()?
        } else {
            PathBuf::from(&self.workspace_dir)
        };

        Ok(InstallerConfig {
            endpoints: self.endpoints(),
            workspace_dir,
        })
    }
}
