//! vscode-installer - portable VS Code installer and updater
//!
//! Fetches the official archive for a release channel, unpacks it in a
//! scratch workspace and merges it into the destination folder.

pub mod archive;
pub mod detect;
pub mod downloaders;
pub mod error;
pub mod installer;
pub mod paths;
pub mod settings;
