//! Download endpoints and the archive fetcher
//!
//! Each release channel maps to one fixed URL serving a streamable archive.

mod http;

pub use http::{fetch_archive, fetch_percent, HttpClient, CHUNK_SIZE, FETCH_PROGRESS_END};

use serde::{Deserialize, Serialize};

use crate::installer::Channel;

pub const STABLE_URL: &str =
    "https://code.visualstudio.com/sha/download?build=stable&os=win32-x64-archive";

pub const INSIDER_URL: &str =
    "https://code.visualstudio.com/sha/download?build=insider&os=win32-x64-archive";

/// Official download URL for a channel
pub fn channel_url(channel: Channel) -> &'static str {
    match channel {
        Channel::Stable => STABLE_URL,
        Channel::Insider => INSIDER_URL,
    }
}

/// Download URL per channel, overridable for mirrors and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub stable: String,
    pub insider: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            stable: STABLE_URL.to_string(),
            insider: INSIDER_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn url_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Stable => &self.stable,
            Channel::Insider => &self.insider,
        }
    }
}
