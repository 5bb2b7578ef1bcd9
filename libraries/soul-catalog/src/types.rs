//! Catalog configuration and wire types.

use serde::{Deserialize, Serialize};
use soul_queue::{AudioQuality, TrackMetadata};
use std::time::Duration;

/// Configuration for connecting to the catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog (e.g., "https://music.example.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Raw `Cookie` header sent with every request
    #[serde(default)]
    pub cookie: Option<String>,

    /// Body `code` values the catalog uses to flag abusive traffic
    #[serde(default = "default_abuse_codes")]
    pub abuse_codes: Vec<i64>,
}

impl CatalogConfig {
    /// Create a config for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Attach a session cookie.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cookie: None,
            abuse_codes: default_abuse_codes(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_abuse_codes() -> Vec<i64> {
    vec![-460, -462]
}

// =============================================================================
// Wire Types
// =============================================================================

/// Status envelope shared by every response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiStatus {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ApiStatus {
    /// Whichever message field the catalog filled in
    pub fn text(&self) -> Option<String> {
        self.message.clone().or_else(|| self.msg.clone())
    }
}

/// Response from `/api/song/detail`.
#[derive(Debug, Deserialize)]
pub(crate) struct SongDetailResponse {
    #[serde(default)]
    pub songs: Vec<Song>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Song {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ar: Vec<Artist>,
    #[serde(default)]
    pub al: Option<Album>,
    /// Duration in milliseconds
    #[serde(default)]
    pub dt: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Artist {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Album {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "picUrl")]
    pub pic_url: Option<String>,
}

impl From<Song> for TrackMetadata {
    fn from(song: Song) -> Self {
        let (album, artwork) = match song.al {
            Some(al) => (al.name, al.pic_url),
            None => (None, None),
        };

        Self {
            title: song.name.unwrap_or_default(),
            artists: song
                .ar
                .into_iter()
                .filter_map(|a| a.name)
                .filter(|name| !name.is_empty())
                .collect(),
            album,
            duration: song.dt.filter(|ms| *ms > 0).map(Duration::from_millis),
            artwork,
        }
    }
}

/// Response from `/api/song/url`.
#[derive(Debug, Deserialize)]
pub(crate) struct SongUrlResponse {
    #[serde(default)]
    pub data: Vec<SongUrl>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SongUrl {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

/// Quality named by a `level` string
pub(crate) fn parse_level(level: &str) -> Option<AudioQuality> {
    [
        AudioQuality::Standard,
        AudioQuality::Higher,
        AudioQuality::Exhigh,
        AudioQuality::Lossless,
        AudioQuality::Hires,
    ]
    .into_iter()
    .find(|q| q.as_str() == level)
}
