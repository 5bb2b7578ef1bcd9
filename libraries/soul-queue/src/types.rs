//! Core types for queue building

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque catalog identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TrackId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Track metadata as returned by the catalog
///
/// Every field is optional upstream; missing values fall back to the
/// defaults below rather than failing the whole batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track title (empty when the catalog omits it)
    #[serde(default)]
    pub title: String,

    /// Artist names, in credit order
    #[serde(default)]
    pub artists: Vec<String>,

    /// Album name
    #[serde(default)]
    pub album: Option<String>,

    /// Track duration
    #[serde(default)]
    pub duration: Option<Duration>,

    /// Artwork reference (URL or opaque key)
    #[serde(default)]
    pub artwork: Option<String>,
}

impl TrackMetadata {
    /// Artists joined for display, "Unknown Artist" when none are credited
    pub fn artist_line(&self) -> String {
        if self.artists.is_empty() {
            "Unknown Artist".to_string()
        } else {
            self.artists.join(" / ")
        }
    }
}

/// Requested stream quality, passed to the catalog as a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Standard,
    Higher,
    #[default]
    Exhigh,
    Lossless,
    Hires,
}

impl AudioQuality {
    /// Wire name used by the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Standard => "standard",
            AudioQuality::Higher => "higher",
            AudioQuality::Exhigh => "exhigh",
            AudioQuality::Lossless => "lossless",
            AudioQuality::Hires => "hires",
        }
    }
}

/// A resolved, playable stream location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLocator {
    pub url: String,
    pub quality: AudioQuality,
}

/// An entry in the playback queue
///
/// Entries are immutable; a quality switch or late metadata produces a new
/// entry that replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Track this entry plays
    pub track_id: TrackId,

    /// Metadata, `None` for placeholders the catalog could not describe
    pub metadata: Option<TrackMetadata>,

    /// Stream locator, `None` until resolved at play time
    pub stream: Option<StreamLocator>,
}

impl QueueEntry {
    /// Entry with metadata and no stream locator yet
    pub fn new(track_id: TrackId, metadata: TrackMetadata) -> Self {
        Self {
            track_id,
            metadata: Some(metadata),
            stream: None,
        }
    }

    /// Degraded entry that only knows its track id
    ///
    /// Keeps the slot in the queue when metadata could not be fetched.
    pub fn placeholder(track_id: TrackId) -> Self {
        Self {
            track_id,
            metadata: None,
            stream: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.metadata.is_none()
    }

    /// Copy of this entry with a different stream locator
    pub fn with_stream(&self, stream: Option<StreamLocator>) -> Self {
        Self {
            track_id: self.track_id,
            metadata: self.metadata.clone(),
            stream,
        }
    }

    /// Title for display, falling back to the track id
    pub fn display_title(&self) -> String {
        match &self.metadata {
            Some(meta) if !meta.title.is_empty() => meta.title.clone(),
            _ => format!("Track {}", self.track_id),
        }
    }
}

/// Immutable view of the queue published after every commit
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub entries: Arc<[QueueEntry]>,
    pub current_index: usize,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track ids in queue order
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.entries.iter().map(|e| e.track_id).collect()
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.entries.get(self.current_index)
    }
}
