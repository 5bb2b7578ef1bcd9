//! Error types for queue building

use crate::types::TrackId;
use thiserror::Error;

/// Errors reported by a catalog client
///
/// The classification drives the orchestrator: abuse trips the risk breaker,
/// transient failures are retried per chunk, everything else becomes a
/// placeholder entry.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Upstream flagged the traffic as abusive or rate-limited
    #[error("Catalog rejected the request (risk control): {message}")]
    Abuse { message: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Catalog request timed out")]
    Timeout,

    /// Non-success status from the catalog
    #[error("Catalog error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Response could not be decoded
    #[error("Failed to parse catalog response: {0}")]
    Parse(String),
}

impl CatalogError {
    pub fn is_abuse(&self) -> bool {
        matches!(self, CatalogError::Abuse { .. })
    }

    /// Whether retrying the same request might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CatalogError::Network(_) | CatalogError::Timeout => true,
            CatalogError::Status { status, .. } => *status >= 500,
            CatalogError::Abuse { .. } | CatalogError::Parse(_) => false,
        }
    }
}

/// Queue errors
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// Play request carried no track ids
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// Target id is not part of the requested list
    #[error("Target track {0} not found in playlist")]
    TargetNotFound(TrackId),

    /// Track id appears more than once where uniqueness is required
    #[error("Duplicate track in playlist: {0}")]
    DuplicateTrack(TrackId),

    /// Track is not in the queue
    #[error("Track {0} is not queued")]
    TrackNotQueued(TrackId),

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Catalog has no playable stream for the track
    #[error("No stream available for track {0}")]
    StreamUnavailable(TrackId),

    /// A newer build replaced the one being awaited
    #[error("Queue build was superseded")]
    Superseded,

    /// Risk breaker is open, background fetching is paused
    #[error("Risk control active: {message}")]
    RiskControl { message: String },

    /// Catalog failure surfaced to the caller
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Background task failed
    #[error("Queue task failed: {0}")]
    Task(String),
}

/// Result type for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;
