//! Queue events
//!
//! Notices for the UI layer. `play_target` is fire-and-forget, so failures
//! after request validation are reported here rather than returned.

use crate::session::SessionId;
use crate::types::TrackId;
use serde::{Deserialize, Serialize};

/// Build phase, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildPhase {
    /// Fetch and start the requested track
    Target,
    /// Fill the tracks around the target
    Window,
    /// Fill the rest of the list in the background
    Backfill,
}

/// Events emitted by the queue orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueEvent {
    /// A new build session replaced the queue
    BuildStarted { session: SessionId, total: usize },

    /// The requested track is queued and playback was requested
    TargetReady { session: SessionId, track_id: TrackId },

    /// A phase finished committing
    PhaseCompleted { session: SessionId, phase: BuildPhase },

    /// All phases finished
    BuildCompleted { session: SessionId, loaded: usize },

    /// Build stopped early (superseded or paused by risk control)
    BuildAbandoned { session: SessionId, phase: BuildPhase },

    /// Upstream abuse signal, background fetching paused
    RiskControlTripped { message: String, cooldown_secs: u64 },

    /// Queue contents changed
    QueueChanged { length: usize, current_index: usize },

    /// User-visible error
    Error { message: String },
}
