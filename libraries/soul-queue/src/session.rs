//! Build sessions
//!
//! Every queue rebuild opens a session. Work started under a session captures
//! its id and re-checks it right before any visible side effect; once a newer
//! session exists the old one can never become current again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a build session, strictly increasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues session ids and answers "is this session still current?"
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    latest: AtomicU64,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session, superseding all earlier ones
    pub fn new_session(&self) -> SessionId {
        SessionId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.latest.load(Ordering::Acquire) == session.0
    }

    /// Latest issued session, `None` before the first build
    pub fn current(&self) -> Option<SessionId> {
        match self.latest.load(Ordering::Acquire) {
            0 => None,
            id => Some(SessionId(id)),
        }
    }
}
