//! Risk/backoff breaker
//!
//! Opens for a fixed cool-down once the catalog reports an abuse signal.
//! While open, background fetches are skipped; playback that is already
//! scheduled is untouched.

use crate::events::QueueEvent;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{info, warn};

/// Fixed cool-down after an abuse signal
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Circuit breaker for non-essential catalog traffic
#[derive(Debug)]
pub struct RiskBreaker {
    open_until: Mutex<Option<Instant>>,
    cooldown: Duration,
    notices: Option<broadcast::Sender<QueueEvent>>,
}

impl RiskBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            open_until: Mutex::new(None),
            cooldown,
            notices: None,
        }
    }

    /// Breaker that publishes a notice on every closed -> open transition
    pub fn with_notices(cooldown: Duration, notices: broadcast::Sender<QueueEvent>) -> Self {
        Self {
            notices: Some(notices),
            ..Self::new(cooldown)
        }
    }

    pub fn is_open(&self) -> bool {
        let guard = self.open_until.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*guard, Some(until) if Instant::now() < until)
    }

    /// Time left until the breaker closes again
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self.open_until.lock().unwrap_or_else(PoisonError::into_inner);
        guard.and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }

    /// Open the breaker for the cool-down window
    ///
    /// Returns `true` when this call opened a closed breaker. Tripping an
    /// already open breaker restarts the window without a second notice.
    pub fn trip(&self, reason: &str) -> bool {
        let now = Instant::now();
        let was_open = {
            let mut guard = self.open_until.lock().unwrap_or_else(PoisonError::into_inner);
            let was_open = matches!(*guard, Some(until) if now < until);
            *guard = Some(now + self.cooldown);
            was_open
        };

        if was_open {
            info!(reason, "Risk breaker re-armed");
            return false;
        }

        warn!(
            reason,
            cooldown_secs = self.cooldown.as_secs(),
            "Risk breaker opened, pausing background fetches"
        );
        if let Some(notices) = &self.notices {
            let _ = notices.send(QueueEvent::RiskControlTripped {
                message: user_notice(self.cooldown),
                cooldown_secs: self.cooldown.as_secs(),
            });
        }
        true
    }

    /// Close the breaker immediately
    pub fn reset(&self) {
        *self.open_until.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for RiskBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

fn user_notice(cooldown: Duration) -> String {
    format!(
        "The music service is limiting requests. Loading the rest of the playlist is paused for {} minutes.",
        cooldown.as_secs().div_ceil(60).max(1)
    )
}
