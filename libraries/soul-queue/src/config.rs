//! Queue build configuration

use crate::types::AudioQuality;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for queue building
///
/// Chunk sizes and the window are tuning constants, not protocol guarantees.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Number of tracks around the target fetched before the backfill
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Batch size for window metadata calls
    #[serde(default = "default_window_chunk_size")]
    pub window_chunk_size: usize,

    /// Batch size for background metadata calls
    #[serde(default = "default_background_chunk_size")]
    pub background_chunk_size: usize,

    /// Maximum catalog calls in flight for one build
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How long background fetching stays paused after an abuse signal
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,

    /// Retries for a chunk that failed transiently
    #[serde(default = "default_chunk_retries")]
    pub chunk_retries: u32,

    /// Delay before retrying a chunk (doubled on each attempt)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Stream quality requested when resolving locators
    #[serde(default)]
    pub quality: AudioQuality,

    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl QueueConfig {
    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_chunk_size: default_window_chunk_size(),
            background_chunk_size: default_background_chunk_size(),
            concurrency: default_concurrency(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
            chunk_retries: default_chunk_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            quality: AudioQuality::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Per-request overrides for a single `play_target` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub window_size: usize,
    pub background_chunk_size: usize,
    pub concurrency: usize,
}

impl BuildOptions {
    /// Clamp sizes to usable values
    pub(crate) fn normalized(self) -> Self {
        Self {
            window_size: self.window_size,
            background_chunk_size: self.background_chunk_size.max(1),
            concurrency: self.concurrency.max(1),
        }
    }
}

impl From<&QueueConfig> for BuildOptions {
    fn from(config: &QueueConfig) -> Self {
        Self {
            window_size: config.window_size,
            background_chunk_size: config.background_chunk_size,
            concurrency: config.concurrency,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

fn default_window_size() -> usize {
    50
}

fn default_window_chunk_size() -> usize {
    50
}

fn default_background_chunk_size() -> usize {
    20
}

fn default_concurrency() -> usize {
    6
}

fn default_breaker_cooldown_secs() -> u64 {
    300
}

fn default_chunk_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_event_capacity() -> usize {
    256
}
