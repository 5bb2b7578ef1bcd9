//! Soul Player - Progressive Queue Building
//!
//! Builds a playback queue from a (possibly very long) list of track ids
//! without making the user wait for the whole list.
//!
//! This crate provides:
//! - Target-first playback (one catalog round trip before audio starts)
//! - Window fill around the target, then background backfill
//! - Session-based cancellation of superseded builds
//! - A single commit gate keeping the queue store and the audio engine in step
//! - A prepared-entry cache with in-flight de-duplication
//! - A risk breaker that pauses background fetching on abuse signals
//!
//! # Architecture
//!
//! `soul-queue` owns no I/O of its own. The catalog and the audio engine are
//! provided through traits:
//!
//! - [`CatalogClient`]: batch metadata lookup and stream resolution
//! - [`PlaybackController`]: the engine's queue primitives
//!
//! # Example
//!
//! ```rust,no_run
//! use soul_queue::{BuildOptions, QueueConfig, QueueOrchestrator, TrackId};
//! # use soul_queue::{CatalogClient, PlaybackController};
//! # use std::sync::Arc;
//! # async fn run(
//! #     catalog: Arc<dyn CatalogClient>,
//! #     controller: Box<dyn PlaybackController>,
//! # ) -> soul_queue::Result<()> {
//! let queue = QueueOrchestrator::new(catalog, controller, QueueConfig::default());
//!
//! let ids: Vec<TrackId> = (1..=1000).map(TrackId).collect();
//! let mut handle = queue
//!     .play_target(TrackId(500), &ids, BuildOptions::default())
//!     .await?;
//!
//! // Target is queued and playing; the rest keeps loading
//! handle.playable().await?;
//! handle.settled().await?;
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod gate;
pub mod orchestrator;
pub mod plan;
pub mod session;
pub mod store;
pub mod types;

pub use breaker::RiskBreaker;
pub use cache::PreparedCache;
pub use catalog::CatalogClient;
pub use config::{BuildOptions, QueueConfig};
pub use controller::PlaybackController;
pub use error::{CatalogError, QueueError, Result};
pub use events::{BuildPhase, QueueEvent};
pub use fingerprint::PlaylistFingerprint;
pub use orchestrator::{BuildHandle, BuildKind, QueueOrchestrator};
pub use plan::{BuildPlan, PlaylistOrder};
pub use session::{SessionCoordinator, SessionId};
pub use store::QueueStore;
pub use types::{AudioQuality, QueueEntry, QueueSnapshot, StreamLocator, TrackId, TrackMetadata};
