//! Playback controller seam
//!
//! The audio engine's own queue. Every call happens inside the commit gate,
//! which gives implementations the single logical context they need; an
//! implementation that must run on a UI thread can marshal from there.

use crate::types::QueueEntry;

/// Queue-mutation primitives of the audio engine
///
/// Calls must be fast and local: no network I/O.
pub trait PlaybackController: Send {
    /// Replace the engine queue
    fn set_queue(&mut self, entries: &[QueueEntry], start_index: usize, autoplay: bool);

    fn insert_at(&mut self, index: usize, entries: &[QueueEntry]);

    fn append_all(&mut self, entries: &[QueueEntry]);

    fn remove_at(&mut self, index: usize);

    fn replace_at(&mut self, index: usize, entry: &QueueEntry);

    fn seek_to_index_and_play(&mut self, index: usize);

    fn current_index(&self) -> usize;

    fn play(&mut self) {}

    fn pause(&mut self) {}
}
