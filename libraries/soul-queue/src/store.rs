//! Queue store
//!
//! Ordered queue entries plus the current index, and the loaded-id set that
//! mirrors them for O(1) membership checks. Pure in-memory state: callers
//! serialize access through the commit gate.

use crate::error::{QueueError, Result};
use crate::types::{QueueEntry, QueueSnapshot, TrackId};
use std::collections::HashSet;

/// Queue contents and position
///
/// Invariants:
/// - no two entries share a track id
/// - `loaded` holds exactly the track ids in `entries`
/// - `current` is within `[0, len)`, or 0 when empty
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    entries: Vec<QueueEntry>,
    loaded: HashSet<TrackId>,
    current: usize,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole queue
    ///
    /// Duplicate ids keep their first occurrence. Returns the entries
    /// actually stored.
    pub fn set_all(&mut self, entries: Vec<QueueEntry>, start_index: usize) -> Vec<QueueEntry> {
        self.entries.clear();
        self.loaded.clear();
        self.current = 0;

        let kept = self.filter_new(entries);
        self.loaded.extend(kept.iter().map(|e| e.track_id));
        self.entries.clone_from(&kept);
        self.current = start_index.min(self.entries.len().saturating_sub(1));
        kept
    }

    /// Append entries, dropping ids already queued
    pub fn append(&mut self, entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
        let index = self.entries.len();
        self.insert_at(index, entries).1
    }

    /// Insert entries at `index` (clamped to the queue length)
    ///
    /// Ids already queued are dropped first. Inserting at or before the
    /// current index shifts it by the number of entries actually inserted.
    /// Returns the effective index and the inserted entries.
    pub fn insert_at(&mut self, index: usize, entries: Vec<QueueEntry>) -> (usize, Vec<QueueEntry>) {
        let index = index.min(self.entries.len());
        let kept = self.filter_new(entries);
        if kept.is_empty() {
            return (index, kept);
        }

        let had_entries = !self.entries.is_empty();
        self.loaded.extend(kept.iter().map(|e| e.track_id));
        self.entries.splice(index..index, kept.iter().cloned());

        if had_entries && index <= self.current {
            self.current += kept.len();
        }

        (index, kept)
    }

    /// Remove the entry at `index`
    ///
    /// Removing the current entry keeps the index numerically unchanged, so it
    /// now refers to the following entry; removing the last entry moves it
    /// back to the new last entry.
    pub fn remove_at(&mut self, index: usize) -> Option<QueueEntry> {
        if index >= self.entries.len() {
            return None;
        }

        let removed = self.entries.remove(index);
        self.loaded.remove(&removed.track_id);

        if index < self.current {
            self.current -= 1;
        } else if self.current >= self.entries.len() {
            self.current = self.entries.len().saturating_sub(1);
        }

        Some(removed)
    }

    /// Replace the entry at `index` wholesale
    ///
    /// The replacement may carry a different track id only if that id is not
    /// queued elsewhere. Returns the previous entry.
    pub fn replace_at(&mut self, index: usize, entry: QueueEntry) -> Result<QueueEntry> {
        let Some(slot) = self.entries.get_mut(index) else {
            return Err(QueueError::IndexOutOfBounds(index));
        };

        if slot.track_id != entry.track_id {
            if self.loaded.contains(&entry.track_id) {
                return Err(QueueError::DuplicateTrack(entry.track_id));
            }
            self.loaded.remove(&slot.track_id);
            self.loaded.insert(entry.track_id);
        }

        Ok(std::mem::replace(slot, entry))
    }

    pub fn find_index(&self, track_id: TrackId) -> Option<usize> {
        if !self.loaded.contains(&track_id) {
            return None;
        }
        self.entries.iter().position(|e| e.track_id == track_id)
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.loaded.contains(&track_id)
    }

    pub fn current_entry(&self) -> Option<&QueueEntry> {
        self.entries.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(QueueError::IndexOutOfBounds(index));
        }
        self.current = index;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.loaded.clear();
        self.current = 0;
    }

    /// Immutable copy for display
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.clone().into(),
            current_index: self.current,
        }
    }

    /// Group entries into contiguous inserts that keep the queue sorted by `rank`
    ///
    /// Assumes the queue is already sorted by `rank` and `entries` are in
    /// ascending rank. Each returned `(index, run)` is relative to the queue
    /// after the previous runs were inserted. Already queued ids are dropped.
    pub fn placement_runs<F>(&self, entries: Vec<QueueEntry>, rank: F) -> Vec<(usize, Vec<QueueEntry>)>
    where
        F: Fn(TrackId) -> usize,
    {
        let mut runs: Vec<(usize, Vec<QueueEntry>)> = Vec::new();
        let mut inserted = 0;

        for entry in self.filter_new(entries) {
            let entry_rank = rank(entry.track_id);
            let base = self
                .entries
                .partition_point(|queued| rank(queued.track_id) < entry_rank);

            match runs.last_mut() {
                Some((index, run)) if *index + run.len() == base + inserted => run.push(entry),
                _ => runs.push((base + inserted, vec![entry])),
            }
            inserted += 1;
        }

        runs
    }

    /// Drop entries already queued or repeated within `entries`
    fn filter_new(&self, entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
        let mut seen = HashSet::with_capacity(entries.len());
        entries
            .into_iter()
            .filter(|e| !self.loaded.contains(&e.track_id) && seen.insert(e.track_id))
            .collect()
    }
}
