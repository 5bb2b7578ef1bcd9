//! Fetch planning
//!
//! Splits a play request into the target, the window around it, and the
//! remainder, and cuts each side into chunks in the order they should land.

use crate::fingerprint::PlaylistFingerprint;
use crate::types::TrackId;
use std::collections::{HashMap, HashSet};

/// The requested list in original order, with an id -> position map
#[derive(Debug, Clone)]
pub struct PlaylistOrder {
    ids: Vec<TrackId>,
    rank: HashMap<TrackId, usize>,
    fingerprint: PlaylistFingerprint,
}

impl PlaylistOrder {
    /// Build from the caller's list
    ///
    /// Repeated ids keep their first occurrence only.
    pub fn new(ids: &[TrackId]) -> Self {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<TrackId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let rank = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let fingerprint = PlaylistFingerprint::of(&ids);

        Self {
            ids,
            rank,
            fingerprint,
        }
    }

    pub fn ids(&self) -> &[TrackId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn fingerprint(&self) -> PlaylistFingerprint {
        self.fingerprint
    }

    pub fn index_of(&self, track_id: TrackId) -> Option<usize> {
        self.rank.get(&track_id).copied()
    }

    /// Position in the original list, unknown ids sort last
    pub fn rank(&self, track_id: TrackId) -> usize {
        self.index_of(track_id).unwrap_or(usize::MAX)
    }
}

/// Which ids each phase is responsible for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub target: TrackId,
    /// Window ids preceding the target, ascending
    pub window_before: Vec<TrackId>,
    /// Window ids following the target, ascending
    pub window_after: Vec<TrackId>,
    /// Ids before the window, ascending
    pub rest_before: Vec<TrackId>,
    /// Ids after the window, ascending
    pub rest_after: Vec<TrackId>,
}

impl BuildPlan {
    /// Center a window of `window_size` ids on `target_index`
    ///
    /// The window is split evenly and clipped to the list bounds; clipped
    /// slots are not moved to the other side.
    pub fn new(order: &PlaylistOrder, target_index: usize, window_size: usize) -> Self {
        let ids = order.ids();
        let before_len = window_size / 2;
        let after_len = window_size - before_len;

        let window_start = target_index.saturating_sub(before_len);
        let window_end = (target_index + 1 + after_len).min(ids.len());

        Self {
            target: ids[target_index],
            window_before: ids[window_start..target_index].to_vec(),
            window_after: ids[target_index + 1..window_end].to_vec(),
            rest_before: ids[..window_start].to_vec(),
            rest_after: ids[window_end..].to_vec(),
        }
    }
}

/// Chunks for ids after the target, nearest first
pub fn after_chunks(ids: &[TrackId], chunk_size: usize) -> Vec<Vec<TrackId>> {
    ids.chunks(chunk_size.max(1)).map(<[TrackId]>::to_vec).collect()
}

/// Chunks for ids before the target, nearest first
///
/// Chunks are cut from the end so each one lands immediately ahead of what is
/// already queued; ids inside a chunk stay ascending.
pub fn before_chunks(ids: &[TrackId], chunk_size: usize) -> Vec<Vec<TrackId>> {
    ids.rchunks(chunk_size.max(1)).map(<[TrackId]>::to_vec).collect()
}
