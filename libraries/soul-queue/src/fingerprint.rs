//! Cheap identity check for long track lists

use crate::types::TrackId;

/// Approximate identity of an ordered track list
///
/// Length, first id, last id, and a polynomial hash (`h = h * 31 + id`,
/// seeded at 1). Collisions are possible but accepted: a full comparison on
/// every play request would be O(n).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaylistFingerprint {
    pub len: usize,
    pub first: Option<TrackId>,
    pub last: Option<TrackId>,
    pub hash: i64,
}

impl PlaylistFingerprint {
    pub fn of(ids: &[TrackId]) -> Self {
        let hash = ids
            .iter()
            .fold(1i64, |h, id| h.wrapping_mul(31).wrapping_add(id.0));

        Self {
            len: ids.len(),
            first: ids.first().copied(),
            last: ids.last().copied(),
            hash,
        }
    }
}
