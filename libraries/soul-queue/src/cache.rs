//! Prepared-item cache
//!
//! Memoizes fetched queue entries by track id, independent of whether they
//! were committed. Also tracks fetches in flight so two tasks asking for the
//! same id share one network call.

use crate::types::{QueueEntry, TrackId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug)]
enum Slot {
    Ready(QueueEntry),
    Pending {
        token: u64,
        rx: watch::Receiver<Option<QueueEntry>>,
    },
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    next_token: u64,
    slots: HashMap<TrackId, Slot>,
}

/// Track id -> prepared entry, shared between build tasks
#[derive(Debug, Clone, Default)]
pub struct PreparedCache {
    state: Arc<Mutex<CacheState>>,
}

/// Result of [`PreparedCache::claim`]
#[derive(Debug)]
pub struct Claim {
    /// Entries already prepared
    pub ready: Vec<QueueEntry>,

    /// Ids another task is fetching right now
    pub waiting: Vec<(TrackId, watch::Receiver<Option<QueueEntry>>)>,

    /// Ids the caller is now responsible for fetching
    pub ticket: FetchTicket,
}

/// Ownership of in-flight fetches
///
/// Completing the ticket publishes entries to waiters. Dropping it without
/// completing releases the claimed ids so a later request can retry them.
#[derive(Debug)]
pub struct FetchTicket {
    cache: PreparedCache,
    generation: u64,
    token: u64,
    senders: HashMap<TrackId, watch::Sender<Option<QueueEntry>>>,
    ids: Vec<TrackId>,
}

impl PreparedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, track_id: TrackId) -> Option<QueueEntry> {
        match self.lock().slots.get(&track_id) {
            Some(Slot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Store a prepared entry, last write wins
    pub fn put(&self, track_id: TrackId, entry: QueueEntry) {
        self.lock().slots.insert(track_id, Slot::Ready(entry));
    }

    pub fn has(&self, track_id: TrackId) -> bool {
        matches!(self.lock().slots.get(&track_id), Some(Slot::Ready(_)))
    }

    /// Number of prepared entries
    pub fn len(&self) -> usize {
        self.lock()
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything, including in-flight claims
    ///
    /// Fetches claimed before the clear still complete for their waiters but
    /// no longer write into the cache.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.slots.clear();
    }

    /// Split `ids` into prepared, in flight elsewhere, and to-be-fetched
    pub fn claim(&self, ids: &[TrackId]) -> Claim {
        let mut state = self.lock();
        state.next_token += 1;
        let token = state.next_token;
        let generation = state.generation;

        let mut ready = Vec::new();
        let mut waiting = Vec::new();
        let mut senders = HashMap::new();
        let mut to_fetch = Vec::new();

        let mut seen = HashSet::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            match state.slots.get(&id) {
                Some(Slot::Ready(entry)) => ready.push(entry.clone()),
                Some(Slot::Pending { rx, .. }) => waiting.push((id, rx.clone())),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.slots.insert(id, Slot::Pending { token, rx });
                    senders.insert(id, tx);
                    to_fetch.push(id);
                }
            }
        }
        drop(state);

        Claim {
            ready,
            waiting,
            ticket: FetchTicket {
                cache: self.clone(),
                generation,
                token,
                senders,
                ids: to_fetch,
            },
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FetchTicket {
    /// Ids this ticket must fetch, in request order
    pub fn ids(&self) -> &[TrackId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Publish fetched entries
    ///
    /// Entries are cached (unless the cache was cleared since the claim) and
    /// handed to waiters. Claimed ids without an entry are released.
    pub fn complete(mut self, entries: &[QueueEntry]) {
        let mut state = self.cache.lock();
        let same_generation = state.generation == self.generation;

        for entry in entries {
            let Some(tx) = self.senders.remove(&entry.track_id) else {
                continue;
            };
            if same_generation {
                state
                    .slots
                    .insert(entry.track_id, Slot::Ready(entry.clone()));
            }
            tx.send_replace(Some(entry.clone()));
        }
        drop(state);
        // Remaining senders are released by Drop
    }

    fn release(&mut self) {
        if self.senders.is_empty() {
            return;
        }
        let mut state = self.cache.lock();
        if state.generation == self.generation {
            for id in self.senders.keys() {
                if matches!(state.slots.get(id), Some(Slot::Pending { token, .. }) if *token == self.token)
                {
                    state.slots.remove(id);
                }
            }
        }
        drop(state);
        self.senders.clear();
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.release();
    }
}

/// Wait for an entry another task is fetching
///
/// Returns `None` if that fetch was abandoned.
pub async fn wait_for_entry(mut rx: watch::Receiver<Option<QueueEntry>>) -> Option<QueueEntry> {
    rx.wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|entry| (*entry).clone())
}
