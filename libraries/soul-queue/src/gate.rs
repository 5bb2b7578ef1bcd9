//! Single-writer commit gate
//!
//! Owns the queue store and the playback controller behind one async mutex.
//! Every structural change runs as a synchronous closure under the lock, after
//! the session check, and is applied to both sides identically. Closures
//! cannot await, so no network I/O can happen while the gate is held.

use crate::controller::PlaybackController;
use crate::error::{QueueError, Result};
use crate::events::QueueEvent;
use crate::session::{SessionCoordinator, SessionId};
use crate::store::QueueStore;
use crate::types::{QueueEntry, QueueSnapshot, TrackId};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, warn};

struct GateState {
    store: QueueStore,
    controller: Box<dyn PlaybackController>,
}

/// Serialization point for queue mutations
pub struct CommitGate {
    state: Mutex<GateState>,
    sessions: Arc<SessionCoordinator>,
    snapshots: watch::Sender<QueueSnapshot>,
    events: broadcast::Sender<QueueEvent>,
}

impl CommitGate {
    pub fn new(
        controller: Box<dyn PlaybackController>,
        sessions: Arc<SessionCoordinator>,
        events: broadcast::Sender<QueueEvent>,
    ) -> Self {
        let (snapshots, _) = watch::channel(QueueSnapshot::default());
        Self {
            state: Mutex::new(GateState {
                store: QueueStore::new(),
                controller,
            }),
            sessions,
            snapshots,
            events,
        }
    }

    /// Run `f` under the gate if `session` is still current
    ///
    /// `None` skips the session check (user-initiated edits). Returns `None`
    /// when the session was stale and nothing was touched.
    pub async fn commit<R, F>(&self, session: Option<SessionId>, f: F) -> Option<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> R,
    {
        let mut guard = self.state.lock().await;

        if let Some(session) = session {
            if !self.sessions.is_current(session) {
                debug!(session = %session, "Dropping commit from stale session");
                return None;
            }
        }

        let state = &mut *guard;
        let mut txn = Transaction {
            store: &mut state.store,
            controller: state.controller.as_mut(),
            changed: false,
        };
        let result = f(&mut txn);

        if let Some(engine) = txn.drift() {
            warn!(
                engine,
                store = txn.store.current_index(),
                "Playback engine index out of step with queue"
            );
        }
        if txn.changed {
            let snapshot = state.store.snapshot();
            let _ = self.events.send(QueueEvent::QueueChanged {
                length: snapshot.len(),
                current_index: snapshot.current_index,
            });
            self.snapshots.send_replace(snapshot);
        }

        Some(result)
    }

    /// Read the store under the gate
    pub async fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&QueueStore) -> R,
    {
        let guard = self.state.lock().await;
        f(&guard.store)
    }

    /// Latest published snapshot, without taking the gate
    pub fn snapshot(&self) -> QueueSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshots.subscribe()
    }
}

/// Mirrored mutations available inside [`CommitGate::commit`]
///
/// Each method changes the store first and forwards exactly the effective
/// change (after duplicate filtering) to the controller.
pub struct Transaction<'a> {
    store: &'a mut QueueStore,
    controller: &'a mut dyn PlaybackController,
    changed: bool,
}

impl Transaction<'_> {
    pub fn store(&self) -> &QueueStore {
        self.store
    }

    pub fn set_all(&mut self, entries: Vec<QueueEntry>, start_index: usize, autoplay: bool) -> usize {
        let kept = self.store.set_all(entries, start_index);
        self.controller
            .set_queue(&kept, self.store.current_index(), autoplay);
        self.changed = true;
        kept.len()
    }

    pub fn append(&mut self, entries: Vec<QueueEntry>) -> usize {
        let added = self.store.append(entries);
        if !added.is_empty() {
            self.controller.append_all(&added);
            self.changed = true;
        }
        added.len()
    }

    pub fn insert_at(&mut self, index: usize, entries: Vec<QueueEntry>) -> usize {
        let len_before = self.store.len();
        let (index, inserted) = self.store.insert_at(index, entries);
        if inserted.is_empty() {
            return 0;
        }

        if index == len_before {
            self.controller.append_all(&inserted);
        } else {
            self.controller.insert_at(index, &inserted);
        }
        self.changed = true;
        inserted.len()
    }

    /// Insert entries where they belong by `rank`, keeping the queue sorted
    ///
    /// For a chunk after everything queued this is an append, for a chunk
    /// before everything queued an insert at 0.
    pub fn place<F>(&mut self, entries: Vec<QueueEntry>, rank: F) -> usize
    where
        F: Fn(TrackId) -> usize,
    {
        let runs = self.store.placement_runs(entries, rank);
        runs.into_iter()
            .map(|(index, run)| self.insert_at(index, run))
            .sum()
    }

    pub fn remove_at(&mut self, index: usize) -> Option<QueueEntry> {
        let removed = self.store.remove_at(index)?;
        self.controller.remove_at(index);
        self.changed = true;
        Some(removed)
    }

    pub fn replace_at(&mut self, index: usize, entry: QueueEntry) -> Result<QueueEntry> {
        let previous = self.store.replace_at(index, entry)?;
        if let Some(current) = self.store.get(index) {
            self.controller.replace_at(index, current);
        }
        self.changed = true;
        Ok(previous)
    }

    pub fn seek_and_play(&mut self, index: usize) -> Result<()> {
        self.store.set_current_index(index)?;
        self.controller.seek_to_index_and_play(index);
        self.changed = true;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.controller.set_queue(&[], 0, false);
        self.changed = true;
    }

    pub fn play(&mut self) -> Result<()> {
        if self.store.is_empty() {
            return Err(QueueError::EmptyPlaylist);
        }
        self.controller.play();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    /// The engine's index when it disagrees with the store's current index
    fn drift(&self) -> Option<usize> {
        if self.store.is_empty() {
            return None;
        }
        let engine = self.controller.current_index();
        (engine != self.store.current_index()).then_some(engine)
    }
}
