//! Queue orchestrator
//!
//! Turns `(target, full id list)` into a live queue: the target plays after
//! one round trip, the window around it fills next, and the rest of the list
//! backfills in the background. A replay within the same list takes a fast
//! path that only seeks or inserts one entry.

mod build;
mod fetch;

use crate::breaker::RiskBreaker;
use crate::cache::PreparedCache;
use crate::catalog::CatalogClient;
use crate::config::{BuildOptions, QueueConfig};
use crate::controller::PlaybackController;
use crate::error::{CatalogError, QueueError, Result};
use crate::events::QueueEvent;
use crate::gate::CommitGate;
use crate::plan::{BuildPlan, PlaylistOrder};
use crate::session::{SessionCoordinator, SessionId};
use crate::types::{AudioQuality, QueueEntry, QueueSnapshot, TrackId};
use build::BuildJob;
use fetch::{FetchFailure, Fetcher, Priority};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The list a session is building, shared with its tasks
#[derive(Debug, Clone)]
struct ActiveBuild {
    session: SessionId,
    order: Arc<PlaylistOrder>,
    excluded: Arc<Mutex<HashSet<TrackId>>>,
}

impl ActiveBuild {
    /// Ids the user removed during this session
    fn excluded(&self) -> MutexGuard<'_, HashSet<TrackId>> {
        self.excluded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Inner {
    config: QueueConfig,
    quality: Mutex<AudioQuality>,
    gate: CommitGate,
    sessions: Arc<SessionCoordinator>,
    breaker: Arc<RiskBreaker>,
    cache: PreparedCache,
    fetcher: Fetcher,
    events: broadcast::Sender<QueueEvent>,
    active: Mutex<Option<ActiveBuild>>,
}

/// How a play request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// Different list: new session and full rebuild
    Rebuild,
    /// Same list as the current build: seek or single insert
    SameList,
}

/// Handle to the work started by [`QueueOrchestrator::play_target`]
///
/// Dropping the handle does not cancel anything.
#[derive(Debug)]
pub struct BuildHandle {
    session: SessionId,
    kind: BuildKind,
    ready: Option<oneshot::Receiver<Result<usize>>>,
    outcome: Option<Result<usize>>,
    task: JoinHandle<()>,
}

impl BuildHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn kind(&self) -> BuildKind {
        self.kind
    }

    /// Wait until the target is queued and playback was requested
    ///
    /// Returns the target's queue index.
    pub async fn playable(&mut self) -> Result<usize> {
        if let Some(rx) = self.ready.take() {
            let outcome = rx.await.unwrap_or(Err(QueueError::Superseded));
            self.outcome = Some(outcome);
        }
        self.outcome.clone().unwrap_or(Err(QueueError::Superseded))
    }

    /// Wait for every phase to finish or for the build to be abandoned
    pub async fn settled(self) -> Result<()> {
        self.task
            .await
            .map_err(|err| QueueError::Task(err.to_string()))
    }
}

/// Builds and maintains the playback queue
#[derive(Clone)]
pub struct QueueOrchestrator {
    inner: Arc<Inner>,
}

impl QueueOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        controller: Box<dyn PlaybackController>,
        config: QueueConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let sessions = Arc::new(SessionCoordinator::new());
        let breaker = Arc::new(RiskBreaker::with_notices(
            config.breaker_cooldown(),
            events.clone(),
        ));
        let cache = PreparedCache::new();
        let fetcher = Fetcher::new(
            catalog,
            cache.clone(),
            Arc::clone(&breaker),
            config.chunk_retries,
            config.retry_backoff(),
        );
        let gate = CommitGate::new(controller, Arc::clone(&sessions), events.clone());

        Self {
            inner: Arc::new(Inner {
                quality: Mutex::new(config.quality),
                config,
                gate,
                sessions,
                breaker,
                cache,
                fetcher,
                events,
                active: Mutex::new(None),
            }),
        }
    }

    /// Play `target` within `all_ids`
    ///
    /// Validates the request, then either takes the same-list fast path or
    /// opens a new session, resets the queue and starts the build in the
    /// background. Invalid requests fail here without touching anything;
    /// later failures are reported on the event channel and the handle.
    pub async fn play_target(
        &self,
        target: TrackId,
        all_ids: &[TrackId],
        options: BuildOptions,
    ) -> Result<BuildHandle> {
        let order = PlaylistOrder::new(all_ids);
        if order.is_empty() {
            return Err(QueueError::EmptyPlaylist);
        }
        let Some(target_index) = order.index_of(target) else {
            return Err(QueueError::TargetNotFound(target));
        };

        let inner = &self.inner;
        if let Some(active) = inner.same_list(&order) {
            info!(session = %active.session, track_id = %target, "Same playlist, seeking");
            let (tx, rx) = oneshot::channel();
            let session = active.session;
            let task = tokio::spawn(Arc::clone(inner).play_within(active, target, tx));
            return Ok(BuildHandle {
                session,
                kind: BuildKind::SameList,
                ready: Some(rx),
                outcome: None,
                task,
            });
        }

        let options = options.normalized();
        let order = Arc::new(order);
        let build = inner
            .gate
            .commit(None, |txn| {
                let session = inner.sessions.new_session();
                inner.cache.clear();
                txn.clear();
                let build = ActiveBuild {
                    session,
                    order: Arc::clone(&order),
                    excluded: Arc::default(),
                };
                *inner.active() = Some(build.clone());
                build
            })
            .await
            .ok_or(QueueError::Superseded)?;

        let session = build.session;
        info!(session = %session, total = order.len(), track_id = %target, "Starting queue build");
        let _ = inner.events.send(QueueEvent::BuildStarted {
            session,
            total: order.len(),
        });

        let job = BuildJob {
            session,
            plan: BuildPlan::new(&order, target_index, options.window_size),
            build,
            window_chunk_size: inner.config.window_chunk_size.max(1),
            background_chunk_size: options.background_chunk_size,
            concurrency: options.concurrency,
        };
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(Arc::clone(inner).run_build(job, tx));

        Ok(BuildHandle {
            session,
            kind: BuildKind::Rebuild,
            ready: Some(rx),
            outcome: None,
            task,
        })
    }

    /// Empty the queue and abandon any build in progress
    pub async fn clear(&self) {
        let inner = &self.inner;
        inner
            .gate
            .commit(None, |txn| {
                let session = inner.sessions.new_session();
                inner.cache.clear();
                *inner.active() = None;
                txn.clear();
                debug!(session = %session, "Queue cleared");
            })
            .await;
    }

    /// Remove a track from the queue
    ///
    /// A build still running for the current list will not queue it again.
    pub async fn remove_track(&self, track_id: TrackId) -> Result<QueueEntry> {
        let inner = &self.inner;
        inner
            .gate
            .commit(None, |txn| {
                let index = txn
                    .store()
                    .find_index(track_id)
                    .ok_or(QueueError::TrackNotQueued(track_id))?;
                if let Some(active) = inner.active().as_ref() {
                    active.excluded().insert(track_id);
                }
                txn.remove_at(index)
                    .ok_or(QueueError::IndexOutOfBounds(index))
            })
            .await
            .unwrap_or(Err(QueueError::Superseded))
    }

    /// Seek to a queued index and play it
    ///
    /// Works while the risk breaker is open: nothing is fetched.
    pub async fn play_index(&self, index: usize) -> Result<()> {
        self.inner
            .gate
            .commit(None, |txn| {
                if index >= txn.store().len() {
                    return Err(QueueError::IndexOutOfBounds(index));
                }
                txn.seek_and_play(index)
            })
            .await
            .unwrap_or(Err(QueueError::Superseded))
    }

    pub async fn pause(&self) {
        self.inner.gate.commit(None, |txn| txn.pause()).await;
    }

    pub async fn resume(&self) -> Result<()> {
        self.inner
            .gate
            .commit(None, |txn| txn.play())
            .await
            .unwrap_or(Err(QueueError::Superseded))
    }

    /// Resolve the stream locator of a queued track and swap it in
    ///
    /// Called when the playback engine is about to play an entry whose
    /// locator is still unresolved.
    pub async fn resolve_stream(&self, track_id: TrackId) -> Result<QueueEntry> {
        self.inner.resolve_and_replace(None, track_id).await
    }

    /// Switch stream quality
    ///
    /// Resolved locators are dropped and re-resolved lazily; the current
    /// entry is re-resolved right away.
    pub async fn set_quality(&self, quality: AudioQuality) -> Result<()> {
        *self
            .inner
            .quality
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = quality;

        let current = self
            .inner
            .gate
            .commit(None, |txn| {
                let stale: Vec<(usize, QueueEntry)> = txn
                    .store()
                    .entries()
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.stream.is_some())
                    .map(|(i, e)| (i, e.with_stream(None)))
                    .collect();
                for (index, entry) in stale {
                    // Same track id in the same slot cannot collide
                    let _ = txn.replace_at(index, entry);
                }
                txn.store().current_entry().map(|e| e.track_id)
            })
            .await
            .flatten();

        info!(quality = quality.as_str(), "Stream quality changed");
        match current {
            Some(track_id) => self.resolve_stream(track_id).await.map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.gate.snapshot()
    }

    /// Receiver that sees every published snapshot
    pub fn watch_queue(&self) -> watch::Receiver<QueueSnapshot> {
        self.inner.gate.watch()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.inner.sessions.current()
    }

    pub fn breaker(&self) -> &RiskBreaker {
        &self.inner.breaker
    }

    /// Whether an entry for `track_id` is prepared in the cache
    pub fn is_prepared(&self, track_id: TrackId) -> bool {
        self.inner.cache.has(track_id)
    }

    pub fn prepared_count(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn quality(&self) -> AudioQuality {
        *self
            .inner
            .quality
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<ActiveBuild>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active build, if it is still current and has the same fingerprint
    fn same_list(&self, order: &PlaylistOrder) -> Option<ActiveBuild> {
        self.active()
            .as_ref()
            .filter(|active| {
                self.sessions.is_current(active.session)
                    && active.order.fingerprint() == order.fingerprint()
            })
            .cloned()
    }

    /// Drop the active build of `session` so its list rebuilds on next play
    ///
    /// Used when the target never made it into the queue: there is nothing
    /// for the fast path to seek within.
    async fn forget(&self, session: SessionId) {
        self.gate
            .commit(Some(session), |_| {
                let mut active = self.active();
                if active.as_ref().is_some_and(|a| a.session == session) {
                    *active = None;
                }
            })
            .await;
    }

    /// Put a failed request on the event channel
    ///
    /// Risk-control failures are announced once by the breaker itself.
    fn report(&self, err: &QueueError) {
        if matches!(err, QueueError::Superseded | QueueError::RiskControl { .. }) {
            return;
        }
        let _ = self.events.send(QueueEvent::Error {
            message: err.to_string(),
        });
    }

    /// Fast path: seek to the target, or fetch and insert just that entry
    async fn play_within(
        self: Arc<Self>,
        active: ActiveBuild,
        target: TrackId,
        ready: oneshot::Sender<Result<usize>>,
    ) {
        let session = active.session;
        active.excluded().remove(&target);

        let seeked = self
            .gate
            .commit(Some(session), |txn| {
                let index = txn.store().find_index(target)?;
                txn.seek_and_play(index).ok().map(|()| index)
            })
            .await;

        let result = match seeked {
            None => Err(QueueError::Superseded),
            Some(Some(index)) => Ok(index),
            Some(None) => self.insert_and_play(&active, target).await,
        };

        if let Err(err) = &result {
            self.report(err);
        } else {
            let _ = self.events.send(QueueEvent::TargetReady {
                session,
                track_id: target,
            });
        }
        let _ = ready.send(result);
    }

    async fn insert_and_play(&self, active: &ActiveBuild, target: TrackId) -> Result<usize> {
        let entry = self.target_entry(target).await?;
        let order = &active.order;

        let index = self
            .gate
            .commit(Some(active.session), |txn| {
                // Backfill may have landed it while we were fetching
                if txn.store().find_index(target).is_none() {
                    txn.place(vec![entry], |id| order.rank(id));
                }
                let index = txn
                    .store()
                    .find_index(target)
                    .ok_or(QueueError::TrackNotQueued(target))?;
                txn.seek_and_play(index).map(|()| index)
            })
            .await
            .ok_or(QueueError::Superseded)??;

        debug!(session = %active.session, track_id = %target, index, "Inserted target into queue");
        if let Err(err) = self.resolve_and_replace(Some(active.session), target).await {
            warn!(track_id = %target, error = %err, "Could not resolve stream for target");
        }
        Ok(index)
    }

    /// Metadata for the track the user is waiting for
    async fn target_entry(&self, target: TrackId) -> Result<QueueEntry> {
        match self.fetcher.entries(&[target], Priority::Essential).await {
            Ok(mut entries) => entries.pop().ok_or(QueueError::TargetNotFound(target)),
            Err(FetchFailure::BreakerOpen) => Err(QueueError::RiskControl {
                message: "Background loading is paused".to_string(),
            }),
            Err(FetchFailure::Catalog(err)) => Err(user_error(err)),
        }
    }

    /// Resolve a locator and replace the queued entry under the gate
    async fn resolve_and_replace(
        &self,
        session: Option<SessionId>,
        track_id: TrackId,
    ) -> Result<QueueEntry> {
        let quality = *self.quality.lock().unwrap_or_else(PoisonError::into_inner);
        let locator = self
            .fetcher
            .stream(track_id, quality)
            .await
            .map_err(user_error)?
            .ok_or(QueueError::StreamUnavailable(track_id))?;

        self.gate
            .commit(session, |txn| {
                let index = txn
                    .store()
                    .find_index(track_id)
                    .ok_or(QueueError::TrackNotQueued(track_id))?;
                let updated = txn
                    .store()
                    .get(index)
                    .map(|entry| entry.with_stream(Some(locator)))
                    .ok_or(QueueError::IndexOutOfBounds(index))?;
                txn.replace_at(index, updated.clone())?;
                Ok(updated)
            })
            .await
            .unwrap_or(Err(QueueError::Superseded))
    }
}

/// Collapse abuse signals into the single user-facing risk-control error
fn user_error(err: CatalogError) -> QueueError {
    match err {
        CatalogError::Abuse { message } => QueueError::RiskControl { message },
        other => QueueError::Catalog(other),
    }
}
