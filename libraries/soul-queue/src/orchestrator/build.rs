//! Full rebuild: target first, then the window, then the background backfill

use super::fetch::{FetchFailure, Priority};
use super::{ActiveBuild, Inner};
use crate::error::QueueError;
use crate::events::{BuildPhase, QueueEvent};
use crate::plan::{after_chunks, before_chunks, BuildPlan};
use crate::session::SessionId;
use crate::types::{QueueEntry, TrackId};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, info, warn};

/// Why a direction stopped before its last chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Stale,
    BreakerOpen,
}

/// Outcome of preparing one chunk
enum Prepared {
    Entries(Vec<QueueEntry>),
    Halted(Halt),
}

pub(super) struct BuildJob {
    pub(super) session: SessionId,
    pub(super) build: ActiveBuild,
    pub(super) plan: BuildPlan,
    pub(super) window_chunk_size: usize,
    pub(super) background_chunk_size: usize,
    pub(super) concurrency: usize,
}

impl Inner {
    pub(super) async fn run_build(
        self: Arc<Self>,
        job: BuildJob,
        ready: oneshot::Sender<Result<usize, QueueError>>,
    ) {
        let session = job.session;

        // Phase A: the track the user asked for
        let target = match self.target_entry(job.plan.target).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(session = %session, error = %err, "Target fetch failed");
                self.forget(session).await;
                self.report(&err);
                let _ = ready.send(Err(err));
                self.abandoned(session, BuildPhase::Target);
                return;
            }
        };

        let committed = self
            .gate
            .commit(Some(session), |txn| txn.set_all(vec![target], 0, true))
            .await;
        if committed.is_none() {
            let _ = ready.send(Err(QueueError::Superseded));
            self.abandoned(session, BuildPhase::Target);
            return;
        }

        info!(session = %session, track_id = %job.plan.target, "Target queued, playback requested");
        let _ = ready.send(Ok(0));
        let _ = self.events.send(QueueEvent::TargetReady {
            session,
            track_id: job.plan.target,
        });
        self.completed(session, BuildPhase::Target);

        let permits = Arc::new(Semaphore::new(job.concurrency));

        // Phase B: neighbours of the target; the locator for the target is
        // resolved alongside since it is about to play
        let window = async {
            let after = after_chunks(&job.plan.window_after, job.window_chunk_size);
            let before = before_chunks(&job.plan.window_before, job.window_chunk_size);
            let (after, before) = tokio::join!(
                self.fill(&job, after, Priority::Essential, &permits),
                self.fill(&job, before, Priority::Essential, &permits),
            );
            after.and(before)
        };
        let (window, _) = tokio::join!(window, self.prepare_current(session, job.plan.target));
        if let Err(halt) = window {
            self.halted(session, BuildPhase::Window, halt);
            return;
        }
        self.completed(session, BuildPhase::Window);

        // Phase C: the rest of the list, in the background
        let has_rest = !(job.plan.rest_after.is_empty() && job.plan.rest_before.is_empty());
        if has_rest && self.breaker.is_open() {
            self.halted(session, BuildPhase::Backfill, Halt::BreakerOpen);
            return;
        }
        let after = after_chunks(&job.plan.rest_after, job.background_chunk_size);
        let before = before_chunks(&job.plan.rest_before, job.background_chunk_size);
        let (after, before) = tokio::join!(
            self.fill(&job, after, Priority::Background, &permits),
            self.fill(&job, before, Priority::Background, &permits),
        );
        if let Err(halt) = after.and(before) {
            self.halted(session, BuildPhase::Backfill, halt);
            return;
        }

        self.completed(session, BuildPhase::Backfill);
        let loaded = self.gate.read(|store| store.len()).await;
        info!(session = %session, loaded, "Queue build complete");
        let _ = self.events.send(QueueEvent::BuildCompleted { session, loaded });
    }

    /// Fetch `chunks` with bounded concurrency and commit them in order
    ///
    /// Chunks complete in any order; `buffered` yields them in submission
    /// order so each commit only ever extends the contiguous prefix.
    async fn fill(
        &self,
        job: &BuildJob,
        chunks: Vec<Vec<TrackId>>,
        priority: Priority,
        permits: &Semaphore,
    ) -> Result<(), Halt> {
        let pending: Vec<_> = chunks
            .into_iter()
            .map(|chunk| self.prepare_chunk(job, chunk, priority, permits))
            .collect();
        let mut prepared = stream::iter(pending).buffered(job.concurrency);

        while let Some(chunk) = prepared.next().await {
            let entries = match chunk {
                Prepared::Entries(entries) => entries,
                Prepared::Halted(halt) => return Err(halt),
            };

            if priority == Priority::Background && self.breaker.is_open() {
                return Err(Halt::BreakerOpen);
            }

            let entries: Vec<QueueEntry> = {
                let excluded = job.build.excluded();
                entries
                    .into_iter()
                    .filter(|e| !excluded.contains(&e.track_id))
                    .collect()
            };
            if entries.is_empty() {
                continue;
            }

            let order = &job.build.order;
            let placed = self
                .gate
                .commit(Some(job.session), |txn| {
                    txn.place(entries, |id| order.rank(id))
                })
                .await
                .ok_or(Halt::Stale)?;
            debug!(session = %job.session, placed, "Committed chunk");
        }

        Ok(())
    }

    async fn prepare_chunk(
        &self,
        job: &BuildJob,
        chunk: Vec<TrackId>,
        priority: Priority,
        permits: &Semaphore,
    ) -> Prepared {
        let Ok(_permit) = permits.acquire().await else {
            return Prepared::Halted(Halt::Stale);
        };

        if !self.sessions.is_current(job.session) {
            return Prepared::Halted(Halt::Stale);
        }
        if priority == Priority::Background && self.breaker.is_open() {
            return Prepared::Halted(Halt::BreakerOpen);
        }

        let unloaded: Vec<TrackId> = self
            .gate
            .read(|store| {
                chunk
                    .iter()
                    .copied()
                    .filter(|id| !store.contains(*id))
                    .collect()
            })
            .await;
        if unloaded.is_empty() {
            return Prepared::Entries(Vec::new());
        }

        match self.fetcher.entries(&unloaded, priority).await {
            Ok(entries) => Prepared::Entries(entries),
            Err(FetchFailure::BreakerOpen) => Prepared::Halted(Halt::BreakerOpen),
            Err(FetchFailure::Catalog(err)) => {
                warn!(
                    session = %job.session,
                    error = %err,
                    chunk_len = unloaded.len(),
                    "Chunk fetch failed, queueing placeholders"
                );
                Prepared::Entries(unloaded.into_iter().map(QueueEntry::placeholder).collect())
            }
        }
    }

    /// Resolve the locator of the entry that just started playing
    async fn prepare_current(&self, session: SessionId, track_id: TrackId) {
        if !self.sessions.is_current(session) {
            return;
        }
        if let Err(err) = self.resolve_and_replace(Some(session), track_id).await {
            warn!(session = %session, track_id = %track_id, error = %err, "Could not resolve stream for target");
        }
    }

    fn completed(&self, session: SessionId, phase: BuildPhase) {
        debug!(session = %session, ?phase, "Phase complete");
        let _ = self
            .events
            .send(QueueEvent::PhaseCompleted { session, phase });
    }

    fn abandoned(&self, session: SessionId, phase: BuildPhase) {
        let _ = self
            .events
            .send(QueueEvent::BuildAbandoned { session, phase });
    }

    fn halted(&self, session: SessionId, phase: BuildPhase, halt: Halt) {
        match halt {
            Halt::Stale => debug!(session = %session, ?phase, "Build superseded"),
            Halt::BreakerOpen => {
                info!(session = %session, ?phase, "Background fill paused by risk breaker");
            }
        }
        self.abandoned(session, phase);
    }
}
