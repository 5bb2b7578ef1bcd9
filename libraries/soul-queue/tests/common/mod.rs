//! Shared fakes for queue integration tests
//!
//! `FakeCatalog` answers from an in-memory id space and can hold, fail or
//! slow down calls. `RecordingController` mirrors every engine call onto its
//! own list so tests can check that the store and the engine never diverge.

#![allow(dead_code)]

use async_trait::async_trait;
use soul_queue::{
    AudioQuality, CatalogClient, CatalogError, PlaybackController, QueueConfig, QueueEntry,
    QueueEvent, QueueOrchestrator, StreamLocator, TrackId, TrackMetadata,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

// ===== Catalog =====

#[derive(Default)]
struct Script {
    missing: HashSet<TrackId>,
    unavailable: HashSet<TrackId>,
    failures: HashMap<TrackId, VecDeque<CatalogError>>,
    abuse: HashSet<TrackId>,
    stream_abuse: HashSet<TrackId>,
    delay: Option<Duration>,
    jitter: Option<(u64, u64)>,
    served: HashMap<TrackId, AudioQuality>,
}

/// In-memory catalog: every id exists unless marked missing
pub struct FakeCatalog {
    script: Mutex<Script>,
    calls: Mutex<Vec<Vec<TrackId>>>,
    stream_calls: Mutex<Vec<(TrackId, AudioQuality)>>,
    hold: watch::Sender<bool>,
    hold_min_batch: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub fn shared() -> Arc<Self> {
        let (hold, _) = watch::channel(false);
        Arc::new(Self {
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Vec::new()),
            stream_calls: Mutex::new(Vec::new()),
            hold,
            hold_min_batch: AtomicUsize::new(usize::MAX),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Batches of at least `min_len` ids block until [`FakeCatalog::release`]
    ///
    /// Single-id target lookups pass through when `min_len` is 2.
    pub fn hold_batches(&self, min_len: usize) {
        self.hold_min_batch.store(min_len, Ordering::SeqCst);
        self.hold.send_replace(true);
    }

    pub fn release(&self) {
        self.hold.send_replace(false);
    }

    pub fn mark_missing(&self, ids: impl IntoIterator<Item = i64>) {
        let mut script = self.script.lock().unwrap();
        script.missing.extend(ids.into_iter().map(TrackId));
    }

    pub fn mark_unavailable(&self, id: i64) {
        self.script.lock().unwrap().unavailable.insert(TrackId(id));
    }

    /// The next `times` batches containing `id` fail with `error`
    pub fn fail_batches_with(&self, id: i64, error: CatalogError, times: usize) {
        let mut script = self.script.lock().unwrap();
        let queue = script.failures.entry(TrackId(id)).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Every batch containing `id` is rejected as abusive
    pub fn abuse_on(&self, id: i64) {
        self.script.lock().unwrap().abuse.insert(TrackId(id));
    }

    pub fn stream_abuse_on(&self, id: i64) {
        self.script.lock().unwrap().stream_abuse.insert(TrackId(id));
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().unwrap().delay = Some(delay);
    }

    /// Give every batch its own latency of up to `max_ms`, derived from
    /// `seed` and the batch's first id, so chunks finish out of order
    pub fn scramble_latency(&self, seed: u64, max_ms: u64) {
        self.script.lock().unwrap().jitter = Some((seed, max_ms));
    }

    /// Serve `id` at `quality` whatever level was asked for
    pub fn serve_quality(&self, id: i64, quality: AudioQuality) {
        self.script.lock().unwrap().served.insert(TrackId(id), quality);
    }

    pub fn metadata_calls(&self) -> Vec<Vec<TrackId>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, id: i64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|batch| batch.contains(&TrackId(id)))
            .count()
    }

    pub fn stream_calls(&self) -> Vec<(TrackId, AudioQuality)> {
        self.stream_calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn wait_if_held(&self, batch_len: usize) {
        if batch_len < self.hold_min_batch.load(Ordering::SeqCst) {
            return;
        }
        let mut rx = self.hold.subscribe();
        let _ = rx.wait_for(|held| !*held).await;
    }

    fn scripted_failure(&self, ids: &[TrackId]) -> Option<CatalogError> {
        let mut script = self.script.lock().unwrap();
        if ids.iter().any(|id| script.abuse.contains(id)) {
            return Some(CatalogError::Abuse {
                message: "code -460".to_string(),
            });
        }
        ids.iter()
            .find_map(|id| script.failures.get_mut(id).and_then(VecDeque::pop_front))
    }
}

pub fn title_of(id: TrackId) -> String {
    format!("Song {}", id)
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_metadata_batch(
        &self,
        ids: &[TrackId],
    ) -> Result<HashMap<TrackId, TrackMetadata>, CatalogError> {
        self.calls.lock().unwrap().push(ids.to_vec());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.wait_if_held(ids.len()).await;
        let delay = {
            let script = self.script.lock().unwrap();
            script.delay.or_else(|| {
                let (seed, max_ms) = script.jitter?;
                let first = ids.first()?.0 as u64;
                let spread = first.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ seed;
                Some(Duration::from_millis(spread % (max_ms + 1)))
            })
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.scripted_failure(ids) {
            return Err(err);
        }

        let script = self.script.lock().unwrap();
        Ok(ids
            .iter()
            .filter(|id| !script.missing.contains(id))
            .map(|id| {
                (
                    *id,
                    TrackMetadata {
                        title: title_of(*id),
                        artists: vec!["Test Artist".to_string()],
                        album: Some("Test Album".to_string()),
                        duration: Some(Duration::from_secs(180)),
                        artwork: None,
                    },
                )
            })
            .collect())
    }

    async fn resolve_stream_locator(
        &self,
        id: TrackId,
        quality: AudioQuality,
    ) -> Result<Option<StreamLocator>, CatalogError> {
        self.stream_calls.lock().unwrap().push((id, quality));
        let script = self.script.lock().unwrap();
        if script.stream_abuse.contains(&id) {
            return Err(CatalogError::Abuse {
                message: "code -462".to_string(),
            });
        }
        if script.unavailable.contains(&id) {
            return Ok(None);
        }
        let quality = script.served.get(&id).copied().unwrap_or(quality);
        Ok(Some(StreamLocator {
            url: format!("https://cdn.test/{}/{}.mp3", id, quality.as_str()),
            quality,
        }))
    }
}

// ===== Controller =====

/// Engine calls as the controller received them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetQueue { len: usize, start: usize, autoplay: bool },
    InsertAt { index: usize, len: usize },
    AppendAll { len: usize },
    RemoveAt { index: usize },
    ReplaceAt { index: usize },
    Seek { index: usize },
    Play,
    Pause,
}

#[derive(Debug, Default)]
pub struct EngineState {
    pub queue: Vec<QueueEntry>,
    pub current: usize,
    pub playing: bool,
    pub calls: Vec<Call>,
}

impl EngineState {
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.queue.iter().map(|e| e.track_id).collect()
    }
}

/// Engine double that applies every call to its own queue
#[derive(Clone, Default)]
pub struct RecordingController {
    state: Arc<Mutex<EngineState>>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.with(EngineState::track_ids)
    }

    pub fn current(&self) -> usize {
        self.with(|s| s.current)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }
}

impl PlaybackController for RecordingController {
    fn set_queue(&mut self, entries: &[QueueEntry], start_index: usize, autoplay: bool) {
        let mut state = self.state();
        state.queue = entries.to_vec();
        state.current = start_index;
        state.playing = autoplay;
        state.calls.push(Call::SetQueue {
            len: entries.len(),
            start: start_index,
            autoplay,
        });
    }

    fn insert_at(&mut self, index: usize, entries: &[QueueEntry]) {
        let mut state = self.state();
        let had_entries = !state.queue.is_empty();
        for (offset, entry) in entries.iter().enumerate() {
            state.queue.insert(index + offset, entry.clone());
        }
        if had_entries && index <= state.current {
            state.current += entries.len();
        }
        state.calls.push(Call::InsertAt {
            index,
            len: entries.len(),
        });
    }

    fn append_all(&mut self, entries: &[QueueEntry]) {
        let mut state = self.state();
        state.queue.extend_from_slice(entries);
        state.calls.push(Call::AppendAll { len: entries.len() });
    }

    fn remove_at(&mut self, index: usize) {
        let mut state = self.state();
        state.queue.remove(index);
        if index < state.current {
            state.current -= 1;
        } else if state.current >= state.queue.len() {
            state.current = state.queue.len().saturating_sub(1);
        }
        state.calls.push(Call::RemoveAt { index });
    }

    fn replace_at(&mut self, index: usize, entry: &QueueEntry) {
        let mut state = self.state();
        state.queue[index] = entry.clone();
        state.calls.push(Call::ReplaceAt { index });
    }

    fn seek_to_index_and_play(&mut self, index: usize) {
        let mut state = self.state();
        state.current = index;
        state.playing = true;
        state.calls.push(Call::Seek { index });
    }

    fn current_index(&self) -> usize {
        self.state().current
    }

    fn play(&mut self) {
        let mut state = self.state();
        state.playing = true;
        state.calls.push(Call::Play);
    }

    fn pause(&mut self) {
        let mut state = self.state();
        state.playing = false;
        state.calls.push(Call::Pause);
    }
}

// ===== Helpers =====

pub fn ids(range: std::ops::RangeInclusive<i64>) -> Vec<TrackId> {
    range.map(TrackId).collect()
}

pub fn raw(ids: &[TrackId]) -> Vec<i64> {
    ids.iter().map(|id| id.0).collect()
}

/// Config with fast retries so tests do not sleep for real
pub fn test_config() -> QueueConfig {
    QueueConfig {
        retry_backoff_ms: 1,
        ..QueueConfig::default()
    }
}

pub fn orchestrator(
    catalog: &Arc<FakeCatalog>,
    config: QueueConfig,
) -> (QueueOrchestrator, RecordingController) {
    let controller = RecordingController::new();
    let queue = QueueOrchestrator::new(
        Arc::clone(catalog) as Arc<dyn CatalogClient>,
        Box::new(controller.clone()),
        config,
    );
    (queue, controller)
}

/// Store and engine agree on contents and position
pub fn assert_in_step(queue: &QueueOrchestrator, controller: &RecordingController) {
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.track_ids(), controller.track_ids());
    assert_eq!(snapshot.entries.to_vec(), controller.with(|s| s.queue.clone()));
    if !snapshot.is_empty() {
        assert_eq!(snapshot.current_index, controller.current());
    }
}

/// Drain whatever events are buffered right now
pub fn drain(rx: &mut broadcast::Receiver<QueueEvent>) -> Vec<QueueEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("soul_queue=debug")
        .with_test_writer()
        .try_init();
}
