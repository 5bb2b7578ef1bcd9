/// Playback controller that only logs
use soul_queue::{PlaybackController, QueueEntry};
use tracing::debug;

/// Stand-in audio engine: keeps its own queue and logs every call
#[derive(Debug, Default)]
pub struct LoggingController {
    queue: Vec<QueueEntry>,
    current: usize,
    playing: bool,
}

impl PlaybackController for LoggingController {
    fn set_queue(&mut self, entries: &[QueueEntry], start_index: usize, autoplay: bool) {
        debug!(len = entries.len(), start_index, autoplay, "Engine: set queue");
        self.queue = entries.to_vec();
        self.current = start_index;
        self.playing = autoplay;
    }

    fn insert_at(&mut self, index: usize, entries: &[QueueEntry]) {
        debug!(index, len = entries.len(), "Engine: insert");
        let had_entries = !self.queue.is_empty();
        self.queue.splice(index..index, entries.iter().cloned());
        if had_entries && index <= self.current {
            self.current += entries.len();
        }
    }

    fn append_all(&mut self, entries: &[QueueEntry]) {
        debug!(len = entries.len(), "Engine: append");
        self.queue.extend_from_slice(entries);
    }

    fn remove_at(&mut self, index: usize) {
        debug!(index, "Engine: remove");
        if index >= self.queue.len() {
            return;
        }
        self.queue.remove(index);
        if index < self.current {
            self.current -= 1;
        } else if self.current >= self.queue.len() {
            self.current = self.queue.len().saturating_sub(1);
        }
    }

    fn replace_at(&mut self, index: usize, entry: &QueueEntry) {
        debug!(index, track_id = %entry.track_id, "Engine: replace");
        if let Some(slot) = self.queue.get_mut(index) {
            *slot = entry.clone();
        }
    }

    fn seek_to_index_and_play(&mut self, index: usize) {
        debug!(index, "Engine: seek and play");
        self.current = index;
        self.playing = true;
    }

    fn current_index(&self) -> usize {
        self.current
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }
}
