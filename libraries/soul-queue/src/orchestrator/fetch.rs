//! Catalog access for builds
//!
//! Wraps the catalog client with the prepared-item cache, chunk-level retries
//! and the risk breaker.

use crate::breaker::RiskBreaker;
use crate::cache::{wait_for_entry, PreparedCache};
use crate::catalog::CatalogClient;
use crate::error::CatalogError;
use crate::types::{AudioQuality, QueueEntry, StreamLocator, TrackId, TrackMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How a fetch treats the risk breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Priority {
    /// The user is waiting: run even while the breaker is open
    Essential,
    /// Background work: skipped while the breaker is open
    Background,
}

#[derive(Debug)]
pub(crate) enum FetchFailure {
    /// Breaker open, nothing was requested
    BreakerOpen,
    /// Catalog failed after retries
    Catalog(CatalogError),
}

pub(crate) struct Fetcher {
    catalog: Arc<dyn CatalogClient>,
    cache: PreparedCache,
    breaker: Arc<RiskBreaker>,
    retries: u32,
    backoff: Duration,
}

impl Fetcher {
    pub(crate) fn new(
        catalog: Arc<dyn CatalogClient>,
        cache: PreparedCache,
        breaker: Arc<RiskBreaker>,
        retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            breaker,
            retries,
            backoff,
        }
    }

    /// Prepared entries for `ids`, in the same order
    ///
    /// Cached entries are reused and ids another task is fetching are awaited
    /// instead of requested twice. Ids the catalog does not know become
    /// placeholders. Entries carry no stream locator.
    pub(crate) async fn entries(
        &self,
        ids: &[TrackId],
        priority: Priority,
    ) -> Result<Vec<QueueEntry>, FetchFailure> {
        let mut resolved: HashMap<TrackId, QueueEntry> = HashMap::with_capacity(ids.len());
        let mut pending: Vec<TrackId> = ids.to_vec();

        // Second round only picks up ids whose shared fetch was abandoned
        for _ in 0..2 {
            if pending.is_empty() {
                break;
            }
            let claim = self.cache.claim(&pending);
            resolved.extend(claim.ready.into_iter().map(|e| (e.track_id, e)));

            if !claim.ticket.is_empty() {
                let fetched = self.metadata(claim.ticket.ids(), priority).await?;
                let entries: Vec<QueueEntry> = claim
                    .ticket
                    .ids()
                    .iter()
                    .map(|id| match fetched.get(id) {
                        Some(meta) => QueueEntry::new(*id, meta.clone()),
                        None => QueueEntry::placeholder(*id),
                    })
                    .collect();
                claim.ticket.complete(&entries);
                resolved.extend(entries.into_iter().map(|e| (e.track_id, e)));
            }

            for (id, rx) in claim.waiting {
                if let Some(entry) = wait_for_entry(rx).await {
                    resolved.insert(id, entry);
                }
            }

            pending.retain(|id| !resolved.contains_key(id));
        }

        Ok(ids
            .iter()
            .map(|id| {
                resolved
                    .remove(id)
                    .unwrap_or_else(|| QueueEntry::placeholder(*id))
            })
            .collect())
    }

    /// Batch metadata call with transient retries
    async fn metadata(
        &self,
        ids: &[TrackId],
        priority: Priority,
    ) -> Result<HashMap<TrackId, TrackMetadata>, FetchFailure> {
        let mut attempt = 0;
        loop {
            if priority == Priority::Background && self.breaker.is_open() {
                return Err(FetchFailure::BreakerOpen);
            }

            match self.catalog.fetch_metadata_batch(ids).await {
                Ok(found) => {
                    debug!(requested = ids.len(), found = found.len(), "Fetched metadata batch");
                    return Ok(found);
                }
                Err(err) if err.is_abuse() => {
                    self.breaker.trip(&err.to_string());
                    return Err(FetchFailure::Catalog(err));
                }
                Err(err) if err.is_transient() && attempt < self.retries => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        error = %err,
                        attempt,
                        chunk_len = ids.len(),
                        "Metadata batch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(FetchFailure::Catalog(err)),
            }
        }
    }

    /// Stream locator for one track; abuse trips the breaker
    pub(crate) async fn stream(
        &self,
        track_id: TrackId,
        quality: AudioQuality,
    ) -> Result<Option<StreamLocator>, CatalogError> {
        match self.catalog.resolve_stream_locator(track_id, quality).await {
            Err(err) if err.is_abuse() => {
                self.breaker.trip(&err.to_string());
                Err(err)
            }
            other => other,
        }
    }
}
