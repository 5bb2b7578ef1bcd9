//! Catalog client seam
//!
//! The remote metadata / stream-URL service. Implementations live outside this
//! crate (see `soul-catalog` for the HTTP one).

use crate::error::CatalogError;
use crate::types::{AudioQuality, StreamLocator, TrackId, TrackMetadata};
use async_trait::async_trait;
use std::collections::HashMap;

/// Remote track catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Look up metadata for a batch of tracks
    ///
    /// Partial results are allowed: ids missing from the returned map are
    /// treated as not found, not as errors.
    async fn fetch_metadata_batch(
        &self,
        ids: &[TrackId],
    ) -> Result<HashMap<TrackId, TrackMetadata>, CatalogError>;

    /// Resolve a playable stream, `Ok(None)` when the track is not available
    async fn resolve_stream_locator(
        &self,
        id: TrackId,
        quality: AudioQuality,
    ) -> Result<Option<StreamLocator>, CatalogError>;
}
