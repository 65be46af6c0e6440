/// Contracts for the external enrichment sources
///
/// Each source is an adapter owned by the deployment. The worker only relies
/// on the shapes below.
use crate::modules::browser::BrowserSession;
use crate::modules::tracks::domain::{Track, TrackPatch};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Result of one batch call. Tracks absent from all three lists count as not found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentOutcome {
    pub patches: Vec<(Uuid, TrackPatch)>,
    pub not_found: Vec<Uuid>,
    pub errors: Vec<(Uuid, String)>,
}

/// Batch metadata API: many tracks per call
#[async_trait]
pub trait BatchEnricher: Send + Sync {
    async fn enrich(&self, tracks: &[Track]) -> AppResult<EnrichmentOutcome>;
}

/// Reads one track's page through a leased browser session.
/// `Ok(None)` means the page had nothing for this track.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(
        &self,
        session: Arc<dyn BrowserSession>,
        track: Track,
    ) -> AppResult<Option<TrackPatch>>;
}

/// Per-track lookup against a metered API
#[async_trait]
pub trait TrackLookup: Send + Sync {
    async fn lookup(&self, track: &Track) -> AppResult<Option<TrackPatch>>;
}
