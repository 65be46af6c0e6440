/// Persistence boundary for track metadata
use crate::modules::tracks::domain::{Track, TrackPatch};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Outcome of a batched metadata write; individual rows may fail
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchUpdateResult {
    pub success_count: usize,
    pub failed_ids: Vec<Uuid>,
}

#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Load tracks by id; unknown ids are silently skipped
    async fn get_tracks_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Track>>;

    async fn update_track_metadata(&self, id: Uuid, patch: &TrackPatch) -> AppResult<()>;

    /// Every row sharing `duplicate_key`, across all listings
    async fn get_tracks_by_duplicate_key(&self, duplicate_key: &str) -> AppResult<Vec<Track>>;

    async fn batch_update_track_metadata(
        &self,
        updates: &[(Uuid, TrackPatch)],
    ) -> AppResult<BatchUpdateResult>;
}
