/// In-process TrackStore for single-node setups and tests
use crate::modules::tracks::domain::{BatchUpdateResult, Track, TrackPatch, TrackStore};
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryTrackStore {
    tracks: Arc<DashMap<Uuid, Track>>,
}

impl InMemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let store = Self::new();
        for track in tracks {
            store.insert(track);
        }
        store
    }

    pub fn insert(&self, track: Track) {
        self.tracks.insert(track.id, track);
    }

    pub fn get(&self, id: &Uuid) -> Option<Track> {
        self.tracks.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn apply(&self, id: Uuid, patch: &TrackPatch) -> AppResult<()> {
        let mut entry = self
            .tracks
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Track {} not found", id)))?;
        patch.apply_to(entry.value_mut());
        entry.value_mut().updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TrackStore for InMemoryTrackStore {
    async fn get_tracks_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Track>> {
        Ok(ids.iter().filter_map(|id| self.get(id)).collect())
    }

    async fn update_track_metadata(&self, id: Uuid, patch: &TrackPatch) -> AppResult<()> {
        self.apply(id, patch)
    }

    async fn get_tracks_by_duplicate_key(&self, duplicate_key: &str) -> AppResult<Vec<Track>> {
        Ok(self
            .tracks
            .iter()
            .filter(|entry| entry.value().duplicate_key.as_deref() == Some(duplicate_key))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn batch_update_track_metadata(
        &self,
        updates: &[(Uuid, TrackPatch)],
    ) -> AppResult<BatchUpdateResult> {
        let mut result = BatchUpdateResult::default();
        for (id, patch) in updates {
            match self.apply(*id, patch) {
                Ok(()) => result.success_count += 1,
                Err(_) => result.failed_ids.push(*id),
            }
        }
        Ok(result)
    }
}
