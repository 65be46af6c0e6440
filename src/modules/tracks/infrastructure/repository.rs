/// Diesel-based implementation of TrackStore
use crate::modules::tracks::domain::{BatchUpdateResult, Track, TrackPatch, TrackStore};
use crate::modules::tracks::infrastructure::models::{NewTrackModel, TrackChangeset, TrackModel};
use crate::schema::tracks;
use crate::shared::database::{Database, DbConnection};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::TimedOperation;
use crate::log_warn;
use async_trait::async_trait;
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

pub struct PgTrackStore {
    db: Database,
}

impl PgTrackStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert catalog rows; used by importers and tests
    pub fn insert_tracks(&self, new_tracks: &[Track]) -> AppResult<usize> {
        let mut conn = self.db.get_connection()?;
        let rows: Vec<NewTrackModel> = new_tracks.iter().map(NewTrackModel::from).collect();

        diesel::insert_into(tracks::table)
            .values(&rows)
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to insert tracks: {}", e)))
    }

    fn update_with(conn: &mut DbConnection, id: Uuid, patch: &TrackPatch) -> AppResult<()> {
        let changeset = TrackChangeset::from(patch);

        let updated = diesel::update(tracks::table.find(id))
            .set(&changeset)
            .execute(conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to update track {}: {}", id, e)))?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("Track {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackStore for PgTrackStore {
    async fn get_tracks_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Track>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.get_connection()?;

        let rows: Vec<TrackModel> = tracks::table
            .filter(tracks::id.eq_any(ids.to_vec()))
            .select(TrackModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to load tracks: {}", e)))?;

        // Keep the caller's ordering
        let position: HashMap<Uuid, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut loaded: Vec<Track> = rows.into_iter().map(TrackModel::into_track).collect();
        loaded.sort_by_key(|track| position.get(&track.id).copied().unwrap_or(usize::MAX));

        Ok(loaded)
    }

    async fn update_track_metadata(&self, id: Uuid, patch: &TrackPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut conn = self.db.get_connection()?;
        Self::update_with(&mut conn, id, patch)
    }

    async fn get_tracks_by_duplicate_key(&self, duplicate_key: &str) -> AppResult<Vec<Track>> {
        let mut conn = self.db.get_connection()?;

        let rows: Vec<TrackModel> = tracks::table
            .filter(tracks::duplicate_key.eq(duplicate_key))
            .select(TrackModel::as_select())
            .load(&mut conn)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to load duplicates of {}: {}", duplicate_key, e))
            })?;

        Ok(rows.into_iter().map(TrackModel::into_track).collect())
    }

    async fn batch_update_track_metadata(
        &self,
        updates: &[(Uuid, TrackPatch)],
    ) -> AppResult<BatchUpdateResult> {
        let timer = TimedOperation::new("tracks batch update");
        let mut conn = self.db.get_connection()?;
        let mut result = BatchUpdateResult::default();

        // Row-by-row so one bad row does not sink the batch
        for (id, patch) in updates {
            if patch.is_empty() {
                result.success_count += 1;
                continue;
            }
            match Self::update_with(&mut conn, *id, patch) {
                Ok(()) => result.success_count += 1,
                Err(e) => {
                    log_warn!("Batch update skipped track {}: {}", id, e);
                    result.failed_ids.push(*id);
                }
            }
        }

        timer.finish_with_info(&format!(
            "{} ok, {} failed",
            result.success_count,
            result.failed_ids.len()
        ));
        Ok(result)
    }
}
