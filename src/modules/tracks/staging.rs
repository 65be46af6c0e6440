/// In-memory overlay of the tracks a job is working on
///
/// Phases read the effective state (stored row + every patch applied so far)
/// and write patches here instead of hitting storage. The worker flushes the
/// pending patches after each phase; a patch stays pending until a flush
/// persists it.
use crate::modules::tracks::domain::{Track, TrackPatch};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct TrackStagingContext {
    order: Vec<Uuid>,
    tracks: HashMap<Uuid, Track>,
    pending: HashMap<Uuid, TrackPatch>,
}

impl TrackStagingContext {
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut context = Self::default();
        for track in tracks {
            if context.tracks.contains_key(&track.id) {
                continue;
            }
            context.order.push(track.id);
            context.tracks.insert(track.id, track);
        }
        context
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn get_track(&self, id: &Uuid) -> Option<&Track> {
        self.tracks.get(id)
    }

    /// Tracks in load order
    pub fn get_all_tracks(&self) -> Vec<&Track> {
        self.order
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .collect()
    }

    pub fn track_ids(&self) -> Vec<Uuid> {
        self.order.clone()
    }

    /// Merge `patch` into the pending patch for `id` and into the snapshot.
    /// Returns false when the track is not part of this context.
    pub fn apply_patch(&mut self, id: Uuid, patch: TrackPatch) -> bool {
        if patch.is_empty() {
            return self.tracks.contains_key(&id);
        }
        let Some(track) = self.tracks.get_mut(&id) else {
            return false;
        };
        patch.apply_to(track);
        self.pending.entry(id).or_default().merge(patch);
        true
    }

    /// Apply the same patch to every loaded track sharing `duplicate_key`
    pub fn apply_patch_to_all_by_duplicate_key(
        &mut self,
        duplicate_key: &str,
        patch: &TrackPatch,
    ) -> usize {
        let ids: Vec<Uuid> = self
            .order
            .iter()
            .filter(|id| {
                self.tracks
                    .get(id)
                    .and_then(|track| track.duplicate_key.as_deref())
                    == Some(duplicate_key)
            })
            .copied()
            .collect();

        let mut updated = 0;
        for id in ids {
            if self.apply_patch(id, patch.clone()) {
                updated += 1;
            }
        }
        updated
    }

    /// Update the snapshot only; nothing is queued for the next flush
    pub fn reflect(&mut self, id: Uuid, patch: &TrackPatch) -> bool {
        match self.tracks.get_mut(&id) {
            Some(track) => {
                patch.apply_to(track);
                true
            }
            None => false,
        }
    }

    pub fn pending_patch(&self, id: &Uuid) -> Option<&TrackPatch> {
        self.pending.get(id)
    }

    /// Pending patches in load order
    pub fn pending_patches(&self) -> Vec<(Uuid, TrackPatch)> {
        self.order
            .iter()
            .filter_map(|id| self.pending.get(id).map(|patch| (*id, patch.clone())))
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop the pending patch for `id` once it has been persisted
    pub fn mark_persisted(&mut self, id: &Uuid) {
        self.pending.remove(id);
    }
}
