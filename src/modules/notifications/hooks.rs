/// Post-job side effects run during finalization
///
/// Both are optional and best effort; the worker logs their errors and moves on.
use crate::shared::errors::AppResult;
use async_trait::async_trait;

/// Refresh per-party flags (e.g. "has unpublished works") for every credited party
#[async_trait]
pub trait PartyFlagSync: Send + Sync {
    /// `parties` are distinct credited names across the job's duplicate groups
    async fn sync_party_flags(&self, parties: &[String]) -> AppResult<usize>;
}

/// Recompute outreach scores for artists touched by a job
#[async_trait]
pub trait ContactScoreRecompute: Send + Sync {
    /// `party_ids` are distinct artist identifiers
    async fn recompute_contact_scores(&self, party_ids: &[String]) -> AppResult<usize>;
}
