/// Repository trait for job persistence
///
/// The queue keeps its own cache and writes through this store after every
/// transition. Implementations: Postgres (Diesel) and in-memory.
use crate::modules::jobs::domain::entities::{EnrichmentJob, JobStatus, JobUpdate, NewEnrichmentJob};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `queued` job and return the stored record
    async fn create_job(&self, job: NewEnrichmentJob) -> AppResult<EnrichmentJob>;

    /// All jobs in any of `statuses`, oldest first
    async fn get_jobs_by_status(&self, statuses: &[JobStatus]) -> AppResult<Vec<EnrichmentJob>>;

    /// Apply a partial update; returns the updated record
    async fn update_job(&self, id: Uuid, update: JobUpdate) -> AppResult<EnrichmentJob>;

    async fn get_job_by_id(&self, id: Uuid) -> AppResult<Option<EnrichmentJob>>;
}

/// Job queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatistics {
    pub queued_count: usize,
    pub running_count: usize,
    pub completed_count: usize,
    pub completed_with_errors_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
}
