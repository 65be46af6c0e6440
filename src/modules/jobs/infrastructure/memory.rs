/// In-process JobStore for single-process deployments and tests
use crate::modules::jobs::domain::entities::{EnrichmentJob, JobStatus, JobUpdate, NewEnrichmentJob};
use crate::modules::jobs::domain::repository::JobStore;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<DashMap<Uuid, EnrichmentJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a record in as-is, e.g. a job left `running` by a previous process
    pub fn insert(&self, job: EnrichmentJob) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: &Uuid) -> Option<EnrichmentJob> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: NewEnrichmentJob) -> AppResult<EnrichmentJob> {
        let record = EnrichmentJob::queued(job);
        self.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_jobs_by_status(&self, statuses: &[JobStatus]) -> AppResult<Vec<EnrichmentJob>> {
        let mut matching: Vec<EnrichmentJob> = self
            .jobs
            .iter()
            .filter(|entry| statuses.contains(&entry.value().status))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|job| job.created_at);
        Ok(matching)
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> AppResult<EnrichmentJob> {
        let mut entry = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
        entry.apply(&update);
        Ok(entry.clone())
    }

    async fn get_job_by_id(&self, id: Uuid) -> AppResult<Option<EnrichmentJob>> {
        Ok(self.get(&id))
    }
}
