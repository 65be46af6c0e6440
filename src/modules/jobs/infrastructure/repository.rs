/// Diesel-based implementation of JobStore
use crate::modules::jobs::domain::entities::{EnrichmentJob, JobStatus, JobUpdate, NewEnrichmentJob};
use crate::modules::jobs::domain::repository::JobStore;
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::modules::jobs::infrastructure::models::{EnrichmentJobModel, JobChangeset, NewJobModel};
use crate::schema::enrichment_jobs;
use crate::shared::database::Database;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::{LogContext, TimedOperation};
use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

pub struct PgJobStore {
    db: Database,
}

impl PgJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, job: NewEnrichmentJob) -> AppResult<EnrichmentJob> {
        let new_job = NewJobModel::from(&job);
        let mut conn = self.db.get_connection()?;

        let inserted: EnrichmentJobModel = diesel::insert_into(enrichment_jobs::table)
            .values(&new_job)
            .returning(EnrichmentJobModel::as_returning())
            .get_result(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to create job: {}", e)))?;

        inserted.into_job()
    }

    async fn get_jobs_by_status(&self, statuses: &[JobStatus]) -> AppResult<Vec<EnrichmentJob>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let timer = TimedOperation::new("get_jobs_by_status");
        let wanted: Vec<JobStatusDb> = statuses.iter().copied().map(JobStatusDb::from).collect();
        let mut conn = self.db.get_connection()?;

        let rows: Vec<EnrichmentJobModel> = enrichment_jobs::table
            .filter(enrichment_jobs::status.eq_any(wanted))
            .order(enrichment_jobs::created_at.asc())
            .select(EnrichmentJobModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to load jobs: {}", e)))?;
        timer.finish();

        rows.into_iter().map(EnrichmentJobModel::into_job).collect()
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> AppResult<EnrichmentJob> {
        let changeset = JobChangeset::try_from(&update)?;
        let mut conn = self.db.get_connection()?;
        LogContext::db_operation("update", "enrichment_jobs", None);

        let updated: Option<EnrichmentJobModel> = diesel::update(enrichment_jobs::table.find(id))
            .set(&changeset)
            .returning(EnrichmentJobModel::as_returning())
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to update job {}: {}", id, e)))?;

        match updated {
            Some(row) => row.into_job(),
            None => Err(AppError::NotFound(format!("Job {} not found", id))),
        }
    }

    async fn get_job_by_id(&self, id: Uuid) -> AppResult<Option<EnrichmentJob>> {
        let mut conn = self.db.get_connection()?;

        let row: Option<EnrichmentJobModel> = enrichment_jobs::table
            .find(id)
            .select(EnrichmentJobModel::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get job by id: {}", e)))?;

        row.map(EnrichmentJobModel::into_job).transpose()
    }
}
