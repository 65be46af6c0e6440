/// Diesel models for the enrichment_jobs table
use crate::modules::enrichment::domain::PhaseKind;
use crate::modules::jobs::domain::entities::{EnrichmentJob, JobUpdate, NewEnrichmentJob};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::schema::enrichment_jobs;
use crate::shared::errors::{AppError, AppResult};
use crate::log_warn;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Diesel model for inserting new jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = enrichment_jobs)]
pub struct NewJobModel {
    pub target_track_ids: Vec<Uuid>,
    pub status: JobStatusDb,
    pub progress: i32,
    pub total_tracks: i32,
    pub logs: JsonValue,
    pub target_phase: Option<String>,
}

impl From<&NewEnrichmentJob> for NewJobModel {
    fn from(job: &NewEnrichmentJob) -> Self {
        Self {
            target_track_ids: job.target_track_ids.clone(),
            status: JobStatusDb::Queued,
            progress: 0,
            total_tracks: job.target_track_ids.len() as i32,
            logs: JsonValue::Array(Vec::new()),
            target_phase: job.target_phase.map(|phase| phase.as_str().to_string()),
        }
    }
}

/// Diesel model for querying existing jobs
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = enrichment_jobs)]
pub struct EnrichmentJobModel {
    pub id: Uuid,
    pub target_track_ids: Vec<Uuid>,
    pub status: JobStatusDb,
    pub progress: i32,
    pub total_tracks: i32,
    pub enriched_count: i32,
    pub error_count: i32,
    pub logs: JsonValue,
    pub target_phase: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnrichmentJobModel {
    /// Convert to domain EnrichmentJob
    pub fn into_job(self) -> AppResult<EnrichmentJob> {
        let logs: Vec<String> = serde_json::from_value(self.logs).map_err(|e| {
            AppError::SerializationError(format!("Malformed logs on job {}: {}", self.id, e))
        })?;

        // An unknown phase name widens the job to all phases rather than dropping it
        let target_phase = match self.target_phase.as_deref() {
            Some(name) => match name.parse::<PhaseKind>() {
                Ok(phase) => Some(phase),
                Err(e) => {
                    log_warn!("Job {} has unknown target phase: {}", self.id, e);
                    None
                }
            },
            None => None,
        };

        Ok(EnrichmentJob {
            id: self.id,
            target_track_ids: self.target_track_ids,
            status: self.status.into(),
            progress: self.progress,
            total_tracks: self.total_tracks,
            enriched_count: self.enriched_count,
            error_count: self.error_count,
            logs,
            target_phase,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

/// Partial update; `None` leaves the column untouched
#[derive(AsChangeset, Debug)]
#[diesel(table_name = enrichment_jobs)]
pub struct JobChangeset {
    pub status: Option<JobStatusDb>,
    pub progress: Option<i32>,
    pub enriched_count: Option<i32>,
    pub error_count: Option<i32>,
    pub logs: Option<JsonValue>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&JobUpdate> for JobChangeset {
    type Error = AppError;

    fn try_from(update: &JobUpdate) -> Result<Self, Self::Error> {
        let logs = match &update.logs {
            Some(lines) => Some(serde_json::to_value(lines)?),
            None => None,
        };

        Ok(Self {
            status: update.status.map(JobStatusDb::from),
            progress: update.progress,
            enriched_count: update.enriched_count,
            error_count: update.error_count,
            logs,
            completed_at: update.completed_at,
            updated_at: Utc::now(),
        })
    }
}
