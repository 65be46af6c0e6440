/// Value objects for jobs domain
use crate::modules::jobs::domain::entities::JobStatus;
use serde::{Deserialize, Serialize};

/// Job status enum matching database type
#[derive(
    diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[ExistingTypePath = "crate::schema::sql_types::EnrichmentJobStatus"]
#[serde(rename_all = "snake_case")]
pub enum JobStatusDb {
    Queued,
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl From<JobStatus> for JobStatusDb {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => JobStatusDb::Queued,
            JobStatus::Running => JobStatusDb::Running,
            JobStatus::Completed => JobStatusDb::Completed,
            JobStatus::CompletedWithErrors => JobStatusDb::CompletedWithErrors,
            JobStatus::Failed => JobStatusDb::Failed,
        }
    }
}

impl From<JobStatusDb> for JobStatus {
    fn from(status: JobStatusDb) -> Self {
        match status {
            JobStatusDb::Queued => JobStatus::Queued,
            JobStatusDb::Running => JobStatus::Running,
            JobStatusDb::Completed => JobStatus::Completed,
            JobStatusDb::CompletedWithErrors => JobStatus::CompletedWithErrors,
            JobStatusDb::Failed => JobStatus::Failed,
        }
    }
}
