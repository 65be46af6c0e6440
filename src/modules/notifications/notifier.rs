/// Job outcome notifications
///
/// Delivery is best effort. The worker awaits the call so lines stay ordered in
/// the log, but an error never changes the job's status.
use crate::modules::jobs::domain::JobStatus;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Summary sent when a job reaches a successful terminal status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCompletion {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_tracks: i32,
    pub enriched_count: i32,
    pub error_count: i32,
    /// One line per phase that ran
    pub phase_summaries: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_job_complete(&self, completion: &JobCompletion) -> AppResult<()>;

    async fn notify_job_failed(&self, job_id: Uuid, error: &str) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_job_complete(&self, _completion: &JobCompletion) -> AppResult<()> {
        Ok(())
    }

    async fn notify_job_failed(&self, _job_id: Uuid, _error: &str) -> AppResult<()> {
        Ok(())
    }
}
