/// Job queue with single-active-job admission
///
/// The queue keeps an in-memory cache of non-terminal jobs and writes every
/// transition through to the `JobStore`. Only `enqueue` surfaces store errors;
/// elsewhere a failed write is logged and the cache stays authoritative for
/// this process. Recovery after a crash is `initialize`: anything left
/// `running` is requeued and restarts from its first phase.
use crate::modules::jobs::domain::entities::{
    EnrichmentJob, JobOutcome, JobProgressUpdate, JobStatus, JobUpdate, NewEnrichmentJob,
};
use crate::modules::jobs::domain::repository::{JobStatistics, JobStore};
use crate::modules::notifications::observer::{NoopObserver, ProgressObserver};
use crate::shared::errors::AppResult;
use crate::{log_debug, log_error, log_info, log_warn};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const RECOVERY_LOG_LINE: &str = "Job was interrupted by a restart and has been requeued";

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, EnrichmentJob>,
    active_job: Option<Uuid>,
    /// Terminal outcomes seen by this process
    finished: HashMap<JobStatus, usize>,
}

pub struct JobQueue {
    store: Arc<dyn JobStore>,
    observer: Arc<dyn ProgressObserver>,
    state: Mutex<QueueState>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            observer: Arc::new(NoopObserver),
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Load open jobs and requeue any left `running`. Returns the number requeued.
    pub async fn initialize(&self) -> AppResult<usize> {
        let open = self
            .store
            .get_jobs_by_status(&[JobStatus::Queued, JobStatus::Running])
            .await?;

        let mut state = self.state.lock().await;
        let mut recovered = 0;

        for mut job in open {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Queued;
                job.logs.push(RECOVERY_LOG_LINE.to_string());
                job.updated_at = Utc::now();
                recovered += 1;

                let update = JobUpdate {
                    status: Some(JobStatus::Queued),
                    logs: Some(job.logs.clone()),
                    ..Default::default()
                };
                if let Err(e) = self.store.update_job(job.id, update).await {
                    log_error!("Failed to persist recovery of job {}: {}", job.id, e);
                }
                log_warn!("Recovered interrupted job {}", job.id);
            }
            state.jobs.insert(job.id, job);
        }
        state.active_job = None;

        log_info!(
            "Job queue initialized: {} queued ({} recovered)",
            state.jobs.len(),
            recovered
        );
        Ok(recovered)
    }

    /// Create a queued job. Store errors propagate to the caller.
    pub async fn enqueue(&self, new_job: NewEnrichmentJob) -> AppResult<EnrichmentJob> {
        let job = self.store.create_job(new_job).await?;

        self.state.lock().await.jobs.insert(job.id, job.clone());

        log_info!("Enqueued job {} ({} tracks)", job.id, job.total_tracks);
        self.observer.broadcast(
            "job:queued",
            json!({ "job_id": job.id, "total_tracks": job.total_tracks }),
        );
        Ok(job)
    }

    /// Admit the oldest queued job, or `None` while another job is active
    pub async fn get_next_job(&self) -> Option<EnrichmentJob> {
        let mut state = self.state.lock().await;
        if let Some(active) = state.active_job {
            log_debug!("Job {} is still active, not admitting another", active);
            return None;
        }

        let next_id = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Queued)
            .min_by_key(|job| (job.created_at, job.id))
            .map(|job| job.id)?;

        let job = state.jobs.get_mut(&next_id)?;
        job.status = JobStatus::Running;
        job.updated_at = Utc::now();
        let admitted = job.clone();
        state.active_job = Some(next_id);

        let update = JobUpdate {
            status: Some(JobStatus::Running),
            ..Default::default()
        };
        if let Err(e) = self.store.update_job(next_id, update).await {
            log_error!("Failed to persist start of job {}: {}", next_id, e);
        }
        drop(state);

        log_info!("Starting job {}", admitted.id);
        self.observer.broadcast(
            "job:started",
            json!({ "job_id": admitted.id, "total_tracks": admitted.total_tracks }),
        );
        Some(admitted)
    }

    /// Append log lines and overwrite whichever counters are given
    pub async fn update_job_progress(&self, id: Uuid, update: JobProgressUpdate) {
        let mut state = self.state.lock().await;
        let job = match state.jobs.get_mut(&id) {
            Some(job) => job,
            None => {
                log_warn!("Progress update for unknown job {}", id);
                return;
            }
        };

        if let Some(progress) = update.progress {
            job.progress = progress.clamp(0, 100);
        }
        if let Some(enriched) = update.enriched_count {
            job.enriched_count = enriched;
        }
        if let Some(errors) = update.error_count {
            job.error_count = errors;
        }
        job.logs.extend(update.logs.iter().cloned());
        job.updated_at = Utc::now();

        let write = JobUpdate {
            progress: update.progress.map(|_| job.progress),
            enriched_count: update.enriched_count,
            error_count: update.error_count,
            logs: (!update.logs.is_empty()).then(|| job.logs.clone()),
            ..Default::default()
        };
        let payload = json!({
            "job_id": id,
            "progress": job.progress,
            "enriched_count": job.enriched_count,
            "error_count": job.error_count,
            "logs": update.logs,
        });

        if let Err(e) = self.store.update_job(id, write).await {
            log_error!("Failed to persist progress of job {}: {}", id, e);
        }
        drop(state);

        self.observer.broadcast("job:progress", payload);
    }

    /// Move a job to its terminal status and free the active slot
    pub async fn complete_job(&self, id: Uuid, outcome: JobOutcome, final_logs: Vec<String>) {
        let mut state = self.state.lock().await;
        if state.active_job == Some(id) {
            state.active_job = None;
        }

        let status = outcome.status();
        let now = Utc::now();
        let mut job = match state.jobs.remove(&id) {
            Some(job) => job,
            None => {
                log_warn!("Completion for unknown job {} ({})", id, status);
                return;
            }
        };

        job.status = status;
        if outcome.is_success() {
            job.progress = 100;
        }
        job.logs.extend(final_logs);
        job.completed_at = Some(now);
        job.updated_at = now;
        *state.finished.entry(status).or_insert(0) += 1;

        let write = JobUpdate {
            status: Some(status),
            progress: Some(job.progress),
            enriched_count: Some(job.enriched_count),
            error_count: Some(job.error_count),
            logs: Some(job.logs.clone()),
            completed_at: Some(now),
        };
        if let Err(e) = self.store.update_job(id, write).await {
            log_error!("Failed to persist completion of job {}: {}", id, e);
        }
        drop(state);

        log_info!(
            "Job {} finished as {} ({} enriched, {} errors)",
            id,
            status,
            job.enriched_count,
            job.error_count
        );
        self.observer.broadcast(
            "job:completed",
            json!({
                "job_id": id,
                "status": status,
                "enriched_count": job.enriched_count,
                "error_count": job.error_count,
            }),
        );
    }

    pub async fn get_queue_size(&self) -> usize {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Queued)
            .count()
    }

    pub async fn active_job_id(&self) -> Option<Uuid> {
        self.state.lock().await.active_job
    }

    /// Open jobs come from the cache; finished ones from the store
    pub async fn get_job(&self, id: Uuid) -> AppResult<Option<EnrichmentJob>> {
        if let Some(job) = self.state.lock().await.jobs.get(&id) {
            return Ok(Some(job.clone()));
        }
        self.store.get_job_by_id(id).await
    }

    /// Open jobs plus terminal outcomes recorded since this process started
    pub async fn statistics(&self) -> JobStatistics {
        let state = self.state.lock().await;
        let count_open = |status: JobStatus| {
            state
                .jobs
                .values()
                .filter(|job| job.status == status)
                .count()
        };
        let count_finished = |status: JobStatus| state.finished.get(&status).copied().unwrap_or(0);

        let stats = JobStatistics {
            queued_count: count_open(JobStatus::Queued),
            running_count: count_open(JobStatus::Running),
            completed_count: count_finished(JobStatus::Completed),
            completed_with_errors_count: count_finished(JobStatus::CompletedWithErrors),
            failed_count: count_finished(JobStatus::Failed),
            total_count: 0,
        };
        JobStatistics {
            total_count: stats.queued_count
                + stats.running_count
                + stats.completed_count
                + stats.completed_with_errors_count
                + stats.failed_count,
            ..stats
        }
    }
}
