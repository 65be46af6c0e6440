/// Domain entities for enrichment jobs
///
/// A job names the tracks to enrich and, optionally, a single phase to run.
/// Its status, progress counters and append-only log are the only channel
/// through which users see what happened.
use crate::modules::enrichment::domain::PhaseKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::CompletedWithErrors | JobStatus::Failed
        )
    }

    /// Terminal statuses that count as a finished run
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::CompletedWithErrors)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "completed_with_errors" => Ok(JobStatus::CompletedWithErrors),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// How a job ended; maps onto the terminal statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    CompletedWithErrors,
    Failed,
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed => JobStatus::Completed,
            JobOutcome::CompletedWithErrors => JobStatus::CompletedWithErrors,
            JobOutcome::Failed => JobStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

/// New job to be queued (before insertion into the store)
#[derive(Debug, Clone, PartialEq)]
pub struct NewEnrichmentJob {
    pub target_track_ids: Vec<Uuid>,
    pub target_phase: Option<PhaseKind>,
}

impl NewEnrichmentJob {
    pub fn for_tracks(track_ids: Vec<Uuid>) -> Self {
        Self {
            target_track_ids: track_ids,
            target_phase: None,
        }
    }

    /// Restrict the job to a single phase
    pub fn only_phase(mut self, phase: PhaseKind) -> Self {
        self.target_phase = Some(phase);
        self
    }
}

/// Job record as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentJob {
    pub id: Uuid,
    pub target_track_ids: Vec<Uuid>,
    pub status: JobStatus,
    pub progress: i32,
    pub total_tracks: i32,
    pub enriched_count: i32,
    pub error_count: i32,
    pub logs: Vec<String>,
    pub target_phase: Option<PhaseKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnrichmentJob {
    /// Build a fresh queued record; stores that generate their own ids may ignore `id`
    pub fn queued(new_job: NewEnrichmentJob) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            total_tracks: new_job.target_track_ids.len() as i32,
            target_track_ids: new_job.target_track_ids,
            status: JobStatus::Queued,
            progress: 0,
            enriched_count: 0,
            error_count: 0,
            logs: Vec::new(),
            target_phase: new_job.target_phase,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Apply a store-level partial update to this record
    pub fn apply(&mut self, update: &JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(enriched) = update.enriched_count {
            self.enriched_count = enriched;
        }
        if let Some(errors) = update.error_count {
            self.error_count = errors;
        }
        if let Some(logs) = &update.logs {
            self.logs = logs.clone();
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
        self.updated_at = Utc::now();
    }
}

/// Progress report from the worker; `logs` are appended, the rest overwrite
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobProgressUpdate {
    pub progress: Option<i32>,
    pub enriched_count: Option<i32>,
    pub error_count: Option<i32>,
    pub logs: Vec<String>,
}

impl JobProgressUpdate {
    pub fn log(line: impl Into<String>) -> Self {
        Self {
            logs: vec![line.into()],
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: i32) -> Self {
        self.progress = Some(progress.clamp(0, 100));
        self
    }

    pub fn with_counts(mut self, enriched: i32, errors: i32) -> Self {
        self.enriched_count = Some(enriched);
        self.error_count = Some(errors);
        self
    }
}

/// Partial write to the job store. `logs` carries the full log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i32>,
    pub enriched_count: Option<i32>,
    pub error_count: Option<i32>,
    pub logs: Option<Vec<String>>,
    pub completed_at: Option<DateTime<Utc>>,
}
