/// Enrichment worker
///
/// Polls the job queue on a fixed tick and runs one job at a time through the
/// phase plan. A failing phase is logged and the job moves on to the next
/// one. Staged patches are flushed after every phase attempt. Only a job whose
/// target tracks cannot be loaded at all (or an orchestration error outside
/// the phases) ends `failed`.
use crate::modules::enrichment::config::WorkerConfig;
use crate::modules::enrichment::domain::{PhaseKind, PhaseReport};
use crate::modules::enrichment::flush::{FlushReport, StagingFlusher};
use crate::modules::enrichment::phases::{PhaseDefinition, PhasePlan};
use crate::modules::enrichment::runner::PhaseRunner;
use crate::modules::browser::BrowserTaskQueue;
use crate::modules::jobs::{EnrichmentJob, JobOutcome, JobProgressUpdate, JobQueue};
use crate::modules::notifications::{
    ContactScoreRecompute, JobCompletion, NoopNotifier, NoopObserver, Notifier, PartyFlagSync,
    ProgressObserver,
};
use crate::modules::tracks::domain::{Track, TrackPatch, TrackStore};
use crate::modules::tracks::scoring::ListingScoreCalculator;
use crate::modules::tracks::staging::TrackStagingContext;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::{log_debug, log_error, log_info, log_warn};
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Dequeuing,
    Running { job_id: Uuid, phase: PhaseKind },
    Finalizing { job_id: Uuid },
}

/// What a job's phases produced, carried into finalization
#[derive(Debug, Default)]
struct JobRun {
    summaries: Vec<String>,
    enriched: HashSet<Uuid>,
    errors: usize,
    primary_errors: usize,
    /// Distinct credited names, one pass per duplicate group
    credited_parties: Vec<String>,
    /// Distinct artist identifiers
    party_ids: Vec<String>,
}

pub struct EnrichmentWorker {
    queue: Arc<JobQueue>,
    tracks: Arc<dyn TrackStore>,
    plan: PhasePlan,
    runner: PhaseRunner,
    flusher: StagingFlusher,
    scorer: ListingScoreCalculator,
    config: WorkerConfig,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn ProgressObserver>,
    flag_sync: Option<Arc<dyn PartyFlagSync>>,
    contact_scores: Option<Arc<dyn ContactScoreRecompute>>,
    state: RwLock<WorkerState>,
}

impl EnrichmentWorker {
    pub fn new(
        queue: Arc<JobQueue>,
        tracks: Arc<dyn TrackStore>,
        plan: PhasePlan,
        browser: Option<BrowserTaskQueue>,
        config: WorkerConfig,
    ) -> Self {
        let runner = PhaseRunner::new(
            browser,
            config.scrape_task_timeout,
            config.scrape_task_priority,
            config.propagation.clone(),
        );
        let flusher = StagingFlusher::new(tracks.clone(), config.propagation.clone());

        Self {
            queue,
            tracks,
            plan,
            runner,
            flusher,
            scorer: ListingScoreCalculator::new(),
            config,
            notifier: Arc::new(NoopNotifier),
            observer: Arc::new(NoopObserver),
            flag_sync: None,
            contact_scores: None,
            state: RwLock::new(WorkerState::Idle),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_flag_sync(mut self, flag_sync: Arc<dyn PartyFlagSync>) -> Self {
        self.flag_sync = Some(flag_sync);
        self
    }

    pub fn with_contact_scores(mut self, contact_scores: Arc<dyn ContactScoreRecompute>) -> Self {
        self.contact_scores = Some(contact_scores);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn plan(&self) -> &PhasePlan {
        &self.plan
    }

    pub fn browser(&self) -> Option<&BrowserTaskQueue> {
        self.runner.browser()
    }

    pub async fn state(&self) -> WorkerState {
        self.state.read().await.clone()
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
    }

    /// Run until `shutdown` is cancelled. A job in progress at that point is
    /// abandoned as `running` and recovered on the next start.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        log_info!(
            "Enrichment worker started ({} phase(s), polling every {:?})",
            self.plan.len(),
            self.config.poll_interval
        );

        loop {
            let processed = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                processed = self.process_next_job() => processed,
            };

            match processed {
                // Go straight for the next job
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => log_error!("Error in worker loop: {}", e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        self.set_state(WorkerState::Idle).await;
        log_info!("Enrichment worker stopped");
    }

    /// Process the next queued job. Returns true if a job ran.
    pub async fn process_next_job(&self) -> AppResult<bool> {
        self.set_state(WorkerState::Dequeuing).await;
        let job = match self.queue.get_next_job().await {
            Some(job) => job,
            None => {
                self.set_state(WorkerState::Idle).await;
                return Ok(false);
            }
        };

        let timer = TimedOperation::new("enrichment_job");
        let result = AssertUnwindSafe(self.execute_job(&job)).catch_unwind().await;

        self.set_state(WorkerState::Finalizing { job_id: job.id }).await;
        match result {
            Ok(Ok(run)) => self.finish_job(&job, run).await,
            Ok(Err(e)) => self.fail_job(&job, &e.to_string()).await,
            Err(_) => {
                self.fail_job(&job, "orchestration panicked").await;
            }
        }
        timer.finish_with_info(&format!("job {}", job.id));

        self.set_state(WorkerState::Idle).await;
        Ok(true)
    }

    async fn execute_job(&self, job: &EnrichmentJob) -> AppResult<JobRun> {
        let loaded = self.tracks.get_tracks_by_ids(&job.target_track_ids).await?;
        if loaded.is_empty() {
            return Err(AppError::NotFound(format!(
                "None of the {} target track(s) exist",
                job.target_track_ids.len()
            )));
        }
        if loaded.len() < job.target_track_ids.len() {
            self.queue
                .update_job_progress(
                    job.id,
                    JobProgressUpdate::log(format!(
                        "{} of {} target tracks not found; continuing with {}",
                        job.target_track_ids.len() - loaded.len(),
                        job.target_track_ids.len(),
                        loaded.len()
                    )),
                )
                .await;
        }

        let mut staging = TrackStagingContext::new(loaded);
        let phases = self.plan.phases_for(job.target_phase);
        let mut run = JobRun::default();

        if phases.is_empty() {
            self.queue
                .update_job_progress(job.id, JobProgressUpdate::log("No phases to run"))
                .await;
        }

        let total = phases.len();
        for (index, phase) in phases.into_iter().enumerate() {
            self.run_phase(job, index, total, phase, &mut staging, &mut run)
                .await;
        }

        // Whatever is still staged gets one more attempt before finalizing
        let mut unsaved: HashSet<Uuid> = HashSet::new();
        if staging.has_pending() {
            let report = self.flusher.flush(&mut staging).await;
            unsaved.extend(report.failed_ids.iter().copied());
            if !unsaved.is_empty() {
                self.queue
                    .update_job_progress(
                        job.id,
                        JobProgressUpdate::log(format!(
                            "{} track update(s) could not be saved",
                            unsaved.len()
                        )),
                    )
                    .await;
            }
        }
        // A track whose patch never reached the store was not enriched
        run.errors += unsaved.len();
        run.enriched.retain(|id| !unsaved.contains(id));

        collect_parties(&staging, &mut run);
        Ok(run)
    }

    async fn run_phase(
        &self,
        job: &EnrichmentJob,
        index: usize,
        total: usize,
        phase: &PhaseDefinition,
        staging: &mut TrackStagingContext,
        run: &mut JobRun,
    ) {
        let kind = phase.kind;
        self.set_state(WorkerState::Running {
            job_id: job.id,
            phase: kind,
        })
        .await;

        self.queue
            .update_job_progress(
                job.id,
                JobProgressUpdate::log(format!("Phase {}/{}: {}", index + 1, total, kind.label()))
                    .with_progress((index * 100 / total) as i32),
            )
            .await;
        self.observer.broadcast(
            "phase:started",
            json!({ "job_id": job.id, "phase": kind, "index": index + 1, "total": total }),
        );

        let timer = TimedOperation::new(&format!("phase_{}", kind));
        let outcome = AssertUnwindSafe(self.runner.run(job.id, phase, staging))
            .catch_unwind()
            .await;
        let flush = self.flusher.flush(staging).await;

        let mut lines = Vec::new();
        match outcome {
            Ok(Ok(report)) => {
                if kind == PhaseKind::Credits {
                    if let Some(line) = self.recompute_listing_scores(staging).await {
                        lines.push(line);
                    }
                }
                let summary = report.summary(kind);
                LogContext::phase_result(&job.id.to_string(), kind.as_str(), &summary);
                self.record_report(kind, &report, run);
                run.summaries.push(summary.clone());
                lines.push(summary);
            }
            Ok(Err(e)) => lines.push(self.record_phase_failure(job.id, kind, &e.to_string(), run)),
            Err(_) => lines.push(self.record_phase_failure(job.id, kind, "phase panicked", run)),
        }
        if let Some(line) = flush_line(&flush) {
            lines.push(line);
        }
        timer.finish();

        // Unsaved patches are retried later, so they only count once the job ends
        let unsaved: HashSet<Uuid> = flush.failed_ids.iter().copied().collect();
        let saved = run.enriched.iter().filter(|id| !unsaved.contains(id)).count();

        self.queue
            .update_job_progress(
                job.id,
                JobProgressUpdate {
                    logs: lines,
                    ..Default::default()
                }
                .with_progress(((index + 1) * 100 / total) as i32)
                .with_counts(saved as i32, (run.errors + unsaved.len()) as i32),
            )
            .await;
        self.observer.broadcast(
            "phase:completed",
            json!({ "job_id": job.id, "phase": kind, "index": index + 1, "total": total }),
        );
    }

    fn record_report(&self, kind: PhaseKind, report: &PhaseReport, run: &mut JobRun) {
        run.enriched.extend(report.enriched_ids.iter().copied());
        run.errors += report.failed;
        if kind.is_primary() {
            run.primary_errors += report.failed;
        }
    }

    fn record_phase_failure(
        &self,
        job_id: Uuid,
        kind: PhaseKind,
        error: &str,
        run: &mut JobRun,
    ) -> String {
        log_error!("Job {}: {} phase failed: {}", job_id, kind, error);
        run.errors += 1;
        if kind.is_primary() {
            run.primary_errors += 1;
        }
        let line = format!("{} phase failed: {}", kind.label(), error);
        run.summaries.push(line.clone());
        line
    }

    /// Recompute listing scores from staged credits and write them straight to
    /// the store. Scores are per-row, so nothing is shared with duplicates.
    async fn recompute_listing_scores(&self, staging: &mut TrackStagingContext) -> Option<String> {
        let changes: Vec<(Uuid, i32)> = staging
            .get_all_tracks()
            .into_iter()
            .filter_map(|track| {
                let score = self.scorer.calculate(track)?;
                (track.listing_score != Some(score)).then_some((track.id, score))
            })
            .collect();
        if changes.is_empty() {
            return None;
        }

        let mut updated = 0;
        let mut failed = 0;
        for (id, score) in changes {
            let patch = TrackPatch {
                listing_score: Some(score),
                ..Default::default()
            };
            match self.tracks.update_track_metadata(id, &patch).await {
                Ok(()) => {
                    staging.reflect(id, &patch);
                    updated += 1;
                }
                Err(e) => {
                    log_error!("Failed to save listing score for track {}: {}", id, e);
                    failed += 1;
                }
            }
        }

        log_debug!("Listing scores recomputed: {} saved, {} failed", updated, failed);
        Some(if failed == 0 {
            format!("Listing scores updated for {} track(s)", updated)
        } else {
            format!(
                "Listing scores updated for {} track(s), {} failed to save",
                updated, failed
            )
        })
    }

    async fn finish_job(&self, job: &EnrichmentJob, run: JobRun) {
        let outcome = if run.primary_errors == 0 {
            JobOutcome::Completed
        } else {
            JobOutcome::CompletedWithErrors
        };

        let mut final_logs = Vec::new();
        final_logs.extend(self.sync_party_flags(&run).await);
        final_logs.extend(self.recompute_contact_scores(&run).await);
        final_logs.push(format!(
            "Enrichment finished: {} of {} track(s) enriched, {} error(s)",
            run.enriched.len(),
            job.total_tracks,
            run.errors
        ));

        self.queue
            .update_job_progress(
                job.id,
                JobProgressUpdate::default()
                    .with_counts(run.enriched.len() as i32, run.errors as i32),
            )
            .await;
        self.queue.complete_job(job.id, outcome, final_logs).await;

        let completion = JobCompletion {
            job_id: job.id,
            status: outcome.status(),
            total_tracks: job.total_tracks,
            enriched_count: run.enriched.len() as i32,
            error_count: run.errors as i32,
            phase_summaries: run.summaries,
        };
        if let Err(e) = self.notifier.notify_job_complete(&completion).await {
            log_warn!("Completion notification for job {} failed: {}", job.id, e);
        }
    }

    async fn fail_job(&self, job: &EnrichmentJob, error: &str) {
        log_error!("Job {} failed: {}", job.id, error);
        self.queue
            .complete_job(
                job.id,
                JobOutcome::Failed,
                vec![format!("Job failed: {}", error)],
            )
            .await;

        if let Err(e) = self.notifier.notify_job_failed(job.id, error).await {
            log_warn!("Failure notification for job {} failed: {}", job.id, e);
        }
    }

    async fn sync_party_flags(&self, run: &JobRun) -> Option<String> {
        let flag_sync = self.flag_sync.as_ref()?;
        if run.credited_parties.is_empty() {
            return None;
        }
        match flag_sync.sync_party_flags(&run.credited_parties).await {
            Ok(count) => Some(format!("Party flags synced for {} credited name(s)", count)),
            Err(e) => {
                log_warn!("Party flag sync failed: {}", e);
                Some(format!("Party flag sync failed: {}", e))
            }
        }
    }

    async fn recompute_contact_scores(&self, run: &JobRun) -> Option<String> {
        let contact_scores = self.contact_scores.as_ref()?;
        if run.party_ids.is_empty() {
            return None;
        }
        match contact_scores.recompute_contact_scores(&run.party_ids).await {
            Ok(count) => Some(format!("Contact scores recomputed for {} artist(s)", count)),
            Err(e) => {
                log_warn!("Contact score recompute failed: {}", e);
                Some(format!("Contact score recompute failed: {}", e))
            }
        }
    }
}

fn flush_line(flush: &FlushReport) -> Option<String> {
    if flush.is_clean() {
        return None;
    }
    let mut line = String::new();
    if !flush.failed_ids.is_empty() {
        line.push_str(&format!(
            "{} track update(s) failed to save and will be retried",
            flush.failed_ids.len()
        ));
    }
    if flush.propagation_failures > 0 {
        if !line.is_empty() {
            line.push_str("; ");
        }
        line.push_str(&format!(
            "{} duplicate update(s) failed",
            flush.propagation_failures
        ));
    }
    Some(line)
}

/// Gather distinct parties from the tracks this job enriched, once per
/// duplicate group
fn collect_parties(staging: &TrackStagingContext, run: &mut JobRun) {
    let staged = staging.get_all_tracks();
    let touched: HashSet<String> = staged
        .iter()
        .filter(|track| run.enriched.contains(&track.id))
        .map(|track| group_of(track))
        .collect();

    let mut seen_groups: HashSet<String> = HashSet::new();
    let mut parties: HashSet<String> = HashSet::new();
    let mut party_ids: HashSet<String> = HashSet::new();

    for track in staged {
        let group = group_of(track);
        if !touched.contains(&group) || !seen_groups.insert(group) {
            continue;
        }
        for party in track.credited_parties() {
            if parties.insert(party.clone()) {
                run.credited_parties.push(party);
            }
        }
        if let Some(mbid) = &track.artist_mbid {
            if party_ids.insert(mbid.clone()) {
                run.party_ids.push(mbid.clone());
            }
        }
    }
}

fn group_of(track: &Track) -> String {
    track
        .duplicate_key
        .clone()
        .unwrap_or_else(|| track.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parties_are_collected_once_per_duplicate_group() {
        let mut first = Track::new("Song", "Artist");
        first.duplicate_key = Some("rec-1".to_string());
        first.songwriters = vec!["A. Writer".to_string()];
        first.artist_mbid = Some("mbid-1".to_string());

        let mut twin = first.clone();
        twin.id = Uuid::new_v4();
        twin.songwriters = vec!["Someone Else".to_string()];

        let mut other = Track::new("Other", "Artist");
        other.producers = vec!["A. Writer".to_string(), "P. Roducer".to_string()];
        other.artist_mbid = Some("mbid-1".to_string());

        let mut run = JobRun::default();
        run.enriched.extend([twin.id, other.id]);
        let staging = TrackStagingContext::new(vec![first, twin, other]);
        collect_parties(&staging, &mut run);

        assert_eq!(run.credited_parties, vec!["A. Writer", "P. Roducer"]);
        assert_eq!(run.party_ids, vec!["mbid-1"]);
    }

    #[test]
    fn untouched_tracks_contribute_no_parties() {
        let mut touched = Track::new("Song", "Artist");
        touched.songwriters = vec!["A. Writer".to_string()];
        touched.artist_mbid = Some("mbid-a".to_string());

        let mut untouched = Track::new("Old", "Artist");
        untouched.songwriters = vec!["Z. Writer".to_string()];
        untouched.artist_mbid = Some("mbid-z".to_string());

        let mut run = JobRun::default();
        run.enriched.insert(touched.id);
        let staging = TrackStagingContext::new(vec![touched, untouched]);
        collect_parties(&staging, &mut run);

        assert_eq!(run.credited_parties, vec!["A. Writer"]);
        assert_eq!(run.party_ids, vec!["mbid-a"]);
    }

    #[test]
    fn clean_flush_adds_no_log_line() {
        assert_eq!(flush_line(&FlushReport::default()), None);

        let line = flush_line(&FlushReport {
            failed_ids: vec![Uuid::new_v4()],
            propagation_failures: 2,
            ..Default::default()
        })
        .unwrap();
        assert!(line.contains("1 track update(s) failed"));
        assert!(line.contains("2 duplicate update(s) failed"));
    }
}
