/// Executes one phase against the staging context
///
/// Candidates are the staged tracks in load order. A track that no longer
/// needs the phase is skipped as done; one missing the phase's prerequisite
/// counts as not found. Every patch a phase produces is applied to its own
/// track in full and its global part to the other staged members of the same
/// duplicate group.
use crate::modules::browser::BrowserTaskQueue;
use crate::modules::enrichment::domain::{
    BatchEnricher, PageExtractor, PhaseKind, PhaseReport, TrackLookup,
};
use crate::modules::enrichment::phases::{PhaseDefinition, PhaseSource};
use crate::modules::quota::{QuotaCheck, QuotaGovernor};
use crate::modules::tracks::domain::{PropagationPolicy, Track, TrackPatch};
use crate::modules::tracks::staging::TrackStagingContext;
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_error, log_info, log_warn};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct PhaseRunner {
    browser: Option<BrowserTaskQueue>,
    scrape_timeout: Duration,
    scrape_priority: i32,
    policy: PropagationPolicy,
}

impl PhaseRunner {
    pub fn new(
        browser: Option<BrowserTaskQueue>,
        scrape_timeout: Duration,
        scrape_priority: i32,
        policy: PropagationPolicy,
    ) -> Self {
        Self {
            browser,
            scrape_timeout,
            scrape_priority,
            policy,
        }
    }

    pub fn browser(&self) -> Option<&BrowserTaskQueue> {
        self.browser.as_ref()
    }

    pub async fn run(
        &self,
        job_id: Uuid,
        phase: &PhaseDefinition,
        staging: &mut TrackStagingContext,
    ) -> AppResult<PhaseReport> {
        let mut report = PhaseReport::default();
        let mut candidates: Vec<Track> = Vec::new();

        for track in staging.get_all_tracks() {
            if !phase.needs_work(track) {
                report.skipped_done += 1;
            } else if !phase.prerequisite_met(track) {
                log_debug!("{} skips track {}: prerequisite missing", phase.kind, track.id);
                report.not_found += 1;
            } else {
                candidates.push(track.clone());
            }
        }

        if candidates.is_empty() {
            return Ok(report);
        }
        log_info!(
            "Job {}: {} phase has {} candidate track(s)",
            job_id,
            phase.kind,
            candidates.len()
        );

        match &phase.source {
            PhaseSource::Batch(enricher) => {
                self.run_batch(phase.kind, enricher.as_ref(), candidates, staging, &mut report)
                    .await?
            }
            PhaseSource::Scraped(extractor) => {
                self.run_scraped(phase.kind, extractor.clone(), candidates, staging, &mut report)
                    .await?
            }
            PhaseSource::Metered { lookup, governor } => {
                self.run_metered(
                    phase,
                    lookup.as_ref(),
                    governor.as_ref(),
                    candidates,
                    staging,
                    &mut report,
                )
                .await
            }
        }

        Ok(report)
    }

    async fn run_batch(
        &self,
        kind: PhaseKind,
        enricher: &dyn BatchEnricher,
        candidates: Vec<Track>,
        staging: &mut TrackStagingContext,
        report: &mut PhaseReport,
    ) -> AppResult<()> {
        let outcome = enricher.enrich(&candidates).await?;
        let wanted: HashSet<Uuid> = candidates.iter().map(|track| track.id).collect();
        let mut settled: HashSet<Uuid> = HashSet::new();

        for (id, error) in outcome.errors {
            if wanted.contains(&id) && settled.insert(id) {
                log_warn!("{} failed for track {}: {}", kind, id, error);
                report.failed += 1;
            }
        }
        for (id, patch) in outcome.patches {
            if !wanted.contains(&id) || settled.contains(&id) {
                log_debug!("{} returned an unexpected patch for track {}", kind, id);
                continue;
            }
            settled.insert(id);
            self.settle(kind, id, Some(patch), staging, report);
        }
        // Explicit not-found and anything the enricher did not mention
        report.not_found += wanted.len() - settled.len();
        Ok(())
    }

    async fn run_scraped(
        &self,
        kind: PhaseKind,
        extractor: Arc<dyn PageExtractor>,
        candidates: Vec<Track>,
        staging: &mut TrackStagingContext,
        report: &mut PhaseReport,
    ) -> AppResult<()> {
        let browser = self.browser.as_ref().ok_or_else(|| {
            AppError::ConfigError(format!("{} phase needs a browser task queue", kind))
        })?;

        let mut handles = Vec::with_capacity(candidates.len());
        for track in candidates {
            let track_id = track.id;
            let extractor = extractor.clone();
            let limit = self.scrape_timeout;

            let handle = browser
                .add_task(
                    format!("{}-{}", kind, track_id),
                    self.scrape_priority,
                    move |session| async move {
                        match tokio::time::timeout(limit, extractor.extract(session, track)).await
                        {
                            Ok(result) => result,
                            Err(_) => Err(AppError::Timeout(format!(
                                "Scraping track {} took longer than {:?}",
                                track_id, limit
                            ))),
                        }
                    },
                )
                .await;
            handles.push(async move { (track_id, handle.await) });
        }

        for (track_id, result) in join_all(handles).await {
            match result {
                Ok(patch) => self.settle(kind, track_id, patch, staging, report),
                Err(e) => {
                    log_warn!("{} failed for track {}: {}", kind, track_id, e);
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn run_metered(
        &self,
        phase: &PhaseDefinition,
        lookup: &dyn TrackLookup,
        governor: &QuotaGovernor,
        candidates: Vec<Track>,
        staging: &mut TrackStagingContext,
        report: &mut PhaseReport,
    ) {
        let kind = phase.kind;
        let units = governor.units_per_call();
        let mut pending = candidates.into_iter();

        while let Some(track) = pending.next() {
            // A duplicate found earlier in this phase may already have filled the row
            if !still_needed(phase, staging, &track) {
                report.skipped_done += 1;
                continue;
            }

            if let QuotaCheck::Exhausted { used } = governor.check(units).await {
                let staged: &TrackStagingContext = staging;
                let (waiting, done): (Vec<Track>, Vec<Track>) = pending
                    .by_ref()
                    .partition(|rest| still_needed(phase, staged, rest));
                let remaining = waiting.len() + 1;
                log_warn!(
                    "{} quota reached ({} of {} safe units used); skipping {} track(s)",
                    governor.source(),
                    used,
                    governor.policy().safe_limit,
                    remaining
                );
                report.skipped_quota += remaining;
                report.skipped_done += done.len();
                break;
            }

            let result = lookup.lookup(&track).await;
            // The call was made, so it is charged whatever it returned
            if let Err(e) = governor.record(units).await {
                log_error!("Failed to record {} quota usage: {}", governor.source(), e);
            }

            match result {
                Ok(patch) => self.settle(kind, track.id, patch, staging, report),
                Err(e) => {
                    log_warn!("{} failed for track {}: {}", kind, track.id, e);
                    report.failed += 1;
                }
            }
        }
    }

    /// Count a per-track result and stage its patch
    fn settle(
        &self,
        kind: PhaseKind,
        id: Uuid,
        patch: Option<TrackPatch>,
        staging: &mut TrackStagingContext,
        report: &mut PhaseReport,
    ) {
        match patch.filter(|patch| !patch.is_empty()) {
            Some(mut patch) => {
                kind.stamp(&mut patch);
                if self.stage(staging, id, patch) {
                    report.enriched += 1;
                    report.enriched_ids.push(id);
                } else {
                    report.not_found += 1;
                }
            }
            None => report.not_found += 1,
        }
    }

    fn stage(&self, staging: &mut TrackStagingContext, id: Uuid, patch: TrackPatch) -> bool {
        let duplicate_key = staging
            .get_track(&id)
            .and_then(|track| track.duplicate_key.clone());
        let global = self.policy.global_part(&patch);

        if !staging.apply_patch(id, patch) {
            return false;
        }
        if let Some(key) = duplicate_key {
            if !global.is_empty() {
                let shared = staging.apply_patch_to_all_by_duplicate_key(&key, &global);
                if shared > 1 {
                    log_debug!("Shared {:?} across {} staged duplicate(s)", global.fields(), shared);
                }
            }
        }
        true
    }
}

/// Whether the staged row still needs the phase
fn still_needed(phase: &PhaseDefinition, staging: &TrackStagingContext, track: &Track) -> bool {
    staging
        .get_track(&track.id)
        .map_or(true, |current| phase.needs_work(current))
}
