/// Persistence of staged patches
///
/// Runs after every phase attempt. Persisted patches leave the staging
/// context; failed ones stay and are retried by the next flush. A second pass
/// copies the global part of each persisted patch onto duplicates that are
/// not part of the job. Listing-specific fields never leave their row.
use crate::modules::tracks::domain::{PropagationPolicy, TrackPatch, TrackStore};
use crate::modules::tracks::staging::TrackStagingContext;
use crate::shared::utils::logger::TimedOperation;
use crate::{log_debug, log_error, log_warn};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub persisted: usize,
    pub failed_ids: Vec<Uuid>,
    /// Out-of-job duplicate rows updated
    pub propagated: usize,
    pub propagation_failures: usize,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed_ids.is_empty() && self.propagation_failures == 0
    }
}

pub struct StagingFlusher {
    store: Arc<dyn TrackStore>,
    policy: PropagationPolicy,
}

impl StagingFlusher {
    pub fn new(store: Arc<dyn TrackStore>, policy: PropagationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &PropagationPolicy {
        &self.policy
    }

    pub async fn flush(&self, staging: &mut TrackStagingContext) -> FlushReport {
        let pending = staging.pending_patches();
        if pending.is_empty() {
            return FlushReport::default();
        }
        let timer = TimedOperation::new("flush_staged_patches");
        let mut report = FlushReport::default();

        let failed: HashSet<Uuid> = match self.store.batch_update_track_metadata(&pending).await {
            Ok(result) => result.failed_ids.into_iter().collect(),
            Err(e) => {
                let ids: Vec<Uuid> = pending.iter().map(|(id, _)| *id).collect();
                log_error!("Batch update of {} track(s) failed: {} ({:?})", ids.len(), e, ids);
                report.failed_ids = ids;
                timer.finish();
                return report;
            }
        };

        let mut persisted: Vec<(Uuid, TrackPatch)> = Vec::with_capacity(pending.len());
        for (id, patch) in pending {
            if failed.contains(&id) {
                report.failed_ids.push(id);
            } else {
                staging.mark_persisted(&id);
                persisted.push((id, patch));
            }
        }
        report.persisted = persisted.len();
        if !report.failed_ids.is_empty() {
            log_warn!(
                "{} staged patch(es) kept for retry: {:?}",
                report.failed_ids.len(),
                report.failed_ids
            );
        }

        self.propagate(staging, &persisted, &mut report).await;
        timer.finish_with_info(&format!(
            "{} persisted, {} failed, {} propagated",
            report.persisted,
            report.failed_ids.len(),
            report.propagated
        ));
        report
    }

    /// Copy global fields to duplicates that this job did not load
    async fn propagate(
        &self,
        staging: &TrackStagingContext,
        persisted: &[(Uuid, TrackPatch)],
        report: &mut FlushReport,
    ) {
        // One merged global patch per duplicate key, in load order
        let mut groups: Vec<(String, TrackPatch)> = Vec::new();
        for (id, patch) in persisted {
            let Some(key) = staging
                .get_track(id)
                .and_then(|track| track.duplicate_key.clone())
            else {
                continue;
            };
            let global = self.policy.global_part(patch);
            if global.is_empty() {
                continue;
            }
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, merged)) => merged.merge(global),
                None => groups.push((key, global)),
            }
        }

        for (key, global) in groups {
            let siblings = match self.store.get_tracks_by_duplicate_key(&key).await {
                Ok(siblings) => siblings,
                Err(e) => {
                    log_error!("Could not load duplicates for {}: {}", key, e);
                    report.propagation_failures += 1;
                    continue;
                }
            };

            for sibling in siblings.iter().filter(|track| !staging.contains(&track.id)) {
                match self.store.update_track_metadata(sibling.id, &global).await {
                    Ok(()) => report.propagated += 1,
                    Err(e) => {
                        log_error!(
                            "Failed to propagate {:?} to duplicate {}: {}",
                            global.fields(),
                            sibling.id,
                            e
                        );
                        report.propagation_failures += 1;
                    }
                }
            }
            log_debug!("Propagated group {} ({:?})", key, global.fields());
        }
    }
}
