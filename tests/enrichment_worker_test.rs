/// Enrichment worker tests
///
/// Tests cover:
/// - Phase ordering, progress lines and failure isolation
/// - Terminal status rules (completed / completed_with_errors / failed)
/// - Scrape timeouts, listing scores and target phases
/// - Notifications and post-job hooks
/// - Runtime start, shutdown and recovery
mod utils;

use async_trait::async_trait;
use linernotes_lib::modules::browser::BrowserSession;
use linernotes_lib::modules::enrichment::{
    BatchEnricher, EnrichmentOutcome, PageExtractor, PhaseDefinition, PhaseKind, PhasePlan,
    WorkerConfig, WorkerState,
};
use linernotes_lib::modules::jobs::{
    EnrichmentJob, InMemoryJobStore, JobQueue, JobStatus, NewEnrichmentJob,
};
use linernotes_lib::modules::tracks::{InMemoryTrackStore, Track, TrackPatch};
use linernotes_lib::runtime::EnrichmentRuntime;
use linernotes_lib::shared::errors::{AppError, AppResult};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use utils::factories::TrackFactory;
use utils::fakes::{
    failing_enricher, labelling_enricher, FakeLauncher, FlakyTrackStore, FnEnricher, FnExtractor,
    MockNotifier, RecordingHooks,
};
use utils::helpers::{
    assert_status, browser_queue, build_harness, fast_worker_config, has_line, line_index,
    TestHarness,
};
use uuid::Uuid;

/// Batch enricher that gives every candidate the same patch
fn patching(make: fn() -> TrackPatch) -> Arc<dyn BatchEnricher> {
    FnEnricher::new(move |tracks: &[Track]| {
        Ok(EnrichmentOutcome {
            patches: tracks.iter().map(|track| (track.id, make())).collect(),
            ..Default::default()
        })
    })
}

fn identity_patch() -> TrackPatch {
    TrackPatch {
        artist_mbid: Some("mbid-1".to_string()),
        social_links: Some(vec!["https://social.example/a".to_string()]),
        ..Default::default()
    }
}

fn analytics_patch() -> TrackPatch {
    TrackPatch {
        chartmetric_id: Some("cm-7".to_string()),
        stream_count: Some(25_000),
        ..Default::default()
    }
}

fn rights_patch() -> TrackPatch {
    TrackPatch {
        mlc_song_code: Some("MLC-7".to_string()),
        publishers: Some(vec!["Small Pub".to_string()]),
        ..Default::default()
    }
}

fn credits_patch() -> TrackPatch {
    TrackPatch {
        songwriters: Some(vec!["A. Writer".to_string(), "B. Writer".to_string()]),
        ..Default::default()
    }
}

fn tracks_with_isrc(count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| {
            TrackFactory::new()
                .with_isrc(&format!("GBAYE06{:05}", i))
                .build()
        })
        .collect()
}

async fn wait_for_terminal(jobs: &InMemoryJobStore, id: Uuid) -> EnrichmentJob {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = jobs.get(&id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should finish in time")
}

// ================================================================================================
// PHASE SEQUENCING
// ================================================================================================

#[tokio::test]
async fn failing_phase_does_not_stop_later_phases() {
    let tracks = tracks_with_isrc(2);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Sub Pop")))
        .with_phase(PhaseDefinition::batch(
            PhaseKind::Credits,
            failing_enricher("credits site unreachable"),
        ))
        .with_phase(PhaseDefinition::batch(PhaseKind::Identity, patching(identity_patch)))
        .with_phase(PhaseDefinition::batch(PhaseKind::Analytics, patching(analytics_patch)))
        .with_phase(PhaseDefinition::batch(PhaseKind::Rights, patching(rights_patch)));

    let harness = build_harness(Arc::new(store.clone()), plan, None, fast_worker_config());
    let job = harness.enqueue_tracks(&tracks).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    let expected = [
        "Phase 1/5: Metadata",
        "Metadata: 2 enriched",
        "Phase 2/5: Credits",
        "Credits phase failed: External service error: credits site unreachable",
        "Phase 3/5: Artist identity",
        "Phase 4/5: Streaming analytics",
        "Phase 5/5: Publishing rights",
        "Enrichment finished: 2 of 2 track(s) enriched, 1 error(s)",
    ];
    let positions: Vec<usize> = expected
        .iter()
        .map(|needle| {
            line_index(&job, needle)
                .unwrap_or_else(|| panic!("missing {:?} in {:?}", needle, job.logs))
        })
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "out of order: {:?}", job.logs);

    assert_eq!(job.enriched_count, 2);
    assert_eq!(job.error_count, 1);

    let row = store.get(&tracks[0].id).unwrap();
    assert_eq!(row.label.as_deref(), Some("Sub Pop"));
    assert_eq!(row.mlc_song_code.as_deref(), Some("MLC-7"));
    assert!(row.metadata_enriched_at.is_some());
    assert!(row.credits_scraped_at.is_none());
}

#[tokio::test]
async fn primary_phase_failure_completes_with_errors() {
    let tracks = tracks_with_isrc(1);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(
            PhaseKind::Metadata,
            failing_enricher("catalog API returned 500"),
        ))
        .with_phase(PhaseDefinition::batch(PhaseKind::Identity, patching(identity_patch)));

    let harness = build_harness(Arc::new(store), plan, None, fast_worker_config());
    let job = harness.enqueue_tracks(&tracks).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::CompletedWithErrors);
    assert!(has_line(&job, "Metadata phase failed"));
    assert!(has_line(&job, "Artist identity: 1 enriched"));
    assert_eq!(job.progress, 100);
}

#[tokio::test]
async fn per_track_primary_errors_complete_with_errors() {
    let tracks = tracks_with_isrc(2);
    let broken = tracks[1].id;
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let enricher = FnEnricher::new(move |candidates: &[Track]| {
        Ok(EnrichmentOutcome {
            patches: candidates
                .iter()
                .filter(|track| track.id != broken)
                .map(|track| {
                    (
                        track.id,
                        TrackPatch {
                            album: Some("Debut".to_string()),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            errors: vec![(broken, "malformed response".to_string())],
            ..Default::default()
        })
    });
    let plan = PhasePlan::new().with_phase(PhaseDefinition::batch(PhaseKind::Metadata, enricher));

    let harness = build_harness(Arc::new(store), plan, None, fast_worker_config());
    let job = harness.enqueue_tracks(&tracks).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::CompletedWithErrors);
    assert!(has_line(&job, "Metadata: 1 enriched, 0 not found, 1 failed"));
    assert_eq!(job.enriched_count, 1);
    assert_eq!(job.error_count, 1);
}

#[tokio::test]
async fn already_enriched_tracks_are_skipped() {
    let done = TrackFactory::fully_enriched().build();
    let fresh = TrackFactory::minimal().build();
    let store = InMemoryTrackStore::with_tracks(vec![done.clone(), fresh.clone()]);
    let enricher = FnEnricher::new(|candidates: &[Track]| {
        assert_eq!(candidates.len(), 1);
        Ok(EnrichmentOutcome::default())
    });
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, enricher.clone()));

    let harness = build_harness(Arc::new(store), plan, None, fast_worker_config());
    let job = harness.enqueue_tracks(&[done, fresh]).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert!(has_line(&job, "Metadata: 0 enriched, 1 not found, 0 failed, 1 already done"));
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn target_phase_limits_the_run() {
    let tracks = tracks_with_isrc(1);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let metadata = FnEnricher::new(|_tracks: &[Track]| Ok(EnrichmentOutcome::default()));
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, metadata.clone()))
        .with_phase(PhaseDefinition::batch(PhaseKind::Identity, patching(identity_patch)));

    let harness = build_harness(Arc::new(store.clone()), plan, None, fast_worker_config());
    let job = harness
        .queue
        .enqueue(
            NewEnrichmentJob::for_tracks(vec![tracks[0].id]).only_phase(PhaseKind::Identity),
        )
        .await
        .unwrap();
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert!(has_line(&job, "Phase 1/1: Artist identity"));
    assert!(!has_line(&job, "Metadata"));
    assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.get(&tracks[0].id).unwrap().artist_mbid.as_deref(), Some("mbid-1"));
}

#[tokio::test]
async fn partially_missing_targets_are_logged() {
    let tracks = tracks_with_isrc(1);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")));

    let harness = build_harness(Arc::new(store), plan, None, fast_worker_config());
    let job = harness
        .queue
        .enqueue(NewEnrichmentJob::for_tracks(vec![tracks[0].id, Uuid::new_v4()]))
        .await
        .unwrap();
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert!(has_line(&job, "1 of 2 target tracks not found; continuing with 1"));
    assert!(has_line(&job, "Enrichment finished: 1 of 2 track(s) enriched"));
}

// ================================================================================================
// FAILED JOBS AND NOTIFICATIONS
// ================================================================================================

#[tokio::test]
async fn job_without_loadable_tracks_fails_and_notifies() {
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")));

    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify_job_failed()
        .withf(|_id, error| error.contains("target track(s) exist"))
        .times(1)
        .returning(|_, _| Ok(()));
    notifier.expect_notify_job_complete().times(0);

    let TestHarness { jobs, queue, worker } = build_harness(
        Arc::new(InMemoryTrackStore::new()),
        plan,
        None,
        fast_worker_config(),
    );
    let worker = worker.with_notifier(Arc::new(notifier));

    let job = queue
        .enqueue(NewEnrichmentJob::for_tracks(vec![Uuid::new_v4(), Uuid::new_v4()]))
        .await
        .unwrap();
    assert!(worker.process_next_job().await.unwrap());

    let job = jobs.get(&job.id).unwrap();
    assert_status(&job, JobStatus::Failed);
    assert!(has_line(&job, "Job failed: Not found: None of the 2 target track(s) exist"));
    assert!(job.completed_at.is_some());
    assert_eq!(queue.active_job_id().await, None);
}

#[tokio::test]
async fn completion_is_notified_with_phase_summaries() {
    let tracks = tracks_with_isrc(2);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")))
        .with_phase(PhaseDefinition::batch(PhaseKind::Rights, patching(rights_patch)));

    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify_job_complete()
        .withf(|completion| {
            completion.status == JobStatus::Completed
                && completion.enriched_count == 2
                && completion.total_tracks == 2
                && completion.phase_summaries.len() == 2
        })
        .times(1)
        // Delivery failures never change the job
        .returning(|_| Err(AppError::ExternalServiceError("webhook down".to_string())));
    notifier.expect_notify_job_failed().times(0);

    let TestHarness { jobs, queue, worker } =
        build_harness(Arc::new(store), plan, None, fast_worker_config());
    let worker = worker.with_notifier(Arc::new(notifier));

    let job = queue
        .enqueue(NewEnrichmentJob::for_tracks(tracks.iter().map(|t| t.id).collect()))
        .await
        .unwrap();
    assert!(worker.process_next_job().await.unwrap());

    assert_status(&jobs.get(&job.id).unwrap(), JobStatus::Completed);
}

#[tokio::test]
async fn unsaved_track_counts_as_one_error_and_not_enriched() {
    let track = TrackFactory::new().with_isrc("GBAYE0600001").build();
    let flaky = FlakyTrackStore::new(InMemoryTrackStore::with_tracks(vec![track.clone()]));
    flaky.fail_writes_for(track.id);

    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")))
        .with_phase(PhaseDefinition::batch(PhaseKind::Identity, patching(identity_patch)))
        .with_phase(PhaseDefinition::batch(PhaseKind::Rights, patching(rights_patch)));

    let harness = build_harness(Arc::new(flaky.clone()), plan, None, fast_worker_config());
    let job = harness.enqueue_tracks(&[track.clone()]).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert_eq!(job.error_count, 1);
    assert_eq!(job.enriched_count, 0);
    assert!(has_line(&job, "1 track update(s) could not be saved"));
    assert!(
        has_line(&job, "Enrichment finished: 0 of 1 track(s) enriched, 1 error(s)"),
        "logs: {:?}",
        job.logs
    );
    assert_eq!(flaky.inner.get(&track.id).unwrap().label, None);
}

#[tokio::test]
async fn hooks_receive_distinct_parties_once_per_group() {
    let group = "https://catalog.example/recording/9";
    let first = TrackFactory::new()
        .with_duplicate_key(group)
        .with_songwriters(&["A. Writer"])
        .with_artist_mbid("mbid-a")
        .build();
    let twin = TrackFactory::new()
        .with_duplicate_key(group)
        .with_songwriters(&["A. Writer"])
        .with_artist_mbid("mbid-a")
        .build();
    let other = TrackFactory::new()
        .with_songwriters(&["C. Writer"])
        .with_artist_mbid("mbid-c")
        .build();
    // Nothing left for the job to do on this one
    let untouched = TrackFactory::new()
        .with_songwriters(&["Z. Writer"])
        .with_artist_mbid("mbid-z")
        .metadata_done()
        .build();
    let tracks = vec![first, twin, other, untouched];
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")));

    let hooks = Arc::new(RecordingHooks::default());
    let TestHarness { jobs, queue, worker } =
        build_harness(Arc::new(store), plan, None, fast_worker_config());
    let worker = worker
        .with_flag_sync(hooks.clone())
        .with_contact_scores(hooks.clone());

    let job = queue
        .enqueue(NewEnrichmentJob::for_tracks(tracks.iter().map(|t| t.id).collect()))
        .await
        .unwrap();
    worker.process_next_job().await.unwrap();

    let job = jobs.get(&job.id).unwrap();
    assert_status(&job, JobStatus::Completed);
    assert_eq!(*hooks.flagged.lock().unwrap(), vec!["A. Writer", "C. Writer"]);
    assert_eq!(*hooks.scored.lock().unwrap(), vec!["mbid-a", "mbid-c"]);
    assert!(has_line(&job, "Party flags synced for 2 credited name(s)"));
    assert!(has_line(&job, "Contact scores recomputed for 2 artist(s)"));
}

// ================================================================================================
// SCRAPING
// ================================================================================================

/// Extractor that hangs on one chosen track
struct StallsOn {
    stalled: Uuid,
}

#[async_trait]
impl PageExtractor for StallsOn {
    async fn extract(
        &self,
        session: Arc<dyn BrowserSession>,
        track: Track,
    ) -> AppResult<Option<TrackPatch>> {
        session.load_page("https://credits.example").await?;
        if track.id == self.stalled {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        Ok(Some(credits_patch()))
    }
}

#[tokio::test]
async fn scrape_timeout_fails_only_that_track() {
    let tracks = tracks_with_isrc(2);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new().with_phase(PhaseDefinition::scraped(
        PhaseKind::Credits,
        Arc::new(StallsOn {
            stalled: tracks[1].id,
        }),
    ));
    let config = WorkerConfig {
        scrape_task_timeout: Duration::from_millis(100),
        ..fast_worker_config()
    };
    let browser = browser_queue(FakeLauncher::new(), 2, Duration::ZERO);

    let harness = build_harness(Arc::new(store.clone()), plan, Some(browser), config);
    let job = harness.enqueue_tracks(&tracks).await;
    let job = harness.run_one(job.id).await;

    // Credits is not the primary phase
    assert_status(&job, JobStatus::Completed);
    assert!(has_line(&job, "Credits: 1 enriched, 0 not found, 1 failed"), "{:?}", job.logs);
    assert_eq!(job.error_count, 1);

    assert!(store.get(&tracks[0].id).unwrap().credits_scraped_at.is_some());
    assert!(store.get(&tracks[1].id).unwrap().credits_scraped_at.is_none());
}

#[tokio::test]
async fn listing_scores_follow_the_credits_phase() {
    let tracks = vec![
        TrackFactory::new().with_label("Tiny Records").with_stream_count(5_000).build(),
        TrackFactory::new().with_label("Sony Music").build(),
    ];
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let extractor = FnExtractor::new(|_track: &Track| Ok(Some(credits_patch())));
    let plan = PhasePlan::new().with_phase(PhaseDefinition::scraped(PhaseKind::Credits, extractor.clone()));
    let browser = browser_queue(FakeLauncher::new(), 2, Duration::ZERO);

    let harness = build_harness(Arc::new(store.clone()), plan, Some(browser), fast_worker_config());
    let job = harness.enqueue_tracks(&tracks).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    assert!(has_line(&job, "Listing scores updated for 2 track(s)"));

    let indie = store.get(&tracks[0].id).unwrap().listing_score.unwrap();
    let major = store.get(&tracks[1].id).unwrap().listing_score.unwrap();
    assert!(indie > major, "indie {} vs major {}", indie, major);
}

#[tokio::test]
async fn scraped_phase_without_browser_fails_that_phase() {
    let tracks = tracks_with_isrc(1);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let extractor = FnExtractor::new(|_track: &Track| Ok(Some(credits_patch())));
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")))
        .with_phase(PhaseDefinition::scraped(PhaseKind::Credits, extractor));

    let harness = build_harness(Arc::new(store), plan, None, fast_worker_config());
    let job = harness.enqueue_tracks(&tracks).await;
    let job = harness.run_one(job.id).await;

    assert_status(&job, JobStatus::Completed);
    assert!(has_line(&job, "Credits phase failed: Configuration error"));
}

// ================================================================================================
// RUNTIME
// ================================================================================================

#[tokio::test]
async fn runtime_recovers_and_processes_interrupted_job() {
    let tracks = tracks_with_isrc(1);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let plan = PhasePlan::new()
        .with_phase(PhaseDefinition::batch(PhaseKind::Metadata, labelling_enricher("Warp")));
    let TestHarness { jobs, queue, worker } =
        build_harness(Arc::new(store), plan, None, fast_worker_config());

    let mut interrupted = EnrichmentJob::queued(NewEnrichmentJob::for_tracks(vec![tracks[0].id]));
    interrupted.status = JobStatus::Running;
    jobs.insert(interrupted.clone());

    let runtime = EnrichmentRuntime::start(queue, worker).await.unwrap();
    assert!(runtime.is_running());

    let job = wait_for_terminal(&jobs, interrupted.id).await;
    assert_status(&job, JobStatus::Completed);
    assert!(has_line(&job, "interrupted by a restart"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_mid_job_leaves_it_for_recovery() {
    let tracks = tracks_with_isrc(1);
    let store = InMemoryTrackStore::with_tracks(tracks.clone());
    let extractor = FnExtractor::with_delay(
        |_track: &Track| Ok(Some(credits_patch())),
        Duration::from_secs(5),
    );
    let plan = PhasePlan::new().with_phase(PhaseDefinition::scraped(PhaseKind::Credits, extractor));
    let launcher = FakeLauncher::new();
    let browser = browser_queue(launcher.clone(), 1, Duration::ZERO);
    let config = WorkerConfig {
        scrape_task_timeout: Duration::from_secs(10),
        ..fast_worker_config()
    };
    let TestHarness { jobs, queue, worker } =
        build_harness(Arc::new(store), plan, Some(browser), config);

    let job = queue
        .enqueue(NewEnrichmentJob::for_tracks(vec![tracks[0].id]))
        .await
        .unwrap();
    let runtime = EnrichmentRuntime::start(queue, worker).await.unwrap();

    // Wait until the scrape holds a session
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let running = matches!(runtime.worker().state().await, WorkerState::Running { .. });
            let leased = match runtime.worker().browser() {
                Some(browser) => browser.pool_stats().await.total,
                None => 0,
            };
            if running && leased == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker should start the job");

    runtime.shutdown().await.unwrap();
    assert_eq!(jobs.get(&job.id).unwrap().status, JobStatus::Running);
    assert_eq!(launcher.sessions()[0].close_calls.load(Ordering::SeqCst), 1);

    // Next start requeues it
    let restarted = JobQueue::new(Arc::new(jobs.clone()));
    assert_eq!(restarted.initialize().await.unwrap(), 1);
    assert_eq!(jobs.get(&job.id).unwrap().status, JobStatus::Queued);
}

#[tokio::test]
async fn idle_runtime_shuts_down_cleanly() {
    let TestHarness { queue, worker, .. } = build_harness(
        Arc::new(InMemoryTrackStore::new()),
        PhasePlan::new(),
        None,
        fast_worker_config(),
    );

    let runtime = EnrichmentRuntime::start(queue, worker).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runtime.worker().state().await, WorkerState::Idle);
    runtime.shutdown().await.unwrap();
}
