/// Test helper functions and service builders
use linernotes_lib::modules::browser::{BrowserQueueConfig, BrowserTaskQueue, SessionLauncher};
use linernotes_lib::modules::enrichment::{EnrichmentWorker, PhasePlan, WorkerConfig};
use linernotes_lib::modules::jobs::{
    EnrichmentJob, InMemoryJobStore, JobQueue, JobStatus, NewEnrichmentJob,
};
use linernotes_lib::modules::tracks::{Track, TrackStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Browser queue with test-friendly timings
pub fn browser_queue(
    launcher: Arc<dyn SessionLauncher>,
    max_concurrent: usize,
    min_delay: Duration,
) -> BrowserTaskQueue {
    browser_queue_with_pool(launcher, max_concurrent, max_concurrent, min_delay)
}

/// Same, with fewer sessions than concurrent task slots allowed
pub fn browser_queue_with_pool(
    launcher: Arc<dyn SessionLauncher>,
    max_concurrent: usize,
    pool_size: usize,
    min_delay: Duration,
) -> BrowserTaskQueue {
    BrowserTaskQueue::new(
        launcher,
        BrowserQueueConfig {
            max_concurrent,
            pool_size,
            min_delay,
            poll_interval: Duration::from_millis(5),
        },
    )
}

pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(20),
        scrape_task_timeout: Duration::from_secs(2),
        shutdown_drain_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

pub struct TestHarness {
    pub jobs: InMemoryJobStore,
    pub queue: Arc<JobQueue>,
    pub worker: EnrichmentWorker,
}

/// Queue + worker over an in-memory job store
pub fn build_harness(
    tracks: Arc<dyn TrackStore>,
    plan: PhasePlan,
    browser: Option<BrowserTaskQueue>,
    config: WorkerConfig,
) -> TestHarness {
    let jobs = InMemoryJobStore::new();
    let queue = Arc::new(JobQueue::new(Arc::new(jobs.clone())));
    let worker = EnrichmentWorker::new(queue.clone(), tracks, plan, browser, config);
    TestHarness {
        jobs,
        queue,
        worker,
    }
}

impl TestHarness {
    pub async fn enqueue_tracks(&self, tracks: &[Track]) -> EnrichmentJob {
        let ids: Vec<Uuid> = tracks.iter().map(|track| track.id).collect();
        self.queue
            .enqueue(NewEnrichmentJob::for_tracks(ids))
            .await
            .expect("enqueue should succeed on the in-memory store")
    }

    /// Process exactly one job and return its stored record
    pub async fn run_one(&self, job_id: Uuid) -> EnrichmentJob {
        let processed = self
            .worker
            .process_next_job()
            .await
            .expect("worker should not error");
        assert!(processed, "expected a job to be processed");

        let job = self.jobs.get(&job_id).expect("job should be stored");
        assert!(job.status.is_terminal(), "job ended as {}", job.status);
        job
    }
}

pub fn has_line(job: &EnrichmentJob, needle: &str) -> bool {
    job.logs.iter().any(|line| line.contains(needle))
}

pub fn line_index(job: &EnrichmentJob, needle: &str) -> Option<usize> {
    job.logs.iter().position(|line| line.contains(needle))
}

pub fn assert_status(job: &EnrichmentJob, expected: JobStatus) {
    assert_eq!(
        job.status, expected,
        "unexpected status; logs:\n{}",
        job.logs.join("\n")
    );
}
