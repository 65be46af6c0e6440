/// Process-level assembly of the enrichment core
///
/// `run` is the process entry point: logging, configuration, stores, browser
/// queue, notifier and worker, then a wait for Ctrl-C. Provider adapters are
/// supplied by the embedding binary through the phase plan builder.
/// `EnrichmentRuntime::start` recovers interrupted jobs and spawns the worker
/// loop. `shutdown` stops the loop, gives in-flight browser tasks a bounded
/// window to finish and then tears the session pool down. A job that was
/// running stays `running` in the store and is requeued on the next start.
use crate::modules::browser::{BrowserQueueConfig, BrowserTaskQueue};
use crate::modules::enrichment::{EnrichmentWorker, PhasePlan};
use crate::modules::jobs::{InMemoryJobStore, JobQueue, JobStore, PgJobStore};
use crate::modules::notifications::{NoopNotifier, Notifier, WebhookNotifier};
use crate::modules::quota::{
    InMemoryQuotaStore, PgQuotaStore, QuotaGovernor, QuotaPolicy, QuotaStore,
};
use crate::modules::tracks::{InMemoryTrackStore, PgTrackStore, TrackStore};
use crate::shared::config::{AppConfig, NotificationConfig};
use crate::shared::database::Database;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::init_logger;
use crate::{log_error, log_info, log_warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

/// The three stores the core reads and writes
#[derive(Clone)]
pub struct Stores {
    pub backend: StoreBackend,
    pub jobs: Arc<dyn JobStore>,
    pub tracks: Arc<dyn TrackStore>,
    pub quota: Arc<dyn QuotaStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            jobs: Arc::new(InMemoryJobStore::new()),
            tracks: Arc::new(InMemoryTrackStore::new()),
            quota: Arc::new(InMemoryQuotaStore::new()),
        }
    }

    pub fn postgres(db: &Database) -> Self {
        Self {
            backend: StoreBackend::Postgres,
            jobs: Arc::new(PgJobStore::new(db.clone())),
            tracks: Arc::new(PgTrackStore::new(db.clone())),
            quota: Arc::new(PgQuotaStore::new(db.clone())),
        }
    }

    /// Governor over this process's quota counters
    pub fn quota_governor(&self, policy: &QuotaPolicy) -> Arc<QuotaGovernor> {
        Arc::new(QuotaGovernor::new(self.quota.clone(), policy.clone()))
    }

    /// Postgres when `DATABASE_URL` is set (migrations are applied first),
    /// in-memory otherwise
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        match &config.database_url {
            Some(url) => {
                let db = Database::connect(url)?;
                let applied = db.run_migrations()?;
                log_info!("Database ready ({} migration(s) applied)", applied);
                Ok(Self::postgres(&db))
            }
            None => {
                log_warn!("DATABASE_URL not set; jobs and tracks live in memory only");
                Ok(Self::in_memory())
            }
        }
    }
}

pub fn notifier_from_config(config: &NotificationConfig) -> AppResult<Arc<dyn Notifier>> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.requests_per_second,
        )?)),
        None => Ok(Arc::new(NoopNotifier)),
    }
}

/// Browser queue backed by headless Chromium
#[cfg(feature = "chromium")]
pub fn browser_from_config(config: &BrowserQueueConfig) -> Option<BrowserTaskQueue> {
    use crate::modules::browser::ChromiumLauncher;

    Some(BrowserTaskQueue::new(
        Arc::new(ChromiumLauncher::default()),
        config.clone(),
    ))
}

#[cfg(not(feature = "chromium"))]
pub fn browser_from_config(_config: &BrowserQueueConfig) -> Option<BrowserTaskQueue> {
    log_warn!("Built without the chromium feature; scraped phases will fail");
    None
}

/// Run the enrichment core until Ctrl-C
///
/// `build_plan` receives the loaded configuration and stores so it can wire
/// provider adapters and quota governors into the phase plan.
pub async fn run<F>(build_plan: F) -> AppResult<()>
where
    F: FnOnce(&AppConfig, &Stores) -> AppResult<PhasePlan>,
{
    init_logger();
    let config = AppConfig::from_env()?;
    let stores = Stores::from_config(&config)?;
    let plan = build_plan(&config, &stores)?;
    let browser = browser_from_config(&config.browser);

    let runtime = EnrichmentRuntime::assemble(&config, &stores, plan, browser).await?;

    tokio::signal::ctrl_c().await.map_err(|e| {
        AppError::InternalError(format!("Failed to listen for shutdown signal: {}", e))
    })?;
    runtime.shutdown().await
}

pub struct EnrichmentRuntime {
    queue: Arc<JobQueue>,
    worker: Arc<EnrichmentWorker>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl EnrichmentRuntime {
    /// Build the queue and worker from configuration, then start
    pub async fn assemble(
        config: &AppConfig,
        stores: &Stores,
        plan: PhasePlan,
        browser: Option<BrowserTaskQueue>,
    ) -> AppResult<Self> {
        let queue = Arc::new(JobQueue::new(stores.jobs.clone()));
        let worker = EnrichmentWorker::new(
            queue.clone(),
            stores.tracks.clone(),
            plan,
            browser,
            config.worker.clone(),
        )
        .with_notifier(notifier_from_config(&config.notifications)?);

        Self::start(queue, worker).await
    }

    /// Recover interrupted jobs, then start polling
    pub async fn start(queue: Arc<JobQueue>, worker: EnrichmentWorker) -> AppResult<Self> {
        let recovered = queue.initialize().await?;
        if recovered > 0 {
            log_warn!("Requeued {} job(s) interrupted by the last shutdown", recovered);
        }

        let worker = Arc::new(worker);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.clone().run(shutdown.child_token()));
        log_info!("Enrichment runtime started");

        Ok(Self {
            queue,
            worker,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn worker(&self) -> &Arc<EnrichmentWorker> {
        &self.worker
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the worker, drain browser work for up to `drain_timeout`, close the pool
    pub async fn shutdown(mut self) -> AppResult<()> {
        log_info!("Enrichment runtime shutting down");
        self.shutdown.cancel();

        let joined = match self.handle.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        };

        let drain_timeout: Duration = self.worker.config().shutdown_drain_timeout;
        if let Some(browser) = self.worker.browser() {
            browser.drain(drain_timeout).await;
        }

        if let Some(active) = self.queue.active_job_id().await {
            log_warn!("Job {} left running; it will be requeued on next start", active);
        }

        joined.map_err(|e| {
            log_error!("Worker task ended abnormally: {}", e);
            AppError::InternalError(format!("Worker task ended abnormally: {}", e))
        })
    }
}
