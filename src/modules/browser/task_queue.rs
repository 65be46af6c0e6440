/// Priority task queue over the browser session pool
///
/// A single dispatch loop admits tasks in priority order (arrival order among
/// equal priorities), caps how many run at once, and spaces task starts by at
/// least `min_delay`. Each admitted task is spawned and the loop moves on
/// without waiting for it. A failing or panicking task only settles its own
/// handle.
use crate::modules::browser::pool::{PoolStats, SessionPool};
use crate::modules::browser::session::{BrowserSession, SessionLauncher};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::LogContext;
use crate::shared::utils::rate_limiter::RateLimiter;
use crate::{log_debug, log_error, log_info, log_warn};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex, Notify};

#[derive(Debug, Clone)]
pub struct BrowserQueueConfig {
    /// Tasks running at the same time
    pub max_concurrent: usize,
    /// Sessions kept in the pool
    pub pool_size: usize,
    /// Minimum spacing between two task starts
    pub min_delay: Duration,
    /// Re-check interval while waiting for capacity or sessions
    pub poll_interval: Duration,
}

impl Default for BrowserQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            pool_size: 2,
            min_delay: Duration::from_millis(1_500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
    pub total_processed: u64,
}

type TaskRunner =
    Box<dyn FnOnce(AppResult<Arc<dyn BrowserSession>>) -> BoxFuture<'static, bool> + Send>;

struct QueuedTask {
    id: String,
    priority: i32,
    run: TaskRunner,
}

/// Settles with the task's result once it has run
pub struct TaskHandle<T> {
    id: String,
    receiver: oneshot::Receiver<AppResult<T>>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = AppResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(AppError::InternalError(format!(
                "Browser task {} was dropped before it settled",
                this.id
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct QueueInner {
    config: BrowserQueueConfig,
    pool: SessionPool,
    pending: Mutex<Vec<QueuedTask>>,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    dispatching: AtomicBool,
    start_gate: RateLimiter,
    wake: Notify,
    idle: Notify,
}

#[derive(Clone)]
pub struct BrowserTaskQueue {
    inner: Arc<QueueInner>,
}

impl BrowserTaskQueue {
    pub fn new(launcher: Arc<dyn SessionLauncher>, config: BrowserQueueConfig) -> Self {
        let pool = SessionPool::new(launcher, config.pool_size, config.poll_interval);
        let start_gate = RateLimiter::new(config.min_delay);
        Self {
            inner: Arc::new(QueueInner {
                config: BrowserQueueConfig {
                    max_concurrent: config.max_concurrent.max(1),
                    ..config
                },
                pool,
                pending: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                dispatching: AtomicBool::new(false),
                start_gate,
                wake: Notify::new(),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &BrowserQueueConfig {
        &self.inner.config
    }

    /// Queue `execute` to run with a pooled session. Higher `priority` runs first.
    pub async fn add_task<T, F, Fut>(
        &self,
        id: impl Into<String>,
        priority: i32,
        execute: F,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn BrowserSession>) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let id = id.into();
        let (sender, receiver) = oneshot::channel();

        let run: TaskRunner = Box::new(move |session| {
            async move {
                let result = match session {
                    Ok(session) => execute(session).await,
                    Err(e) => Err(e),
                };
                let succeeded = result.is_ok();
                // The caller may have timed out and dropped its handle
                let _ = sender.send(result);
                succeeded
            }
            .boxed()
        });

        {
            let mut pending = self.inner.pending.lock().await;
            let position = pending
                .iter()
                .position(|queued| queued.priority < priority)
                .unwrap_or(pending.len());
            pending.insert(
                position,
                QueuedTask {
                    id: id.clone(),
                    priority,
                    run,
                },
            );
        }
        log_debug!("Queued browser task {} (priority {})", id, priority);

        self.ensure_dispatching();
        TaskHandle { id, receiver }
    }

    fn ensure_dispatching(&self) {
        self.inner.wake.notify_one();
        if self
            .inner
            .dispatching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let inner = self.inner.clone();
            tokio::spawn(inner.dispatch_loop());
        }
    }

    /// Lease a connected session directly from the pool
    pub async fn get_browser(&self) -> AppResult<Arc<dyn BrowserSession>> {
        self.inner.pool.acquire().await
    }

    pub async fn release_browser(&self, session: Arc<dyn BrowserSession>) {
        self.inner.pool.release(session).await;
    }

    pub async fn get_stats(&self) -> QueueStats {
        let pending = self.inner.pending.lock().await.len();
        let completed = self.inner.completed.load(Ordering::SeqCst);
        let failed = self.inner.failed.load(Ordering::SeqCst);
        QueueStats {
            pending,
            active: self.inner.active.load(Ordering::SeqCst),
            completed,
            failed,
            total_processed: completed + failed,
        }
    }

    pub async fn pool_stats(&self) -> PoolStats {
        self.inner.pool.stats().await
    }

    pub async fn is_idle(&self) -> bool {
        self.inner.is_idle().await
    }

    /// Resolves once nothing is pending and nothing is running
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.is_idle().await {
                return;
            }
            let _ = tokio::time::timeout(self.inner.config.poll_interval, notified).await;
        }
    }

    /// Like `wait_for_idle`, bounded; returns false on timeout
    pub async fn wait_for_idle_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_idle())
            .await
            .is_ok()
    }

    /// Close every pooled session; safe to call repeatedly
    pub async fn cleanup(&self) -> usize {
        self.inner.pool.close_all().await
    }

    /// Wait for in-flight work up to `timeout`, abandon the rest, then tear the pool down
    pub async fn drain(&self, timeout: Duration) {
        if !self.wait_for_idle_timeout(timeout).await {
            let abandoned = {
                let mut pending = self.inner.pending.lock().await;
                let count = pending.len();
                pending.clear();
                count
            };
            log_warn!(
                "Browser queue did not drain within {:?}; abandoning {} pending and {} active task(s)",
                timeout,
                abandoned,
                self.inner.active.load(Ordering::SeqCst)
            );
        }
        self.cleanup().await;
    }
}

impl QueueInner {
    async fn is_idle(&self) -> bool {
        self.pending.lock().await.is_empty() && self.active.load(Ordering::SeqCst) == 0
    }

    async fn dispatch_loop(self: Arc<Self>) {
        log_debug!("Browser dispatch loop started");
        loop {
            let pending = self.pending.lock().await.len();
            let active = self.active.load(Ordering::SeqCst);

            if pending == 0 && active == 0 {
                self.dispatching.store(false, Ordering::SeqCst);
                self.idle.notify_waiters();

                // A task may have been queued between the check and the flag reset
                let slipped_in = !self.pending.lock().await.is_empty();
                if slipped_in
                    && self
                        .dispatching
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                {
                    continue;
                }
                log_debug!("Browser dispatch loop idle");
                return;
            }

            if pending == 0 || active >= self.config.max_concurrent {
                let _ = tokio::time::timeout(self.config.poll_interval, self.wake.notified()).await;
                continue;
            }

            if let Some(remaining) = self.start_gate.remaining().await {
                tokio::time::sleep(remaining).await;
                continue;
            }

            let task = {
                let mut pending = self.pending.lock().await;
                if pending.is_empty() {
                    continue;
                }
                pending.remove(0)
            };

            self.active.fetch_add(1, Ordering::SeqCst);
            self.start_gate.mark().await;
            LogContext::browser_task(&task.id, "dispatched", None);

            let inner = self.clone();
            tokio::spawn(async move { inner.run_task(task).await });
        }
    }

    async fn run_task(self: Arc<Self>, task: QueuedTask) {
        let started = Instant::now();
        let QueuedTask { id, run, .. } = task;

        let succeeded = match self.pool.acquire().await {
            Ok(session) => {
                let outcome = AssertUnwindSafe(run(Ok(session.clone())))
                    .catch_unwind()
                    .await;
                self.pool.release(session).await;
                match outcome {
                    Ok(succeeded) => succeeded,
                    Err(_) => {
                        log_error!("Browser task {} panicked", id);
                        false
                    }
                }
            }
            Err(e) => {
                log_warn!("Browser task {} could not get a session: {}", id, e);
                AssertUnwindSafe(run(Err(e)))
                    .catch_unwind()
                    .await
                    .unwrap_or(false)
            }
        };

        if succeeded {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        LogContext::browser_task(
            &id,
            if succeeded { "completed" } else { "failed" },
            Some(started.elapsed().as_millis() as u64),
        );

        let remaining = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.pending.lock().await.is_empty() {
            log_info!(
                "Browser queue drained ({} completed, {} failed so far)",
                self.completed.load(Ordering::SeqCst),
                self.failed.load(Ordering::SeqCst)
            );
        }
        self.wake.notify_one();
        self.idle.notify_waiters();
    }
}
