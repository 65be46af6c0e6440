/// Browser automation context
///
/// - Session: traits for pooled automation sessions and their launcher
/// - Pool: lazily grown, self-healing set of sessions
/// - Task queue: priority admission, concurrency cap and start spacing over the pool
/// - Chromium: CDP-backed sessions (`chromium` feature)
#[cfg(feature = "chromium")]
pub mod chromium;
pub mod pool;
pub mod session;
pub mod task_queue;

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use pool::{PoolStats, SessionPool};
pub use session::{BrowserSession, SessionLauncher};
pub use task_queue::{BrowserQueueConfig, BrowserTaskQueue, QueueStats, TaskHandle};
