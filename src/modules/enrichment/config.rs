use crate::modules::tracks::domain::PropagationPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle tick between queue polls
    pub poll_interval: Duration,
    /// Upper bound on one scraping task's execution
    pub scrape_task_timeout: Duration,
    /// Browser queue priority for scraping tasks
    pub scrape_task_priority: i32,
    /// How long shutdown waits for in-flight browser tasks
    pub shutdown_drain_timeout: Duration,
    pub propagation: PropagationPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            scrape_task_timeout: Duration::from_secs(60),
            scrape_task_priority: 0,
            shutdown_drain_timeout: Duration::from_secs(30),
            propagation: PropagationPolicy::default(),
        }
    }
}
