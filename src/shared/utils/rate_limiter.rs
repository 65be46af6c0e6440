use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Minimum spacing between consecutive starts
///
/// The first start is never delayed.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Time left before the next start is allowed, if any
    pub async fn remaining(&self) -> Option<Duration> {
        let last = self.last_request.lock().await;
        let elapsed = last.as_ref()?.elapsed();
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    /// Record a start happening now
    pub async fn mark(&self) {
        *self.last_request.lock().await = Some(Instant::now());
    }
}
