/// Progress events for live views
///
/// The core never depends on anyone listening. `broadcast` must not block.
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

pub trait ProgressObserver: Send + Sync {
    fn broadcast(&self, event: &str, payload: Value);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn broadcast(&self, _event: &str, _payload: Value) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub event: String,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

/// Fans events out to any number of subscribers; slow ones lag and lose events
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ProgressObserver for BroadcastObserver {
    fn broadcast(&self, event: &str, payload: Value) {
        // No subscribers is not an error
        let _ = self.sender.send(ProgressEvent {
            event: event.to_string(),
            payload,
            at: Utc::now(),
        });
    }
}
