/// Outbound signals about jobs: notifications, live progress and post-job hooks
pub mod hooks;
pub mod notifier;
pub mod observer;
pub mod webhook;

pub use hooks::{ContactScoreRecompute, PartyFlagSync};
pub use notifier::{JobCompletion, NoopNotifier, Notifier};
pub use observer::{BroadcastObserver, NoopObserver, ProgressEvent, ProgressObserver};
pub use webhook::WebhookNotifier;
