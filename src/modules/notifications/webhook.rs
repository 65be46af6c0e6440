/// Notifier posting JSON to a webhook, throttled with governor
use crate::modules::notifications::notifier::{JobCompletion, Notifier};
use crate::shared::errors::{AppError, AppResult};
use crate::{log_debug, log_info};
use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reqwest::Client;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::time::Duration;

type DirectLimiter = GovernorRateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
    governor::middleware::NoOpMiddleware,
>;

pub struct WebhookNotifier {
    client: Client,
    url: String,
    rate_limiter: DirectLimiter,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, requests_per_second: u32) -> AppResult<Self> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::ConfigError(format!(
                "Webhook URL must be http(s): {}",
                url
            )));
        }
        let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            AppError::ConfigError("Notification rate must be at least 1/sec".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            rate_limiter: GovernorRateLimiter::direct(Quota::per_second(rate)),
        })
    }

    async fn post(&self, body: Value) -> AppResult<()> {
        self.rate_limiter.until_ready().await;
        log_debug!("POST {} ({})", self.url, body["event"]);

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Webhook responded with {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_job_complete(&self, completion: &JobCompletion) -> AppResult<()> {
        self.post(json!({
            "event": "job_completed",
            "job": completion,
        }))
        .await?;
        log_info!("Sent completion notification for job {}", completion.job_id);
        Ok(())
    }

    async fn notify_job_failed(&self, job_id: uuid::Uuid, error: &str) -> AppResult<()> {
        self.post(json!({
            "event": "job_failed",
            "job_id": job_id,
            "error": error,
        }))
        .await
    }
}
