/// Environment-driven configuration
///
/// Values are read once at startup (after `.env` is loaded through dotenvy)
/// and handed to the components that need them. Every setting has a default
/// so a bare environment still produces a usable in-memory setup.
use crate::modules::browser::BrowserQueueConfig;
use crate::modules::enrichment::WorkerConfig;
use crate::modules::quota::QuotaPolicy;
use crate::modules::tracks::domain::{PropagationPolicy, TrackField};
use crate::shared::errors::{AppError, AppResult};
use chrono_tz::Tz;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub requests_per_second: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            requests_per_second: 1,
        }
    }
}

/// Defaults describe an in-memory setup with no webhook
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub worker: WorkerConfig,
    pub browser: BrowserQueueConfig,
    pub video_quota: QuotaPolicy,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Load `.env` (if present) and build the configuration from the environment
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let listing_fields = match env::var("LISTING_ONLY_FIELDS") {
            Ok(raw) => parse_field_list(&raw)?,
            Err(_) => vec![TrackField::ListingScore],
        };

        let worker = WorkerConfig {
            poll_interval: Duration::from_millis(env_parse("WORKER_POLL_INTERVAL_MS", 5_000u64)?),
            scrape_task_timeout: Duration::from_secs(env_parse("SCRAPE_TASK_TIMEOUT_SECS", 60u64)?),
            scrape_task_priority: env_parse("SCRAPE_TASK_PRIORITY", 0i32)?,
            shutdown_drain_timeout: Duration::from_secs(env_parse("SHUTDOWN_DRAIN_SECS", 30u64)?),
            propagation: PropagationPolicy::new(listing_fields),
        };

        let browser = BrowserQueueConfig {
            max_concurrent: env_parse("BROWSER_MAX_CONCURRENT", 3usize)?,
            pool_size: env_parse("BROWSER_POOL_SIZE", 2usize)?,
            min_delay: Duration::from_millis(env_parse("BROWSER_MIN_DELAY_MS", 1_500u64)?),
            poll_interval: Duration::from_millis(env_parse("BROWSER_POLL_INTERVAL_MS", 100u64)?),
        };

        let timezone: Tz = env::var("QUOTA_TIMEZONE")
            .unwrap_or_else(|_| "America/Los_Angeles".to_string())
            .parse()
            .map_err(|e| AppError::ConfigError(format!("QUOTA_TIMEZONE: {}", e)))?;

        let video_quota = QuotaPolicy {
            source: "youtube".to_string(),
            hard_limit: env_parse("YOUTUBE_QUOTA_HARD_LIMIT", 10_000i64)?,
            safe_limit: env_parse("YOUTUBE_QUOTA_SAFE_LIMIT", 8_000i64)?,
            units_per_call: env_parse("YOUTUBE_UNITS_PER_LOOKUP", 100i64)?,
            timezone,
        };

        let notifications = NotificationConfig {
            webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|url| !url.is_empty()),
            requests_per_second: env_parse("NOTIFY_RATE_PER_SEC", 1u32)?,
        };

        let config = Self {
            database_url: env::var("DATABASE_URL").ok(),
            worker,
            browser,
            video_quota,
            notifications,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.browser.max_concurrent == 0 {
            return Err(AppError::ConfigError(
                "BROWSER_MAX_CONCURRENT must be at least 1".to_string(),
            ));
        }
        if self.browser.pool_size == 0 {
            return Err(AppError::ConfigError(
                "BROWSER_POOL_SIZE must be at least 1".to_string(),
            ));
        }
        if self.video_quota.safe_limit > self.video_quota.hard_limit {
            return Err(AppError::ConfigError(format!(
                "Quota safe limit {} exceeds hard limit {}",
                self.video_quota.safe_limit, self.video_quota.hard_limit
            )));
        }
        if self.notifications.requests_per_second == 0 {
            return Err(AppError::ConfigError(
                "NOTIFY_RATE_PER_SEC must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("{}={:?}: {}", key, raw, e))),
        Err(_) => Ok(default),
    }
}

fn parse_field_list(raw: &str) -> AppResult<Vec<TrackField>> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<TrackField>()
                .map_err(|e| AppError::ConfigError(format!("LISTING_ONLY_FIELDS: {}", e)))
        })
        .collect()
}
