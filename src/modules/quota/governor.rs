/// Daily quota governance for metered external APIs
///
/// The governor stops work at a self-imposed `safe_limit` below the provider's
/// `hard_limit`, leaving headroom for other processes sharing the same key.
/// Days are keyed in the provider's reset time zone.
use crate::modules::quota::repository::QuotaStore;
use crate::shared::errors::AppResult;
use crate::shared::utils::logger::LogContext;
use crate::{log_error, log_warn};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    pub source: String,
    pub hard_limit: i64,
    pub safe_limit: i64,
    pub units_per_call: i64,
    pub timezone: Tz,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            source: "youtube".to_string(),
            hard_limit: 10_000,
            safe_limit: 8_000,
            units_per_call: 100,
            timezone: chrono_tz::America::Los_Angeles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Available { used: i64, remaining: i64 },
    Exhausted { used: i64 },
}

impl QuotaCheck {
    pub fn is_available(&self) -> bool {
        matches!(self, QuotaCheck::Available { .. })
    }
}

pub struct QuotaGovernor {
    store: Arc<dyn QuotaStore>,
    policy: QuotaPolicy,
}

impl QuotaGovernor {
    pub fn new(store: Arc<dyn QuotaStore>, policy: QuotaPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    pub fn source(&self) -> &str {
        &self.policy.source
    }

    pub fn units_per_call(&self) -> i64 {
        self.policy.units_per_call
    }

    pub fn day_key(&self) -> NaiveDate {
        self.day_key_at(Utc::now())
    }

    pub fn day_key_at(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.policy.timezone).date_naive()
    }

    pub async fn usage(&self) -> AppResult<i64> {
        self.store
            .get_quota_usage(&self.policy.source, self.day_key())
            .await
    }

    /// Whether `units` more fit under the safe limit today.
    /// An unreadable counter counts as exhausted.
    pub async fn check(&self, units: i64) -> QuotaCheck {
        let used = match self.usage().await {
            Ok(used) => used,
            Err(e) => {
                log_error!(
                    "Could not read {} quota usage, treating as exhausted: {}",
                    self.policy.source,
                    e
                );
                return QuotaCheck::Exhausted {
                    used: self.policy.safe_limit,
                };
            }
        };

        if used + units > self.policy.safe_limit {
            QuotaCheck::Exhausted { used }
        } else {
            QuotaCheck::Available {
                used,
                remaining: self.policy.safe_limit - used,
            }
        }
    }

    /// Record units spent by a call that was made, whatever its outcome
    pub async fn record(&self, units: i64) -> AppResult<i64> {
        let total = self
            .store
            .increment_quota_usage(&self.policy.source, self.day_key(), units)
            .await?;

        LogContext::quota_usage(
            &self.policy.source,
            total,
            self.policy.safe_limit,
            self.policy.hard_limit,
        );
        if total > self.policy.hard_limit {
            log_warn!(
                "{} quota usage {} is past the hard limit {}",
                self.policy.source,
                total,
                self.policy.hard_limit
            );
        }
        Ok(total)
    }
}
