/// Persistence boundary for daily API quota counters
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Units already spent for `source` on `day`; a day without a row is zero
    async fn get_quota_usage(&self, source: &str, day: NaiveDate) -> AppResult<i64>;

    /// Atomically add `units` and return the new total
    async fn increment_quota_usage(&self, source: &str, day: NaiveDate, units: i64)
        -> AppResult<i64>;
}
