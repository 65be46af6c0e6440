/// In-process QuotaStore; increments are atomic per (source, day) entry
use crate::modules::quota::repository::QuotaStore;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryQuotaStore {
    usage: Arc<DashMap<(String, NaiveDate), i64>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a counter, e.g. to resume a partially spent day
    pub fn set_usage(&self, source: &str, day: NaiveDate, units: i64) {
        self.usage.insert((source.to_string(), day), units);
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get_quota_usage(&self, source: &str, day: NaiveDate) -> AppResult<i64> {
        Ok(self
            .usage
            .get(&(source.to_string(), day))
            .map(|entry| *entry.value())
            .unwrap_or(0))
    }

    async fn increment_quota_usage(
        &self,
        source: &str,
        day: NaiveDate,
        units: i64,
    ) -> AppResult<i64> {
        let mut entry = self.usage.entry((source.to_string(), day)).or_insert(0);
        *entry += units;
        Ok(*entry)
    }
}
