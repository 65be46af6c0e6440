/// Diesel-based implementation of QuotaStore
///
/// The increment is a single upsert so concurrent processes never lose units.
use crate::modules::quota::repository::QuotaStore;
use crate::schema::api_quota_usage;
use crate::shared::database::Database;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Text};

#[derive(QueryableByName)]
struct UnitsRow {
    #[diesel(sql_type = BigInt)]
    units_used: i64,
}

pub struct PgQuotaStore {
    db: Database,
}

impl PgQuotaStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QuotaStore for PgQuotaStore {
    async fn get_quota_usage(&self, source: &str, day: NaiveDate) -> AppResult<i64> {
        let mut conn = self.db.get_connection()?;

        let used: Option<i64> = api_quota_usage::table
            .find((source, day))
            .select(api_quota_usage::units_used)
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to read quota usage: {}", e)))?;

        Ok(used.unwrap_or(0))
    }

    async fn increment_quota_usage(
        &self,
        source: &str,
        day: NaiveDate,
        units: i64,
    ) -> AppResult<i64> {
        let mut conn = self.db.get_connection()?;

        let row: UnitsRow = diesel::sql_query(
            r#"
            INSERT INTO api_quota_usage (source, day, units_used, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (source, day) DO UPDATE
            SET units_used = api_quota_usage.units_used + EXCLUDED.units_used,
                updated_at = NOW()
            RETURNING units_used
            "#,
        )
        .bind::<Text, _>(source)
        .bind::<Date, _>(day)
        .bind::<BigInt, _>(units)
        .get_result(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to increment quota usage: {}", e)))?;

        Ok(row.units_used)
    }
}
