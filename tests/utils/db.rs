/// Database test utilities with singleton pattern
///
/// Postgres tests are `#[ignore]`d by default; run them with
/// `TEST_DATABASE_URL` set and `--ignored`.
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool};
use linernotes_lib::shared::database::Database;
use std::sync::{Arc, Mutex, OnceLock};

type PgPool = Pool<ConnectionManager<PgConnection>>;

static DB_POOL: OnceLock<Arc<PgPool>> = OnceLock::new();

/// Get or create singleton database pool for tests, with migrations applied
pub fn get_test_db_pool() -> Arc<PgPool> {
    DB_POOL
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let test_db_url = std::env::var("TEST_DATABASE_URL")
                .expect("TEST_DATABASE_URL must be set in .env for tests");

            let manager = ConnectionManager::<PgConnection>::new(test_db_url);
            let pool = r2d2::Pool::builder()
                .max_size(10)
                .build(manager)
                .expect("Failed to create test database pool");

            Database::from_pool(pool.clone())
                .run_migrations()
                .expect("Failed to run migrations on test database");

            Arc::new(pool)
        })
        .clone()
}

pub fn test_database() -> Database {
    Database::from_pool((*get_test_db_pool()).clone())
}

/// Clean all test tables - use at the start of each test
pub fn clean_test_db() {
    let pool = get_test_db_pool();
    let mut conn = pool.get().expect("Failed to get DB connection");

    for table in ["enrichment_jobs", "tracks", "api_quota_usage"] {
        diesel::sql_query(format!("TRUNCATE TABLE {} CASCADE", table))
            .execute(&mut conn)
            .unwrap_or_else(|e| panic!("Failed to clean {}: {}", table, e));
    }
}

/// Global test mutex for serialization
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire test lock to ensure tests run serially
/// Returns a guard that releases the lock when dropped
pub fn acquire_test_lock() -> std::sync::MutexGuard<'static, ()> {
    // Handle poisoned mutex by recovering from panic
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
