/// Enrichment job queue
///
/// Architecture:
/// - Domain: job entities, status mapping and the `JobStore` trait
/// - Infrastructure: Diesel (Postgres) and in-memory stores
/// - Queue: single-active-job admission, progress and crash recovery
pub mod domain;
pub mod infrastructure;
pub mod queue;

pub use domain::{
    entities::{
        EnrichmentJob, JobOutcome, JobProgressUpdate, JobStatus, JobUpdate, NewEnrichmentJob,
    },
    repository::{JobStatistics, JobStore},
};
pub use infrastructure::{InMemoryJobStore, PgJobStore};
pub use queue::JobQueue;
