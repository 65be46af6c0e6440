pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{
    EnrichmentJob, JobOutcome, JobProgressUpdate, JobStatus, JobUpdate, NewEnrichmentJob,
};
pub use repository::{JobStatistics, JobStore};
pub use value_objects::JobStatusDb;
