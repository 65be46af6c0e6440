/// Daily quota accounting for metered APIs
pub mod governor;
pub mod infrastructure;
pub mod repository;

pub use governor::{QuotaCheck, QuotaGovernor, QuotaPolicy};
pub use infrastructure::{InMemoryQuotaStore, PgQuotaStore};
pub use repository::QuotaStore;
