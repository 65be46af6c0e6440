pub mod memory;
pub mod repository;

pub use memory::InMemoryQuotaStore;
pub use repository::PgQuotaStore;
