pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryJobStore;
pub use repository::PgJobStore;
