pub mod memory;
pub mod models;
pub mod repository;

pub use memory::InMemoryTrackStore;
pub use repository::PgTrackStore;
