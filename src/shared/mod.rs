// Shared kernel: cross-cutting pieces every bounded context uses

pub mod config; // Environment-driven configuration
pub mod database; // Postgres pool and embedded migrations
pub mod errors; // Shared error types
pub mod utils; // Logging and rate limiting

pub use config::AppConfig;
pub use database::Database;
