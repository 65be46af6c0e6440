pub mod logger;
pub mod rate_limiter;
