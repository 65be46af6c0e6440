pub mod browser;
pub mod enrichment;
pub mod jobs;
pub mod notifications;
pub mod quota;
pub mod tracks;
