/// Track catalog context
///
/// - Domain: track entity, typed patches with global/listing field scopes, store trait
/// - Infrastructure: Diesel and in-memory stores
/// - Staging: per-job overlay of pending patches
/// - Scoring: listing score computed from staged credit data
pub mod domain;
pub mod infrastructure;
pub mod scoring;
pub mod staging;

pub use domain::{
    BatchUpdateResult, FieldScope, PropagationPolicy, Track, TrackField, TrackPatch, TrackStore,
};
pub use infrastructure::{InMemoryTrackStore, PgTrackStore};
pub use scoring::ListingScoreCalculator;
pub use staging::TrackStagingContext;
