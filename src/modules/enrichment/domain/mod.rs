pub mod phase;
pub mod ports;

pub use phase::{PhaseKind, PhaseReport};
pub use ports::{BatchEnricher, EnrichmentOutcome, PageExtractor, TrackLookup};
