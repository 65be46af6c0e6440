/// Enrichment orchestration
///
/// - Domain: phase catalogue, per-phase reports and the source ports
/// - Phases: phase definitions (source + predicates) and the ordered plan
/// - Runner: executes one phase into the staging context
/// - Flush: persists staged patches and propagates to out-of-job duplicates
/// - Worker: the polling state machine that drives jobs through the plan
pub mod config;
pub mod domain;
pub mod flush;
pub mod phases;
pub mod runner;
pub mod worker;

pub use config::WorkerConfig;
pub use domain::{
    BatchEnricher, EnrichmentOutcome, PageExtractor, PhaseKind, PhaseReport, TrackLookup,
};
pub use flush::{FlushReport, StagingFlusher};
pub use phases::{PhaseDefinition, PhasePlan, PhaseSource};
pub use runner::PhaseRunner;
pub use worker::{EnrichmentWorker, WorkerState};
