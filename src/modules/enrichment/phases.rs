/// Phase definitions and the ordered plan the worker walks
use crate::modules::enrichment::domain::{BatchEnricher, PageExtractor, PhaseKind, TrackLookup};
use crate::modules::quota::QuotaGovernor;
use crate::modules::tracks::domain::Track;
use std::fmt;
use std::sync::Arc;

pub type TrackPredicate = Arc<dyn Fn(&Track) -> bool + Send + Sync>;

/// Where a phase gets its data from
#[derive(Clone)]
pub enum PhaseSource {
    /// One call for all candidate tracks
    Batch(Arc<dyn BatchEnricher>),
    /// One browser task per track
    Scraped(Arc<dyn PageExtractor>),
    /// One lookup per track, charged against a daily quota
    Metered {
        lookup: Arc<dyn TrackLookup>,
        governor: Arc<QuotaGovernor>,
    },
}

impl PhaseSource {
    pub fn name(&self) -> &'static str {
        match self {
            PhaseSource::Batch(_) => "batch",
            PhaseSource::Scraped(_) => "scraped",
            PhaseSource::Metered { .. } => "metered",
        }
    }
}

#[derive(Clone)]
pub struct PhaseDefinition {
    pub kind: PhaseKind,
    pub source: PhaseSource,
    needs_work: TrackPredicate,
    prerequisite: TrackPredicate,
}

impl PhaseDefinition {
    /// Uses the phase's default needs-work and prerequisite checks
    pub fn new(kind: PhaseKind, source: PhaseSource) -> Self {
        Self {
            kind,
            source,
            needs_work: Arc::new(move |track: &Track| kind.needs_work(track)),
            prerequisite: Arc::new(move |track: &Track| kind.prerequisite_met(track)),
        }
    }

    pub fn batch(kind: PhaseKind, enricher: Arc<dyn BatchEnricher>) -> Self {
        Self::new(kind, PhaseSource::Batch(enricher))
    }

    pub fn scraped(kind: PhaseKind, extractor: Arc<dyn PageExtractor>) -> Self {
        Self::new(kind, PhaseSource::Scraped(extractor))
    }

    pub fn metered(
        kind: PhaseKind,
        lookup: Arc<dyn TrackLookup>,
        governor: Arc<QuotaGovernor>,
    ) -> Self {
        Self::new(kind, PhaseSource::Metered { lookup, governor })
    }

    pub fn with_needs_work<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Track) -> bool + Send + Sync + 'static,
    {
        self.needs_work = Arc::new(predicate);
        self
    }

    pub fn with_prerequisite<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Track) -> bool + Send + Sync + 'static,
    {
        self.prerequisite = Arc::new(predicate);
        self
    }

    pub fn needs_work(&self, track: &Track) -> bool {
        (self.needs_work)(track)
    }

    pub fn prerequisite_met(&self, track: &Track) -> bool {
        (self.prerequisite)(track)
    }
}

impl fmt::Debug for PhaseDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseDefinition")
            .field("kind", &self.kind)
            .field("source", &self.source.name())
            .finish()
    }
}

/// Registered phases, kept in run order with at most one per kind
#[derive(Clone, Debug, Default)]
pub struct PhasePlan {
    phases: Vec<PhaseDefinition>,
}

impl PhasePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a phase, replacing any earlier one of the same kind
    pub fn with_phase(mut self, phase: PhaseDefinition) -> Self {
        self.phases.retain(|existing| existing.kind != phase.kind);
        self.phases.push(phase);
        self.phases.sort_by_key(|phase| phase.kind);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn kinds(&self) -> Vec<PhaseKind> {
        self.phases.iter().map(|phase| phase.kind).collect()
    }

    pub fn get(&self, kind: PhaseKind) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|phase| phase.kind == kind)
    }

    /// Phases a job runs: all of them, or only its target phase
    pub fn phases_for(&self, target: Option<PhaseKind>) -> Vec<&PhaseDefinition> {
        self.phases
            .iter()
            .filter(|phase| target.map_or(true, |kind| phase.kind == kind))
            .collect()
    }

    pub fn uses_browser(&self) -> bool {
        self.phases
            .iter()
            .any(|phase| matches!(phase.source, PhaseSource::Scraped(_)))
    }
}
