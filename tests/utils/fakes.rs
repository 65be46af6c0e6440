/// In-process stand-ins for the external collaborators
use async_trait::async_trait;
use linernotes_lib::modules::browser::{BrowserSession, SessionLauncher};
use linernotes_lib::modules::enrichment::{
    BatchEnricher, EnrichmentOutcome, PageExtractor, TrackLookup,
};
use linernotes_lib::modules::notifications::{
    ContactScoreRecompute, JobCompletion, Notifier, PartyFlagSync,
};
use linernotes_lib::modules::tracks::{
    BatchUpdateResult, InMemoryTrackStore, Track, TrackPatch, TrackStore,
};
use linernotes_lib::shared::errors::{AppError, AppResult};
use mockall::mock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ------------------------------------------------------------------------------------------------
// Browser sessions
// ------------------------------------------------------------------------------------------------

pub struct FakeSession {
    pub number: usize,
    connected: AtomicBool,
    fail_close: bool,
    pub close_calls: AtomicUsize,
}

impl FakeSession {
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn load_page(&self, url: &str) -> AppResult<String> {
        if !self.is_connected() {
            return Err(AppError::BrowserError("disconnected".to_string()));
        }
        Ok(format!("<html><body>{}</body></html>", url))
    }

    async fn close(&self) -> AppResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_close {
            return Err(AppError::BrowserError(format!(
                "session {} refused to close",
                self.number
            )));
        }
        Ok(())
    }
}

/// Hands out `FakeSession`s and remembers every one it launched
#[derive(Default)]
pub struct FakeLauncher {
    sessions: Mutex<Vec<Arc<FakeSession>>>,
    /// Launch numbers (0-based) whose close fails
    failing_close: HashSet<usize>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_failing_close(numbers: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(Vec::new()),
            failing_close: numbers.iter().copied().collect(),
        })
    }

    pub fn launched(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> AppResult<Arc<dyn BrowserSession>> {
        let mut sessions = self.sessions.lock().unwrap();
        let number = sessions.len();
        let session = Arc::new(FakeSession {
            number,
            connected: AtomicBool::new(true),
            fail_close: self.failing_close.contains(&number),
            close_calls: AtomicUsize::new(0),
        });
        sessions.push(session.clone());
        Ok(session)
    }
}

// ------------------------------------------------------------------------------------------------
// Enrichment sources
// ------------------------------------------------------------------------------------------------

/// Batch enricher backed by a closure
pub struct FnEnricher<F> {
    respond: F,
    pub calls: AtomicUsize,
}

impl<F> FnEnricher<F>
where
    F: Fn(&[Track]) -> AppResult<EnrichmentOutcome> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl<F> BatchEnricher for FnEnricher<F>
where
    F: Fn(&[Track]) -> AppResult<EnrichmentOutcome> + Send + Sync,
{
    async fn enrich(&self, tracks: &[Track]) -> AppResult<EnrichmentOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(tracks)
    }
}

/// Patches every track with the same label
pub fn labelling_enricher(label: &'static str) -> Arc<dyn BatchEnricher> {
    FnEnricher::new(move |tracks: &[Track]| {
        Ok(EnrichmentOutcome {
            patches: tracks
                .iter()
                .map(|track| {
                    (
                        track.id,
                        TrackPatch {
                            label: Some(label.to_string()),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            ..Default::default()
        })
    })
}

/// Always fails the whole call
pub fn failing_enricher(message: &'static str) -> Arc<dyn BatchEnricher> {
    FnEnricher::new(move |_tracks: &[Track]| Err(AppError::ExternalServiceError(message.to_string())))
}

/// Page extractor backed by a closure, with an optional delay per page
pub struct FnExtractor<F> {
    respond: F,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl<F> FnExtractor<F>
where
    F: Fn(&Track) -> AppResult<Option<TrackPatch>> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Self::with_delay(respond, Duration::ZERO)
    }

    pub fn with_delay(respond: F, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            respond,
            delay,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl<F> PageExtractor for FnExtractor<F>
where
    F: Fn(&Track) -> AppResult<Option<TrackPatch>> + Send + Sync,
{
    async fn extract(
        &self,
        session: Arc<dyn BrowserSession>,
        track: Track,
    ) -> AppResult<Option<TrackPatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        session.load_page(&format!("https://credits.example/{}", track.id)).await?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.respond)(&track)
    }
}

/// Metered lookup backed by a closure
pub struct FnLookup<F> {
    respond: F,
    pub calls: AtomicUsize,
}

impl<F> FnLookup<F>
where
    F: Fn(&Track) -> AppResult<Option<TrackPatch>> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> TrackLookup for FnLookup<F>
where
    F: Fn(&Track) -> AppResult<Option<TrackPatch>> + Send + Sync,
{
    async fn lookup(&self, track: &Track) -> AppResult<Option<TrackPatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(track)
    }
}

// ------------------------------------------------------------------------------------------------
// Stores
// ------------------------------------------------------------------------------------------------

/// Track store whose batch writes fail for chosen ids until healed
#[derive(Clone)]
pub struct FlakyTrackStore {
    pub inner: InMemoryTrackStore,
    failing: Arc<Mutex<HashSet<Uuid>>>,
}

impl FlakyTrackStore {
    pub fn new(inner: InMemoryTrackStore) -> Self {
        Self {
            inner,
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn fail_writes_for(&self, id: Uuid) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn is_failing(&self, id: &Uuid) -> bool {
        self.failing.lock().unwrap().contains(id)
    }
}

#[async_trait]
impl TrackStore for FlakyTrackStore {
    async fn get_tracks_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Track>> {
        self.inner.get_tracks_by_ids(ids).await
    }

    async fn update_track_metadata(&self, id: Uuid, patch: &TrackPatch) -> AppResult<()> {
        if self.is_failing(&id) {
            return Err(AppError::DatabaseError(format!("write to {} refused", id)));
        }
        self.inner.update_track_metadata(id, patch).await
    }

    async fn get_tracks_by_duplicate_key(&self, duplicate_key: &str) -> AppResult<Vec<Track>> {
        self.inner.get_tracks_by_duplicate_key(duplicate_key).await
    }

    async fn batch_update_track_metadata(
        &self,
        updates: &[(Uuid, TrackPatch)],
    ) -> AppResult<BatchUpdateResult> {
        let (refused, allowed): (Vec<_>, Vec<_>) = updates
            .iter()
            .cloned()
            .partition(|(id, _)| self.is_failing(id));

        let mut result = self.inner.batch_update_track_metadata(&allowed).await?;
        result.failed_ids.extend(refused.into_iter().map(|(id, _)| id));
        Ok(result)
    }
}

// ------------------------------------------------------------------------------------------------
// Notifications and hooks
// ------------------------------------------------------------------------------------------------

mock! {
    pub Notifier {}

    #[async_trait]
    impl Notifier for Notifier {
        async fn notify_job_complete(&self, completion: &JobCompletion) -> AppResult<()>;
        async fn notify_job_failed(&self, job_id: Uuid, error: &str) -> AppResult<()>;
    }
}

/// Records what the worker asked the hooks to do
#[derive(Default)]
pub struct RecordingHooks {
    pub flagged: Mutex<Vec<String>>,
    pub scored: Mutex<Vec<String>>,
}

#[async_trait]
impl PartyFlagSync for RecordingHooks {
    async fn sync_party_flags(&self, parties: &[String]) -> AppResult<usize> {
        self.flagged.lock().unwrap().extend(parties.iter().cloned());
        Ok(parties.len())
    }
}

#[async_trait]
impl ContactScoreRecompute for RecordingHooks {
    async fn recompute_contact_scores(&self, party_ids: &[String]) -> AppResult<usize> {
        self.scored.lock().unwrap().extend(party_ids.iter().cloned());
        Ok(party_ids.len())
    }
}
