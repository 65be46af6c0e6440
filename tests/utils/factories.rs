/// Test data factories using builder pattern
///
/// Provides convenient methods to create test data with sensible defaults
use chrono::Utc;
use linernotes_lib::modules::tracks::Track;
use uuid::Uuid;

pub struct TrackFactory {
    track: Track,
}

impl Default for TrackFactory {
    fn default() -> Self {
        Self {
            track: Track::new("Test Song", "Test Artist"),
        }
    }
}

impl TrackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bare track: nothing enriched yet
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Track that already went through every phase
    pub fn fully_enriched() -> Self {
        Self::default()
            .with_isrc("USRC17607839")
            .with_label("Sub Pop")
            .with_songwriters(&["A. Writer"])
            .with_publishers(&["Big Publishing"])
            .with_artist_mbid("f27ec8db-af05-4f36-916e-3d57f91ecf5e")
            .with_social_links(&["https://social.example/artist"])
            .with_chartmetric_id("cm-1")
            .with_stream_count(1_000)
            .with_mlc_song_code("MLC1")
            .with_video("vid-1", 10)
            .metadata_done()
            .credits_done()
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.track.id = id;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.track.title = title.to_string();
        self
    }

    pub fn with_playlist(mut self, playlist_id: Uuid) -> Self {
        self.track.playlist_id = Some(playlist_id);
        self
    }

    pub fn with_duplicate_key(mut self, key: &str) -> Self {
        self.track.duplicate_key = Some(key.to_string());
        self
    }

    pub fn with_isrc(mut self, isrc: &str) -> Self {
        self.track.isrc = Some(isrc.to_string());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.track.label = Some(label.to_string());
        self
    }

    pub fn with_songwriters(mut self, names: &[&str]) -> Self {
        self.track.songwriters = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_publishers(mut self, names: &[&str]) -> Self {
        self.track.publishers = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_artist_mbid(mut self, mbid: &str) -> Self {
        self.track.artist_mbid = Some(mbid.to_string());
        self
    }

    pub fn with_social_links(mut self, links: &[&str]) -> Self {
        self.track.social_links = links.iter().map(|link| link.to_string()).collect();
        self
    }

    pub fn with_chartmetric_id(mut self, id: &str) -> Self {
        self.track.chartmetric_id = Some(id.to_string());
        self
    }

    pub fn with_stream_count(mut self, streams: i64) -> Self {
        self.track.stream_count = Some(streams);
        self
    }

    pub fn with_mlc_song_code(mut self, code: &str) -> Self {
        self.track.mlc_song_code = Some(code.to_string());
        self
    }

    pub fn with_video(mut self, video_id: &str, views: i64) -> Self {
        self.track.youtube_video_id = Some(video_id.to_string());
        self.track.youtube_view_count = Some(views);
        self
    }

    pub fn with_listing_score(mut self, score: i32) -> Self {
        self.track.listing_score = Some(score);
        self
    }

    pub fn metadata_done(mut self) -> Self {
        self.track.metadata_enriched_at = Some(Utc::now());
        self
    }

    pub fn credits_done(mut self) -> Self {
        self.track.credits_scraped_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> Track {
        self.track
    }
}
