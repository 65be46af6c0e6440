/// Track records as stored in the catalog
///
/// A track row belongs to one listing (playlist). Several rows may describe the
/// same recording; they share a `duplicate_key` (the recording's external URL).
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub playlist_id: Option<Uuid>,
    pub duplicate_key: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub isrc: Option<String>,
    pub label: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub songwriters: Vec<String>,
    pub producers: Vec<String>,
    pub publishers: Vec<String>,
    pub artist_mbid: Option<String>,
    pub social_links: Vec<String>,
    pub chartmetric_id: Option<String>,
    pub stream_count: Option<i64>,
    pub mlc_song_code: Option<String>,
    pub youtube_video_id: Option<String>,
    pub youtube_view_count: Option<i64>,
    /// Score of this row within its listing; never shared across duplicates
    pub listing_score: Option<i32>,
    pub metadata_enriched_at: Option<DateTime<Utc>>,
    pub credits_scraped_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            playlist_id: None,
            duplicate_key: None,
            title: title.into(),
            artist: artist.into(),
            album: None,
            isrc: None,
            label: None,
            release_date: None,
            songwriters: Vec::new(),
            producers: Vec::new(),
            publishers: Vec::new(),
            artist_mbid: None,
            social_links: Vec::new(),
            chartmetric_id: None,
            stream_count: None,
            mlc_song_code: None,
            youtube_video_id: None,
            youtube_view_count: None,
            listing_score: None,
            metadata_enriched_at: None,
            credits_scraped_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn has_credits(&self) -> bool {
        !self.songwriters.is_empty() || !self.producers.is_empty()
    }

    /// Every credited name on the track, in credit order, without repeats
    pub fn credited_parties(&self) -> Vec<String> {
        let mut parties: Vec<String> = Vec::new();
        for name in self
            .songwriters
            .iter()
            .chain(self.producers.iter())
            .chain(self.publishers.iter())
        {
            if !parties.iter().any(|existing| existing == name) {
                parties.push(name.clone());
            }
        }
        parties
    }
}
