/// Diesel models for the tracks table
use crate::modules::tracks::domain::{Track, TrackPatch};
use crate::schema::tracks;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = tracks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TrackModel {
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
    pub listing_score: Option<i32>,
    pub metadata_enriched_at: Option<DateTime<Utc>>,
    pub credits_scraped_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TrackModel {
    pub fn into_track(self) -> Track {
        Track {
            id: self.id,
            playlist_id: self.playlist_id,
            duplicate_key: self.duplicate_key,
            title: self.title,
            artist: self.artist,
            album: self.album,
            isrc: self.isrc,
            label: self.label,
            release_date: self.release_date,
            songwriters: self.songwriters,
            producers: self.producers,
            publishers: self.publishers,
            artist_mbid: self.artist_mbid,
            social_links: self.social_links,
            chartmetric_id: self.chartmetric_id,
            stream_count: self.stream_count,
            mlc_song_code: self.mlc_song_code,
            youtube_video_id: self.youtube_video_id,
            youtube_view_count: self.youtube_view_count,
            listing_score: self.listing_score,
            metadata_enriched_at: self.metadata_enriched_at,
            credits_scraped_at: self.credits_scraped_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row inserted when a track is first cataloged
#[derive(Insertable, Debug)]
#[diesel(table_name = tracks)]
pub struct NewTrackModel {
    pub id: Uuid,
    pub playlist_id: Option<Uuid>,
    pub duplicate_key: Option<String>,
    pub title: String,
    pub artist: String,
}

impl From<&Track> for NewTrackModel {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            playlist_id: track.playlist_id,
            duplicate_key: track.duplicate_key.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
        }
    }
}

/// `None` fields are left untouched by the UPDATE
#[derive(AsChangeset, Debug)]
#[diesel(table_name = tracks)]
pub struct TrackChangeset {
    pub album: Option<String>,
    pub isrc: Option<String>,
    pub label: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub songwriters: Option<Vec<String>>,
    pub producers: Option<Vec<String>>,
    pub publishers: Option<Vec<String>>,
    pub artist_mbid: Option<String>,
    pub social_links: Option<Vec<String>>,
    pub chartmetric_id: Option<String>,
    pub stream_count: Option<i64>,
    pub mlc_song_code: Option<String>,
    pub youtube_video_id: Option<String>,
    pub youtube_view_count: Option<i64>,
    pub listing_score: Option<i32>,
    pub metadata_enriched_at: Option<DateTime<Utc>>,
    pub credits_scraped_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TrackPatch> for TrackChangeset {
    fn from(patch: &TrackPatch) -> Self {
        let patch = patch.clone();
        Self {
            album: patch.album,
            isrc: patch.isrc,
            label: patch.label,
            release_date: patch.release_date,
            songwriters: patch.songwriters,
            producers: patch.producers,
            publishers: patch.publishers,
            artist_mbid: patch.artist_mbid,
            social_links: patch.social_links,
            chartmetric_id: patch.chartmetric_id,
            stream_count: patch.stream_count,
            mlc_song_code: patch.mlc_song_code,
            youtube_video_id: patch.youtube_video_id,
            youtube_view_count: patch.youtube_view_count,
            listing_score: patch.listing_score,
            metadata_enriched_at: patch.metadata_enriched_at,
            credits_scraped_at: patch.credits_scraped_at,
            updated_at: Utc::now(),
        }
    }
}
