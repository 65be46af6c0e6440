/// Partial updates to track metadata
///
/// A `TrackPatch` names only the fields a phase produced. Fields are either
/// *global* (intrinsic to the recording, shared by every duplicate row) or
/// *listing-specific* (meaningful only for one row in one listing). The split
/// is explicit: `TrackField::default_scope` plus a deployment-level
/// `PropagationPolicy`.
use super::entities::Track;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackField {
    Album,
    Isrc,
    Label,
    ReleaseDate,
    Songwriters,
    Producers,
    Publishers,
    ArtistMbid,
    SocialLinks,
    ChartmetricId,
    StreamCount,
    MlcSongCode,
    YoutubeVideoId,
    YoutubeViewCount,
    ListingScore,
    MetadataEnrichedAt,
    CreditsScrapedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Same value for every row sharing a duplicate key
    Global,
    /// Belongs to one listing row only
    Listing,
}

impl TrackField {
    pub const ALL: [TrackField; 17] = [
        TrackField::Album,
        TrackField::Isrc,
        TrackField::Label,
        TrackField::ReleaseDate,
        TrackField::Songwriters,
        TrackField::Producers,
        TrackField::Publishers,
        TrackField::ArtistMbid,
        TrackField::SocialLinks,
        TrackField::ChartmetricId,
        TrackField::StreamCount,
        TrackField::MlcSongCode,
        TrackField::YoutubeVideoId,
        TrackField::YoutubeViewCount,
        TrackField::ListingScore,
        TrackField::MetadataEnrichedAt,
        TrackField::CreditsScrapedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackField::Album => "album",
            TrackField::Isrc => "isrc",
            TrackField::Label => "label",
            TrackField::ReleaseDate => "release_date",
            TrackField::Songwriters => "songwriters",
            TrackField::Producers => "producers",
            TrackField::Publishers => "publishers",
            TrackField::ArtistMbid => "artist_mbid",
            TrackField::SocialLinks => "social_links",
            TrackField::ChartmetricId => "chartmetric_id",
            TrackField::StreamCount => "stream_count",
            TrackField::MlcSongCode => "mlc_song_code",
            TrackField::YoutubeVideoId => "youtube_video_id",
            TrackField::YoutubeViewCount => "youtube_view_count",
            TrackField::ListingScore => "listing_score",
            TrackField::MetadataEnrichedAt => "metadata_enriched_at",
            TrackField::CreditsScrapedAt => "credits_scraped_at",
        }
    }

    pub fn default_scope(&self) -> FieldScope {
        match self {
            TrackField::ListingScore => FieldScope::Listing,
            _ => FieldScope::Global,
        }
    }
}

impl fmt::Display for TrackField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        TrackField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| format!("Unknown track field: {}", s))
    }
}

/// Which fields stay on the row they were written to
///
/// Listing-specific fields are excluded whenever a patch is copied onto other
/// members of a duplicate group.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationPolicy {
    listing_fields: Vec<TrackField>,
}

impl PropagationPolicy {
    /// Fields whose default scope is `Listing` are always included
    pub fn new(extra_listing_fields: impl IntoIterator<Item = TrackField>) -> Self {
        let mut listing_fields: Vec<TrackField> = TrackField::ALL
            .iter()
            .copied()
            .filter(|field| field.default_scope() == FieldScope::Listing)
            .collect();
        for field in extra_listing_fields {
            if !listing_fields.contains(&field) {
                listing_fields.push(field);
            }
        }
        Self { listing_fields }
    }

    pub fn scope_of(&self, field: TrackField) -> FieldScope {
        if self.listing_fields.contains(&field) {
            FieldScope::Listing
        } else {
            FieldScope::Global
        }
    }

    pub fn listing_fields(&self) -> &[TrackField] {
        &self.listing_fields
    }

    /// The part of `patch` that may be copied to duplicate rows
    pub fn global_part(&self, patch: &TrackPatch) -> TrackPatch {
        patch.without(&self.listing_fields)
    }
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self::new([])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPatch {
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
}

fn overwrite<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

impl TrackPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn has(&self, field: TrackField) -> bool {
        match field {
            TrackField::Album => self.album.is_some(),
            TrackField::Isrc => self.isrc.is_some(),
            TrackField::Label => self.label.is_some(),
            TrackField::ReleaseDate => self.release_date.is_some(),
            TrackField::Songwriters => self.songwriters.is_some(),
            TrackField::Producers => self.producers.is_some(),
            TrackField::Publishers => self.publishers.is_some(),
            TrackField::ArtistMbid => self.artist_mbid.is_some(),
            TrackField::SocialLinks => self.social_links.is_some(),
            TrackField::ChartmetricId => self.chartmetric_id.is_some(),
            TrackField::StreamCount => self.stream_count.is_some(),
            TrackField::MlcSongCode => self.mlc_song_code.is_some(),
            TrackField::YoutubeVideoId => self.youtube_video_id.is_some(),
            TrackField::YoutubeViewCount => self.youtube_view_count.is_some(),
            TrackField::ListingScore => self.listing_score.is_some(),
            TrackField::MetadataEnrichedAt => self.metadata_enriched_at.is_some(),
            TrackField::CreditsScrapedAt => self.credits_scraped_at.is_some(),
        }
    }

    /// Fields carried by this patch
    pub fn fields(&self) -> Vec<TrackField> {
        TrackField::ALL
            .iter()
            .copied()
            .filter(|field| self.has(*field))
            .collect()
    }

    pub fn clear(&mut self, field: TrackField) {
        match field {
            TrackField::Album => self.album = None,
            TrackField::Isrc => self.isrc = None,
            TrackField::Label => self.label = None,
            TrackField::ReleaseDate => self.release_date = None,
            TrackField::Songwriters => self.songwriters = None,
            TrackField::Producers => self.producers = None,
            TrackField::Publishers => self.publishers = None,
            TrackField::ArtistMbid => self.artist_mbid = None,
            TrackField::SocialLinks => self.social_links = None,
            TrackField::ChartmetricId => self.chartmetric_id = None,
            TrackField::StreamCount => self.stream_count = None,
            TrackField::MlcSongCode => self.mlc_song_code = None,
            TrackField::YoutubeVideoId => self.youtube_video_id = None,
            TrackField::YoutubeViewCount => self.youtube_view_count = None,
            TrackField::ListingScore => self.listing_score = None,
            TrackField::MetadataEnrichedAt => self.metadata_enriched_at = None,
            TrackField::CreditsScrapedAt => self.credits_scraped_at = None,
        }
    }

    /// Copy of this patch with `fields` removed
    pub fn without(&self, fields: &[TrackField]) -> TrackPatch {
        let mut patch = self.clone();
        for field in fields {
            patch.clear(*field);
        }
        patch
    }

    /// Last write wins, field by field
    pub fn merge(&mut self, other: TrackPatch) {
        overwrite(&mut self.album, other.album);
        overwrite(&mut self.isrc, other.isrc);
        overwrite(&mut self.label, other.label);
        overwrite(&mut self.release_date, other.release_date);
        overwrite(&mut self.songwriters, other.songwriters);
        overwrite(&mut self.producers, other.producers);
        overwrite(&mut self.publishers, other.publishers);
        overwrite(&mut self.artist_mbid, other.artist_mbid);
        overwrite(&mut self.social_links, other.social_links);
        overwrite(&mut self.chartmetric_id, other.chartmetric_id);
        overwrite(&mut self.stream_count, other.stream_count);
        overwrite(&mut self.mlc_song_code, other.mlc_song_code);
        overwrite(&mut self.youtube_video_id, other.youtube_video_id);
        overwrite(&mut self.youtube_view_count, other.youtube_view_count);
        overwrite(&mut self.listing_score, other.listing_score);
        overwrite(&mut self.metadata_enriched_at, other.metadata_enriched_at);
        overwrite(&mut self.credits_scraped_at, other.credits_scraped_at);
    }

    /// Write every carried field onto `track`
    pub fn apply_to(&self, track: &mut Track) {
        if let Some(value) = &self.album {
            track.album = Some(value.clone());
        }
        if let Some(value) = &self.isrc {
            track.isrc = Some(value.clone());
        }
        if let Some(value) = &self.label {
            track.label = Some(value.clone());
        }
        if let Some(value) = self.release_date {
            track.release_date = Some(value);
        }
        if let Some(value) = &self.songwriters {
            track.songwriters = value.clone();
        }
        if let Some(value) = &self.producers {
            track.producers = value.clone();
        }
        if let Some(value) = &self.publishers {
            track.publishers = value.clone();
        }
        if let Some(value) = &self.artist_mbid {
            track.artist_mbid = Some(value.clone());
        }
        if let Some(value) = &self.social_links {
            track.social_links = value.clone();
        }
        if let Some(value) = &self.chartmetric_id {
            track.chartmetric_id = Some(value.clone());
        }
        if let Some(value) = self.stream_count {
            track.stream_count = Some(value);
        }
        if let Some(value) = &self.mlc_song_code {
            track.mlc_song_code = Some(value.clone());
        }
        if let Some(value) = &self.youtube_video_id {
            track.youtube_video_id = Some(value.clone());
        }
        if let Some(value) = self.youtube_view_count {
            track.youtube_view_count = Some(value);
        }
        if let Some(value) = self.listing_score {
            track.listing_score = Some(value);
        }
        if let Some(value) = self.metadata_enriched_at {
            track.metadata_enriched_at = Some(value);
        }
        if let Some(value) = self.credits_scraped_at {
            track.credits_scraped_at = Some(value);
        }
    }

    /// Credited names carried by the patch (songwriters, producers, publishers)
    pub fn credited_parties(&self) -> Vec<String> {
        let mut parties: Vec<String> = Vec::new();
        let lists = [&self.songwriters, &self.producers, &self.publishers];
        for name in lists.into_iter().flatten().flatten() {
            if !parties.contains(name) {
                parties.push(name.clone());
            }
        }
        parties
    }
}
