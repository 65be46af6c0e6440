/// The fixed catalogue of enrichment phases
///
/// Phases run in declaration order. `Metadata` is the primary phase: its hard
/// errors decide whether a job ends `completed` or `completed_with_errors`.
use crate::modules::tracks::domain::{Track, TrackPatch};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Metadata,
    Credits,
    Identity,
    Analytics,
    Rights,
    Video,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 6] = [
        PhaseKind::Metadata,
        PhaseKind::Credits,
        PhaseKind::Identity,
        PhaseKind::Analytics,
        PhaseKind::Rights,
        PhaseKind::Video,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Metadata => "metadata",
            PhaseKind::Credits => "credits",
            PhaseKind::Identity => "identity",
            PhaseKind::Analytics => "analytics",
            PhaseKind::Rights => "rights",
            PhaseKind::Video => "video",
        }
    }

    /// Human-readable name used in job logs
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::Metadata => "Metadata",
            PhaseKind::Credits => "Credits",
            PhaseKind::Identity => "Artist identity",
            PhaseKind::Analytics => "Streaming analytics",
            PhaseKind::Rights => "Publishing rights",
            PhaseKind::Video => "Video",
        }
    }

    /// 1-based position in the run order
    pub fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| kind == self)
            .map(|index| index + 1)
            .unwrap_or(0)
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, PhaseKind::Metadata)
    }

    /// Lookups keyed by recording code cannot run without one
    pub fn requires_isrc(&self) -> bool {
        matches!(
            self,
            PhaseKind::Identity | PhaseKind::Analytics | PhaseKind::Rights | PhaseKind::Video
        )
    }

    pub fn prerequisite_met(&self, track: &Track) -> bool {
        if self.requires_isrc() {
            return track
                .isrc
                .as_deref()
                .map(|isrc| !isrc.trim().is_empty())
                .unwrap_or(false);
        }
        true
    }

    /// Default idempotence check: does `track` still lack what this phase provides
    pub fn needs_work(&self, track: &Track) -> bool {
        match self {
            PhaseKind::Metadata => track.metadata_enriched_at.is_none(),
            PhaseKind::Credits => track.credits_scraped_at.is_none(),
            PhaseKind::Identity => track.artist_mbid.is_none() || track.social_links.is_empty(),
            PhaseKind::Analytics => track.chartmetric_id.is_none() || track.stream_count.is_none(),
            PhaseKind::Rights => track.mlc_song_code.is_none() || track.publishers.is_empty(),
            PhaseKind::Video => {
                track.youtube_video_id.is_none() || track.youtube_view_count.is_none()
            }
        }
    }

    /// Set this phase's completion marker on a patch that found data
    pub fn stamp(&self, patch: &mut TrackPatch) {
        match self {
            PhaseKind::Metadata if patch.metadata_enriched_at.is_none() => {
                patch.metadata_enriched_at = Some(Utc::now());
            }
            PhaseKind::Credits if patch.credits_scraped_at.is_none() => {
                patch.credits_scraped_at = Some(Utc::now());
            }
            _ => {}
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown phase: {}", s))
    }
}

/// Per-phase tallies; every considered track lands in exactly one bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub enriched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped_done: usize,
    pub skipped_quota: usize,
    #[serde(skip)]
    pub enriched_ids: Vec<uuid::Uuid>,
}

impl PhaseReport {
    pub fn considered(&self) -> usize {
        self.enriched + self.not_found + self.failed + self.skipped_done + self.skipped_quota
    }

    pub fn summary(&self, phase: PhaseKind) -> String {
        let mut line = format!(
            "{}: {} enriched, {} not found, {} failed",
            phase.label(),
            self.enriched,
            self.not_found,
            self.failed
        );
        if self.skipped_done > 0 {
            line.push_str(&format!(", {} already done", self.skipped_done));
        }
        if self.skipped_quota > 0 {
            line.push_str(&format!(", {} skipped: quota", self.skipped_quota));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_declared_order() {
        let mut shuffled = vec![PhaseKind::Video, PhaseKind::Metadata, PhaseKind::Rights];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![PhaseKind::Metadata, PhaseKind::Rights, PhaseKind::Video]
        );
        assert_eq!(PhaseKind::Metadata.position(), 1);
        assert_eq!(PhaseKind::Video.position(), 6);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Credits".parse::<PhaseKind>().unwrap(), PhaseKind::Credits);
        assert!("lyrics".parse::<PhaseKind>().is_err());
    }

    #[test]
    fn isrc_lookups_need_an_isrc() {
        let mut track = Track::new("Song", "Artist");
        assert!(!PhaseKind::Analytics.prerequisite_met(&track));
        assert!(PhaseKind::Credits.prerequisite_met(&track));

        track.isrc = Some("   ".to_string());
        assert!(!PhaseKind::Video.prerequisite_met(&track));

        track.isrc = Some("USRC17607839".to_string());
        assert!(PhaseKind::Video.prerequisite_met(&track));
    }

    #[test]
    fn stamp_marks_only_phases_with_markers() {
        let mut patch = TrackPatch::new();
        PhaseKind::Video.stamp(&mut patch);
        assert!(patch.is_empty());

        PhaseKind::Credits.stamp(&mut patch);
        assert!(patch.credits_scraped_at.is_some());
    }

    #[test]
    fn summary_mentions_quota_skips() {
        let report = PhaseReport {
            enriched: 2,
            skipped_quota: 3,
            ..Default::default()
        };
        assert_eq!(
            report.summary(PhaseKind::Video),
            "Video: 2 enriched, 0 not found, 0 failed, 3 skipped: quota"
        );
        assert_eq!(report.considered(), 5);
    }
}
