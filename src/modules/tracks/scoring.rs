use crate::modules::tracks::domain::Track;

/// Scores a listing row from the credit data staged so far
///
/// The score favours tracks whose songwriters have no publisher yet, that sit
/// outside the major label groups and that already show listener traction.
/// It reads only fields already on the track, so it can run between phases
/// without any I/O.
#[derive(Debug, Clone)]
pub struct ListingScoreCalculator {
    weights: ScoreWeights,
    context: NormalizationContext,
}

#[derive(Debug, Clone)]
struct ScoreWeights {
    publishing_gap: f32,
    label_independence: f32,
    traction: f32,
    credit_completeness: f32,
}

#[derive(Debug, Clone)]
struct NormalizationContext {
    max_streams: f64,
    major_labels: Vec<&'static str>,
}

impl Default for ListingScoreCalculator {
    fn default() -> Self {
        Self {
            weights: ScoreWeights {
                publishing_gap: 0.4,
                label_independence: 0.25,
                traction: 0.25,
                credit_completeness: 0.1,
            },
            context: NormalizationContext {
                max_streams: 100_000_000.0,
                major_labels: vec![
                    "universal",
                    "sony",
                    "warner",
                    "atlantic",
                    "columbia",
                    "interscope",
                    "capitol",
                    "rca",
                ],
            },
        }
    }
}

impl ListingScoreCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0–100, or `None` when the track has no credit data to judge yet
    pub fn calculate(&self, track: &Track) -> Option<i32> {
        if !track.has_credits() && track.credits_scraped_at.is_none() {
            return None;
        }

        let mut parts = Vec::new();

        if let Some(score) = self.publishing_gap(track) {
            parts.push((score, self.weights.publishing_gap));
        }
        if let Some(score) = self.label_independence(track) {
            parts.push((score, self.weights.label_independence));
        }
        if let Some(score) = self.traction(track) {
            parts.push((score, self.weights.traction));
        }
        parts.push((self.credit_completeness(track), self.weights.credit_completeness));

        let total_weight: f32 = parts.iter().map(|(_, weight)| weight).sum();
        if total_weight <= 0.0 {
            return None;
        }
        let weighted: f32 = parts.iter().map(|(score, weight)| score * weight).sum();
        Some(((weighted / total_weight) * 100.0).round().clamp(0.0, 100.0) as i32)
    }

    fn publishing_gap(&self, track: &Track) -> Option<f32> {
        if track.songwriters.is_empty() {
            return None;
        }
        if track.publishers.is_empty() {
            Some(1.0)
        } else {
            // Partially published when some writers outnumber the publishers listed
            let ratio = track.publishers.len() as f32 / track.songwriters.len() as f32;
            Some((1.0 - ratio).clamp(0.0, 1.0) * 0.5)
        }
    }

    fn label_independence(&self, track: &Track) -> Option<f32> {
        let label = track.label.as_ref()?.to_lowercase();
        let is_major = self
            .context
            .major_labels
            .iter()
            .any(|major| label.contains(major));
        Some(if is_major { 0.0 } else { 1.0 })
    }

    fn traction(&self, track: &Track) -> Option<f32> {
        let streams = track.stream_count?.max(0) as f64;
        let normalized = (streams + 1.0).ln() / (self.context.max_streams + 1.0).ln();
        Some(normalized.clamp(0.0, 1.0) as f32)
    }

    fn credit_completeness(&self, track: &Track) -> f32 {
        let mut present = 0.0;
        if !track.songwriters.is_empty() {
            present += 0.5;
        }
        if !track.producers.is_empty() {
            present += 0.25;
        }
        if track.isrc.is_some() {
            present += 0.25;
        }
        present
    }
}
