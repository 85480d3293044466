//! Playlist-level aggregation of per-track features.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{FeatureVector, TrackRecord};
use crate::provenance::Provenance;
use crate::taxonomy::MoodCategory;

/// Energy standard deviation below which a playlist's energies look
/// synthetically uniform.
pub const UNIFORM_ENERGY_STD: f64 = 0.02;

/// Number of tracks in one mood category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodCount {
    pub mood: MoodCategory,
    pub count: usize,
}

/// Aggregate statistics over a non-empty set of track records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub total_tracks: usize,
    pub avg_valence: f64,
    pub avg_energy: f64,
    pub avg_danceability: f64,
    pub avg_mood_score: f64,
    pub avg_intensity: f64,
    /// Means over the vectors that carry the field; `None` if none do.
    pub avg_acousticness: Option<f64>,
    pub avg_instrumentalness: Option<f64>,
    pub avg_speechiness: Option<f64>,
    /// Sample standard deviation of `mood_score`; 0.0 for a single track.
    pub emotional_range: f64,
    pub dominant_mood: MoodCategory,
    /// Category counts in order of first appearance.
    pub mood_distribution: Vec<MoodCount>,
    pub avg_popularity: f64,
    pub total_duration_hours: f64,
    /// Weakest provenance among the included vectors.
    pub provenance: Provenance,
    /// True when any vector did not come from the primary provider tier.
    pub using_estimates: bool,
    /// Secondary signal: energy barely varies across the playlist.
    pub uniform_energy: bool,
}

impl PlaylistSummary {
    /// Count for one category, 0 if it never occurs.
    pub fn count_of(&self, mood: MoodCategory) -> usize {
        self.mood_distribution
            .iter()
            .find(|c| c.mood == mood)
            .map_or(0, |c| c.count)
    }
}

/// Reduce track records to a [`PlaylistSummary`].
///
/// # Errors
///
/// Returns [`Error::EmptyCollection`] when `records` is empty.
pub fn summarize(records: &[TrackRecord]) -> Result<PlaylistSummary> {
    let first = records.first().ok_or(Error::EmptyCollection)?;
    let features: Vec<&FeatureVector> = records.iter().map(|r| &r.features).collect();

    let valence = mean(features.iter().map(|f| f.valence));
    let energy = mean(features.iter().map(|f| f.energy));
    let mood_scores: Vec<f64> = features.iter().map(|f| f.mood_score).collect();
    let energies: Vec<f64> = features.iter().map(|f| f.energy).collect();

    let distribution = distribution(&features);
    let dominant_mood = dominant(&distribution).unwrap_or(first.features.mood_category);

    let provenance = features
        .iter()
        .map(|f| f.provenance)
        .max()
        .unwrap_or(first.features.provenance);
    let using_estimates = features
        .iter()
        .any(|f| f.provenance != Provenance::ProviderReal);
    let uniform_energy = energies.len() > 1 && sample_std(&energies) < UNIFORM_ENERGY_STD;

    let total_ms: u64 = records.iter().map(|r| r.track.duration_ms).sum();

    Ok(PlaylistSummary {
        total_tracks: records.len(),
        avg_valence: valence,
        avg_energy: energy,
        avg_danceability: mean(features.iter().map(|f| f.danceability)),
        avg_mood_score: mean(mood_scores.iter().copied()),
        avg_intensity: mean(features.iter().map(|f| f.intensity)),
        avg_acousticness: optional_mean(features.iter().map(|f| f.acousticness)),
        avg_instrumentalness: optional_mean(features.iter().map(|f| f.instrumentalness)),
        avg_speechiness: optional_mean(features.iter().map(|f| f.speechiness)),
        emotional_range: sample_std(&mood_scores),
        dominant_mood,
        mood_distribution: distribution,
        avg_popularity: mean(records.iter().map(|r| f64::from(r.track.popularity))),
        total_duration_hours: total_ms as f64 / 3_600_000.0,
        provenance,
        using_estimates,
        uniform_energy,
    })
}

fn distribution(features: &[&FeatureVector]) -> Vec<MoodCount> {
    let mut counts: Vec<MoodCount> = Vec::new();
    for f in features {
        match counts.iter_mut().find(|c| c.mood == f.mood_category) {
            Some(c) => c.count += 1,
            None => counts.push(MoodCount {
                mood: f.mood_category,
                count: 1,
            }),
        }
    }
    counts
}

/// Highest count wins; ties go to the category seen first.
fn dominant(counts: &[MoodCount]) -> Option<MoodCategory> {
    let mut best: Option<&MoodCount> = None;
    for c in counts {
        if best.is_none_or(|b| c.count > b.count) {
            best = Some(c);
        }
    }
    best.map(|c| c.mood)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn optional_mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    (!present.is_empty()).then(|| mean(present.iter().copied()))
}

/// Sample (n - 1) standard deviation; 0.0 below two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values.iter().copied());
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureComponents, Track};

    fn record(id: &str, valence: f64, energy: f64, provenance: Provenance) -> TrackRecord {
        let features = FeatureVector::from_components(
            FeatureComponents {
                valence,
                energy,
                danceability: 0.5,
                ..FeatureComponents::default()
            },
            provenance,
        );
        TrackRecord::new(
            Track::new(id, id)
                .with_popularity(Some(60))
                .with_duration_ms(1_800_000),
            features,
        )
    }

    #[test]
    fn test_empty_is_an_error() {
        assert!(matches!(summarize(&[]), Err(Error::EmptyCollection)));
    }

    #[test]
    fn test_single_track() {
        let s = summarize(&[record("a", 0.8, 0.7, Provenance::ProviderReal)]).unwrap();
        assert_eq!(s.total_tracks, 1);
        assert!(s.emotional_range.abs() < f64::EPSILON);
        assert_eq!(s.dominant_mood, MoodCategory::HappyEnergetic);
        assert_eq!(s.count_of(MoodCategory::HappyEnergetic), 1);
        assert!(!s.using_estimates);
        assert!(!s.uniform_energy);
        assert!((s.total_duration_hours - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_means_and_sample_std() {
        let records = [
            record("a", 0.2, 0.2, Provenance::ProviderReal),
            record("b", 0.8, 0.8, Provenance::ProviderReal),
        ];
        let s = summarize(&records).unwrap();
        assert!((s.avg_valence - 0.5).abs() < 1e-12);
        assert!((s.avg_energy - 0.5).abs() < 1e-12);
        // mood scores 0.2 and 0.8; sample std = sqrt(0.18)
        assert!((s.emotional_range - 0.18_f64.sqrt()).abs() < 1e-12);
        assert!((s.avg_popularity - 60.0).abs() < 1e-12);
        assert!((s.total_duration_hours - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distribution_counts_sum_to_total() {
        let records = [
            record("a", 0.9, 0.9, Provenance::ProviderReal),
            record("b", 0.1, 0.1, Provenance::ProviderReal),
            record("c", 0.9, 0.8, Provenance::ProviderReal),
            record("d", 0.5, 0.5, Provenance::ProviderReal),
        ];
        let s = summarize(&records).unwrap();
        let total: usize = s.mood_distribution.iter().map(|c| c.count).sum();
        assert_eq!(total, 4);
        assert_eq!(s.dominant_mood, MoodCategory::HappyEnergetic);
        assert_eq!(s.count_of(MoodCategory::SadCalm), 1);
        assert_eq!(s.count_of(MoodCategory::SadEnergetic), 0);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let records = [
            record("a", 0.1, 0.1, Provenance::ProviderReal),
            record("b", 0.9, 0.9, Provenance::ProviderReal),
            record("c", 0.9, 0.9, Provenance::ProviderReal),
            record("d", 0.1, 0.1, Provenance::ProviderReal),
        ];
        let s = summarize(&records).unwrap();
        assert_eq!(s.dominant_mood, MoodCategory::SadCalm);
        assert_eq!(s.mood_distribution[0].mood, MoodCategory::SadCalm);
    }

    #[test]
    fn test_provenance_flags() {
        let records = [
            record("a", 0.7, 0.8, Provenance::RuleEstimated),
            record("b", 0.6, 0.3, Provenance::RuleEstimated),
        ];
        let s = summarize(&records).unwrap();
        assert!(s.using_estimates);
        assert_eq!(s.provenance, Provenance::RuleEstimated);

        let alt = [record("a", 0.7, 0.8, Provenance::ProviderAltAuth)];
        let s = summarize(&alt).unwrap();
        assert!(s.using_estimates);
        assert_eq!(s.provenance, Provenance::ProviderAltAuth);
    }

    #[test]
    fn test_uniform_energy_is_separate_from_provenance() {
        let records = [
            record("a", 0.2, 0.5, Provenance::ProviderReal),
            record("b", 0.9, 0.5, Provenance::ProviderReal),
        ];
        let s = summarize(&records).unwrap();
        assert!(s.uniform_energy);
        assert!(!s.using_estimates);
    }

    #[test]
    fn test_optional_means_skip_missing() {
        let mut a = record("a", 0.5, 0.5, Provenance::ProviderReal);
        a.features.acousticness = Some(0.4);
        let b = record("b", 0.5, 0.5, Provenance::ProviderReal);
        let s = summarize(&[a, b]).unwrap();
        assert_eq!(s.avg_acousticness, Some(0.4));
        assert_eq!(s.avg_speechiness, None);
    }

    #[test]
    fn test_summary_serializes() {
        let s = summarize(&[record("a", 0.8, 0.7, Provenance::AiEstimated)]).unwrap();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["dominant_mood"], "Happy & Energetic");
        assert_eq!(json["provenance"], "ai-estimated");
        assert_eq!(json["mood_distribution"][0]["count"], 1);
    }
}
