use serde::{Deserialize, Serialize};

use crate::model::track::Track;
use crate::provenance::Provenance;
use crate::taxonomy::mood::{self, MoodCategory};

/// Danceability assigned to the neutral fallback vector.
pub const NEUTRAL_DANCEABILITY: f64 = 0.4;

/// Raw, not yet categorized feature values.
///
/// Out-of-range values are clamped into `[0, 1]` and non-finite values are
/// replaced by neutral defaults when a [`FeatureVector`] is built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureComponents {
    pub valence: f64,
    pub energy: f64,
    pub danceability: f64,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub instrumentalness: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
}

impl FeatureComponents {
    /// Every present component is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.valence, self.energy, self.danceability]
            .into_iter()
            .chain(self.acousticness)
            .chain(self.instrumentalness)
            .chain(self.speechiness)
            .all(f64::is_finite)
    }
}

/// Categorized mood features of one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub valence: f64,
    pub energy: f64,
    pub danceability: f64,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub speechiness: Option<f64>,
    /// `0.6 * valence + 0.4 * energy`.
    pub mood_score: f64,
    /// Distance of `(valence, energy)` from `(0.5, 0.5)`.
    pub intensity: f64,
    pub mood_category: MoodCategory,
    pub provenance: Provenance,
}

impl FeatureVector {
    /// Validate raw components and derive the mood fields.
    #[must_use]
    pub fn from_components(components: FeatureComponents, provenance: Provenance) -> Self {
        let valence = unit(components.valence, 0.5);
        let energy = unit(components.energy, 0.5);

        Self {
            valence,
            energy,
            danceability: unit(components.danceability, NEUTRAL_DANCEABILITY),
            acousticness: components.acousticness.and_then(optional_unit),
            instrumentalness: components.instrumentalness.and_then(optional_unit),
            speechiness: components.speechiness.and_then(optional_unit),
            mood_score: mood::mood_score(valence, energy),
            intensity: mood::intensity(valence, energy),
            mood_category: mood::categorize(valence, energy),
            provenance,
        }
    }

    /// The fixed fallback vector used when estimation cannot produce a
    /// usable result.
    #[must_use]
    pub fn neutral(provenance: Provenance) -> Self {
        Self::from_components(
            FeatureComponents {
                valence: 0.5,
                energy: 0.5,
                danceability: NEUTRAL_DANCEABILITY,
                ..FeatureComponents::default()
            },
            provenance,
        )
    }

    /// Every bounded field is finite and within `[0, 1]`.
    pub fn is_bounded(&self) -> bool {
        [
            self.valence,
            self.energy,
            self.danceability,
            self.mood_score,
            self.intensity,
        ]
        .into_iter()
        .chain(self.acousticness)
        .chain(self.instrumentalness)
        .chain(self.speechiness)
        .all(|x| x.is_finite() && (0.0..=1.0).contains(&x))
    }
}

/// A track paired with its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track: Track,
    pub features: FeatureVector,
}

impl TrackRecord {
    #[must_use]
    pub fn new(track: Track, features: FeatureVector) -> Self {
        Self { track, features }
    }
}

fn unit(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn optional_unit(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(valence: f64, energy: f64) -> FeatureComponents {
        FeatureComponents {
            valence,
            energy,
            danceability: 0.5,
            ..FeatureComponents::default()
        }
    }

    #[test]
    fn test_from_components_derives_mood_fields() {
        let fv = FeatureVector::from_components(components(0.8, 0.7), Provenance::ProviderReal);
        assert!((fv.mood_score - (0.8 * 0.6 + 0.7 * 0.4)).abs() < 1e-12);
        assert!((fv.intensity - (0.3_f64.powi(2) + 0.2_f64.powi(2)).sqrt()).abs() < 1e-12);
        assert_eq!(fv.mood_category, MoodCategory::HappyEnergetic);
        assert_eq!(fv.provenance, Provenance::ProviderReal);
    }

    #[test]
    fn test_from_components_clamps_out_of_range() {
        let mut c = components(1.7, -0.3);
        c.acousticness = Some(2.0);
        let fv = FeatureVector::from_components(c, Provenance::ProviderReal);
        assert!((fv.valence - 1.0).abs() < f64::EPSILON);
        assert!(fv.energy.abs() < f64::EPSILON);
        assert_eq!(fv.acousticness, Some(1.0));
        assert!(fv.is_bounded());
    }

    #[test]
    fn test_from_components_replaces_non_finite() {
        let mut c = components(f64::NAN, f64::INFINITY);
        c.danceability = f64::NAN;
        c.speechiness = Some(f64::NAN);
        let fv = FeatureVector::from_components(c, Provenance::RuleEstimated);
        assert!((fv.valence - 0.5).abs() < f64::EPSILON);
        assert!((fv.energy - 0.5).abs() < f64::EPSILON);
        assert!((fv.danceability - NEUTRAL_DANCEABILITY).abs() < f64::EPSILON);
        assert_eq!(fv.speechiness, None);
        assert!(fv.is_bounded());
    }

    #[test]
    fn test_neutral_vector() {
        let fv = FeatureVector::neutral(Provenance::RuleEstimated);
        assert!((fv.valence - 0.5).abs() < f64::EPSILON);
        assert!((fv.energy - 0.5).abs() < f64::EPSILON);
        assert!((fv.mood_score - 0.5).abs() < 1e-12);
        assert!((fv.danceability - 0.4).abs() < f64::EPSILON);
        assert!(fv.intensity.abs() < f64::EPSILON);
        assert_eq!(fv.mood_category, MoodCategory::Neutral);
    }

    #[test]
    fn test_serde_keeps_every_field() {
        let mut c = components(0.3, 0.9);
        c.instrumentalness = Some(0.25);
        let fv = FeatureVector::from_components(c, Provenance::ProviderAltAuth);
        let json = serde_json::to_value(fv).unwrap();
        assert_eq!(json["provenance"], "provider-alt-auth");
        assert_eq!(json["mood_category"], "Sad & Energetic");
        let back: FeatureVector = serde_json::from_value(json).unwrap();
        assert!((back.mood_score - fv.mood_score).abs() < 1e-12);
        assert!((back.intensity - fv.intensity).abs() < 1e-12);
        assert_eq!(back.instrumentalness, Some(0.25));
        assert_eq!(back.acousticness, None);
        assert_eq!(back.mood_category, fv.mood_category);
        assert_eq!(back.provenance, fv.provenance);
    }
}
