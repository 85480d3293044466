//! Metadata-based feature estimation.
//!
//! Used when the provider cannot supply measured audio features. Both
//! estimators are pure and deterministic: the same track and tags always
//! yield the same vector.

use std::fmt;

use crate::model::{FeatureComponents, FeatureVector, GenreTag, Track};
use crate::provenance::Provenance;
use crate::taxonomy::rules::EstimationRules;

/// Upper bound on the number of tags the tag blend looks at.
pub const MAX_BLEND_TAGS: usize = 5;

/// Produces a feature vector from track metadata alone.
pub trait FeatureEstimator: fmt::Debug + Send + Sync {
    /// Provenance stamped on every vector this estimator returns.
    fn provenance(&self) -> Provenance;

    /// Whether folksonomy tags should be fetched for this track before
    /// estimating.
    fn wants_tags(&self, track: &Track) -> bool;

    /// Estimate features. Never fails; unusable input yields the neutral
    /// vector.
    fn estimate(&self, track: &Track, tags: &[GenreTag]) -> FeatureVector;
}

/// Keyword-rule estimator.
///
/// Starts both valence and energy at the baseline, applies every matching
/// keyword family, adds the popularity bonus, clamps, and derives
/// danceability from energy.
#[derive(Debug, Clone, Default)]
pub struct RuleEstimator {
    rules: EstimationRules,
}

impl RuleEstimator {
    #[must_use]
    pub fn new(rules: EstimationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &EstimationRules {
        &self.rules
    }

    fn components(&self, track: &Track, tags: &[GenreTag]) -> FeatureComponents {
        let rules = &self.rules;
        let text = genre_text(track, tags);

        let mut valence = rules.baseline;
        let mut energy = rules.baseline;
        for family in rules.matching_families(&text) {
            energy += family.energy;
            valence += family.valence;
        }
        if track.popularity > rules.popularity_threshold {
            energy += rules.popularity_bonus;
            valence += rules.popularity_bonus;
        }

        let energy = energy.clamp(0.0, 1.0);
        FeatureComponents {
            valence: valence.clamp(0.0, 1.0),
            energy,
            danceability: (energy * rules.danceability_factor).clamp(0.0, 1.0),
            ..FeatureComponents::default()
        }
    }
}

impl FeatureEstimator for RuleEstimator {
    fn provenance(&self) -> Provenance {
        Provenance::RuleEstimated
    }

    fn wants_tags(&self, track: &Track) -> bool {
        track.genres.is_empty()
    }

    fn estimate(&self, track: &Track, tags: &[GenreTag]) -> FeatureVector {
        let components = self.components(track, tags);
        finish(track, components, self.provenance())
    }
}

/// Blends the keyword rules with a lexicon score over weighted tags.
///
/// Each component is `(rule * w + tags * c) / (w + c)` where `c` is the
/// summed weight of tags that matched the lexicon, capped at 1. With no
/// matching tags the result equals the rule estimate.
#[derive(Debug, Clone)]
pub struct TagBlendEstimator {
    rule: RuleEstimator,
    rule_weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct TagSignal {
    valence: f64,
    energy: f64,
    danceability: f64,
    confidence: f64,
}

impl TagBlendEstimator {
    #[must_use]
    pub fn new(rules: EstimationRules) -> Self {
        Self {
            rule: RuleEstimator::new(rules),
            rule_weight: 1.0,
        }
    }

    fn tag_signal(&self, tags: &[GenreTag]) -> Option<TagSignal> {
        let lexicon = &self.rule.rules().lexicon;
        let mut valence = 0.0;
        let mut energy = 0.0;
        let mut danceability = 0.0;
        let mut matched = 0.0;

        for tag in tags.iter().take(MAX_BLEND_TAGS) {
            if !tag.weight.is_finite() || tag.weight <= 0.0 {
                continue;
            }
            let weight = tag.weight.min(1.0);
            let e = lexicon.energy_delta(&tag.name);
            let v = lexicon.valence_delta(&tag.name);
            let d = lexicon.danceability_delta(&tag.name);
            if e.is_none() && v.is_none() && d.is_none() {
                continue;
            }
            energy += e.unwrap_or(0.0) * weight;
            valence += v.unwrap_or(0.0) * weight;
            danceability += d.unwrap_or(0.0) * weight;
            matched += weight;
        }

        (matched > 0.0).then(|| TagSignal {
            valence: (0.5 + valence).clamp(0.0, 1.0),
            energy: (0.5 + energy).clamp(0.0, 1.0),
            danceability: (0.5 + danceability).clamp(0.0, 1.0),
            confidence: matched.min(1.0),
        })
    }
}

impl Default for TagBlendEstimator {
    fn default() -> Self {
        Self::new(EstimationRules::builtin())
    }
}

impl FeatureEstimator for TagBlendEstimator {
    fn provenance(&self) -> Provenance {
        Provenance::AiEstimated
    }

    fn wants_tags(&self, _track: &Track) -> bool {
        true
    }

    fn estimate(&self, track: &Track, tags: &[GenreTag]) -> FeatureVector {
        let mut components = self.rule.components(track, tags);
        if let Some(signal) = self.tag_signal(tags) {
            let w = self.rule_weight;
            let c = signal.confidence;
            let blend = |rule: f64, tag: f64| (rule * w + tag * c) / (w + c);
            components.valence = blend(components.valence, signal.valence);
            components.energy = blend(components.energy, signal.energy);
            components.danceability = blend(components.danceability, signal.danceability);
        }
        finish(track, components, self.provenance())
    }
}

/// Genre text the keyword families are matched against. Tags stand in for
/// genres only when the track carries none.
fn genre_text(track: &Track, tags: &[GenreTag]) -> String {
    if track.genres.is_empty() {
        tags.iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    } else {
        track.genres.join(" ").to_lowercase()
    }
}

fn finish(track: &Track, components: FeatureComponents, provenance: Provenance) -> FeatureVector {
    if !components.is_finite() {
        log::warn!(
            "Estimation for track {} produced non-finite values, using neutral features",
            track.id
        );
        return FeatureVector::neutral(provenance);
    }
    let fv = FeatureVector::from_components(components, provenance);
    if fv.is_bounded() {
        fv
    } else {
        FeatureVector::neutral(provenance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::MoodCategory;

    fn track(genres: &[&str], popularity: u32) -> Track {
        Track::new("t1", "Test")
            .with_genres(genres.iter().copied())
            .with_popularity(Some(popularity))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_popular_dance_pop() {
        let fv = RuleEstimator::default().estimate(&track(&["dance pop"], 80), &[]);
        assert!(close(fv.valence, 0.7));
        assert!(close(fv.energy, 0.8));
        assert!(close(fv.danceability, 0.64));
        assert_eq!(fv.mood_category, MoodCategory::HappyEnergetic);
        assert_eq!(fv.provenance, Provenance::RuleEstimated);
    }

    #[test]
    fn test_classical_unpopular() {
        let fv = RuleEstimator::default().estimate(&track(&["classical"], 40), &[]);
        assert!(close(fv.valence, 0.6));
        assert!(close(fv.energy, 0.3));
        assert_eq!(fv.mood_category, MoodCategory::HappyCalm);
    }

    #[test]
    fn test_no_genres_is_baseline() {
        let fv = RuleEstimator::default().estimate(&track(&[], 50), &[]);
        assert!(close(fv.valence, 0.5));
        assert!(close(fv.energy, 0.5));
        assert!(close(fv.danceability, 0.4));
        assert_eq!(fv.mood_category, MoodCategory::Neutral);
    }

    #[test]
    fn test_every_matching_family_applies() {
        // heavy (+0.3 energy) and downcast (-0.1 energy, -0.2 valence)
        let fv = RuleEstimator::default().estimate(&track(&["indie rock"], 10), &[]);
        assert!(close(fv.energy, 0.7));
        assert!(close(fv.valence, 0.3));
        assert_eq!(fv.mood_category, MoodCategory::SadEnergetic);
    }

    #[test]
    fn test_popularity_threshold_is_strict() {
        let at = RuleEstimator::default().estimate(&track(&[], 70), &[]);
        let above = RuleEstimator::default().estimate(&track(&[], 71), &[]);
        assert!(close(at.energy, 0.5));
        assert!(close(above.energy, 0.6));
    }

    #[test]
    fn test_clamps_to_unit_range() {
        let fv = RuleEstimator::default()
            .estimate(&track(&["dance", "metal", "edm", "pop"], 100), &[]);
        assert!(fv.energy <= 1.0);
        assert!(fv.is_bounded());
    }

    #[test]
    fn test_tags_used_only_without_genres() {
        let tags = vec![GenreTag::new("classical", 1.0)];
        let est = RuleEstimator::default();

        let bare = track(&[], 50);
        assert!(est.wants_tags(&bare));
        assert!(close(est.estimate(&bare, &tags).energy, 0.3));

        let tagged = track(&["rock"], 50);
        assert!(!est.wants_tags(&tagged));
        assert!(close(est.estimate(&tagged, &tags).energy, 0.8));
    }

    #[test]
    fn test_non_finite_rules_fall_back_to_neutral() {
        let rules = EstimationRules::from_toml_str(
            "[[families]]\nname = \"broken\"\nkeywords = [\"pop\"]\nenergy = nan\n",
        )
        .unwrap();
        let fv = RuleEstimator::new(rules).estimate(&track(&["pop"], 50), &[]);
        assert!(close(fv.valence, 0.5));
        assert!(close(fv.energy, 0.5));
        assert!(close(fv.danceability, 0.4));
        assert!(fv.intensity.abs() < 1e-12);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let est = TagBlendEstimator::default();
        let t = track(&["chill"], 75);
        let tags = vec![GenreTag::new("happy", 0.7)];
        assert_eq!(est.estimate(&t, &tags), est.estimate(&t, &tags));
    }

    #[test]
    fn test_blend_without_matching_tags_equals_rules() {
        let t = track(&["dance pop"], 80);
        let blend = TagBlendEstimator::default().estimate(&t, &[GenreTag::new("seen live", 1.0)]);
        let rule = RuleEstimator::default().estimate(&t, &[]);
        assert!(close(blend.valence, rule.valence));
        assert!(close(blend.energy, rule.energy));
        assert_eq!(blend.provenance, Provenance::AiEstimated);
    }

    #[test]
    fn test_blend_moves_toward_tags() {
        let t = track(&["jazz"], 50);
        let tags = vec![GenreTag::new("sad", 1.0), GenreTag::new("ambient", 1.0)];
        let fv = TagBlendEstimator::default().estimate(&t, &tags);
        // rule: v 0.5, e 0.5; tags: v 0.3, e 0.3 with confidence capped at 1
        assert!(close(fv.valence, (0.5 + 0.3) / 2.0));
        assert!(close(fv.energy, (0.5 + 0.3) / 2.0));
        assert!(fv.is_bounded());
    }

    #[test]
    fn test_blend_ignores_bad_weights() {
        let t = track(&["jazz"], 50);
        let tags = vec![
            GenreTag::new("happy", f64::NAN),
            GenreTag::new("sad", -1.0),
        ];
        let fv = TagBlendEstimator::default().estimate(&t, &tags);
        assert!(close(fv.valence, 0.5));
    }
}
