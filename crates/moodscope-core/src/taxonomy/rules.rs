//! Keyword rules for metadata-based mood estimation.
//!
//! The rules are plain data: a set of keyword families that nudge energy and
//! valence when any of their keywords appears in a track's genre text, a
//! popularity bonus, and a tag lexicon used by the tag-blend estimator.
//! [`EstimationRules::builtin`] carries the defaults; a TOML file can replace
//! them wholesale.
//!
//! # Example
//!
//! ```
//! use moodscope_core::taxonomy::rules::EstimationRules;
//!
//! let rules = EstimationRules::from_toml_str(r#"
//!     [[families]]
//!     name = "lofi"
//!     keywords = ["lo-fi", "lofi"]
//!     energy = -0.25
//! "#).unwrap();
//! assert_eq!(rules.families.len(), 1);
//! assert!(rules.families[0].matches("chill lofi beats"));
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// Top-level container for estimation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationRules {
    /// Starting point for valence and energy before any adjustment.
    #[serde(default = "default_baseline")]
    pub baseline: f64,

    /// Popularity strictly above this earns the popularity bonus.
    #[serde(default = "default_popularity_threshold")]
    pub popularity_threshold: u8,

    /// Added to both valence and energy for popular tracks.
    #[serde(default = "default_popularity_bonus")]
    pub popularity_bonus: f64,

    /// `danceability = energy * danceability_factor`.
    #[serde(default = "default_danceability_factor")]
    pub danceability_factor: f64,

    /// Keyword families, all of which are tested independently.
    #[serde(default = "default_families")]
    pub families: Vec<KeywordFamily>,

    /// Lexicon for scoring weighted folksonomy tags.
    #[serde(default)]
    pub lexicon: TagLexicon,
}

/// Keywords that shift energy and valence when present in genre text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordFamily {
    /// Human-readable family name for traceability.
    pub name: String,

    /// Match if the genre text contains any of these (case-insensitive).
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub energy: f64,

    #[serde(default)]
    pub valence: f64,
}

/// Word lists used to score folksonomy tags.
///
/// Each tag contributes at most one energy delta (the first matching list in
/// high, medium, low order) and at most one valence delta, scaled by the
/// tag's weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagLexicon {
    #[serde(default)]
    pub high_energy: Vec<String>,
    #[serde(default)]
    pub medium_energy: Vec<String>,
    #[serde(default)]
    pub low_energy: Vec<String>,
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
    #[serde(default)]
    pub danceable: Vec<String>,
}

fn default_baseline() -> f64 {
    0.5
}

const fn default_popularity_threshold() -> u8 {
    70
}

fn default_popularity_bonus() -> f64 {
    0.1
}

fn default_danceability_factor() -> f64 {
    0.8
}

fn default_families() -> Vec<KeywordFamily> {
    vec![
        family("upbeat", &["dance", "pop", "electronic", "edm"], 0.2, 0.1),
        family("downcast", &["blues", "sad", "melancholic", "indie"], -0.1, -0.2),
        family("heavy", &["rock", "metal", "punk"], 0.3, 0.0),
        family("calm", &["classical", "ambient", "chill"], -0.2, 0.1),
    ]
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}

fn family(name: &str, keywords: &[&str], energy: f64, valence: f64) -> KeywordFamily {
    KeywordFamily {
        name: name.to_string(),
        keywords: words(keywords),
        energy,
        valence,
    }
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl Default for EstimationRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Default for TagLexicon {
    fn default() -> Self {
        Self {
            high_energy: words(&[
                "rock", "electronic", "dance", "metal", "punk", "techno", "house", "dubstep",
            ]),
            medium_energy: words(&["pop", "indie", "alternative", "hip-hop", "rap"]),
            low_energy: words(&["ambient", "classical", "folk", "acoustic", "ballad", "chill"]),
            positive: words(&[
                "happy", "upbeat", "dance", "party", "fun", "energetic", "cheerful",
            ]),
            negative: words(&[
                "sad", "melancholy", "dark", "depressing", "emotional", "breakup",
            ]),
            danceable: words(&[
                "dance", "electronic", "house", "techno", "disco", "funk", "reggae",
            ]),
        }
    }
}

impl EstimationRules {
    /// The default keyword families.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            baseline: default_baseline(),
            popularity_threshold: default_popularity_threshold(),
            popularity_bonus: default_popularity_bonus(),
            danceability_factor: default_danceability_factor(),
            families: default_families(),
            lexicon: TagLexicon::default(),
        }
    }

    /// Load rules from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_toml_str(&content).map_err(|e| {
            Error::InvalidData(format!(
                "failed to parse estimation rules from {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse rules from TOML text. Anything omitted keeps its built-in value;
    /// a `[[families]]` list replaces the built-in families entirely.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidData(e.to_string()))
    }

    /// Families whose keywords occur in the given lowercased genre text.
    pub fn matching_families<'a>(
        &'a self,
        genre_text: &'a str,
    ) -> impl Iterator<Item = &'a KeywordFamily> + 'a {
        self.families.iter().filter(move |f| f.matches(genre_text))
    }
}

impl KeywordFamily {
    /// Case-insensitive substring match against any keyword.
    pub fn matches(&self, genre_text: &str) -> bool {
        let text = genre_text.to_lowercase();
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
    }
}

impl TagLexicon {
    /// Energy delta for a single tag name.
    pub fn energy_delta(&self, tag: &str) -> Option<f64> {
        if contains_any(tag, &self.high_energy) {
            Some(0.2)
        } else if contains_any(tag, &self.medium_energy) {
            Some(0.1)
        } else if contains_any(tag, &self.low_energy) {
            Some(-0.2)
        } else {
            None
        }
    }

    /// Valence delta for a single tag name.
    pub fn valence_delta(&self, tag: &str) -> Option<f64> {
        if contains_any(tag, &self.positive) {
            Some(0.2)
        } else if contains_any(tag, &self.negative) {
            Some(-0.2)
        } else {
            None
        }
    }

    /// Danceability delta for a single tag name.
    pub fn danceability_delta(&self, tag: &str) -> Option<f64> {
        contains_any(tag, &self.danceable).then_some(0.2)
    }
}

fn contains_any(tag: &str, list: &[String]) -> bool {
    let tag = tag.to_lowercase();
    list.iter()
        .any(|w| !w.is_empty() && tag.contains(&w.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_four_families() {
        let rules = EstimationRules::builtin();
        assert_eq!(rules.families.len(), 4);
        assert!((rules.baseline - 0.5).abs() < f64::EPSILON);
        assert_eq!(rules.popularity_threshold, 70);
    }

    #[test]
    fn test_family_matching_is_substring_and_case_insensitive() {
        let rules = EstimationRules::builtin();
        let names: Vec<&str> = rules
            .matching_families("Punjabi Pop, Hard Rock")
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["upbeat", "heavy"]);
    }

    #[test]
    fn test_all_matching_families_apply() {
        let rules = EstimationRules::builtin();
        let count = rules.matching_families("indie rock chill").count();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_no_family_matches_empty_text() {
        let rules = EstimationRules::builtin();
        assert_eq!(rules.matching_families("").count(), 0);
    }

    #[test]
    fn test_from_toml_defaults_scalars() {
        let rules = EstimationRules::from_toml_str(
            r#"
            popularity_threshold = 90

            [[families]]
            name = "jazz"
            keywords = ["jazz", "swing"]
            valence = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(rules.popularity_threshold, 90);
        assert!((rules.popularity_bonus - 0.1).abs() < f64::EPSILON);
        assert_eq!(rules.families.len(), 1);
        assert!(rules.families[0].energy.abs() < f64::EPSILON);
        assert!(rules.families[0].matches("Smooth Jazz"));
        assert!(!rules.lexicon.positive.is_empty());
    }

    #[test]
    fn test_from_toml_empty_is_builtin() {
        let rules = EstimationRules::from_toml_str("").unwrap();
        assert_eq!(rules, EstimationRules::builtin());
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let result = EstimationRules::from_toml_str("baseline = \"high\"");
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = EstimationRules::load(Path::new("/nonexistent/rules.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(
            &path,
            "[[families]]\nname = \"x\"\nkeywords = [\"x\"]\nenergy = 0.1\n",
        )
        .unwrap();
        let rules = EstimationRules::load(&path).unwrap();
        assert_eq!(rules.families[0].name, "x");
    }

    #[test]
    fn test_lexicon_deltas() {
        let lexicon = TagLexicon::default();
        assert_eq!(lexicon.energy_delta("Hard Rock"), Some(0.2));
        assert_eq!(lexicon.energy_delta("indie"), Some(0.1));
        assert_eq!(lexicon.energy_delta("acoustic"), Some(-0.2));
        assert_eq!(lexicon.energy_delta("baroque"), None);
        assert_eq!(lexicon.valence_delta("party anthems"), Some(0.2));
        assert_eq!(lexicon.valence_delta("breakup songs"), Some(-0.2));
        assert_eq!(lexicon.danceability_delta("disco"), Some(0.2));
        assert_eq!(lexicon.danceability_delta("ballad"), None);
    }
}
