//! Valence/energy mood taxonomy.
//!
//! Four corner categories around a neutral centre. Boundaries are inclusive
//! on the high side (`>= 0.6`) and exclusive on the low side (`< 0.4`), so a
//! value sitting exactly on a threshold always lands in the same category.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Lower bound (inclusive) of the "high" band for valence and energy.
pub const HIGH_THRESHOLD: f64 = 0.6;

/// Upper bound (exclusive) of the "low" band for valence and energy.
pub const LOW_THRESHOLD: f64 = 0.4;

/// Weight of valence in the mood score; energy takes the remainder.
pub const VALENCE_WEIGHT: f64 = 0.6;

/// A discrete mood label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoodCategory {
    #[serde(rename = "Happy & Energetic", alias = "Energetic & Happy")]
    HappyEnergetic,
    #[serde(rename = "Happy & Calm")]
    HappyCalm,
    #[serde(rename = "Sad & Energetic")]
    SadEnergetic,
    #[serde(rename = "Sad & Calm")]
    SadCalm,
    #[serde(rename = "Neutral")]
    Neutral,
}

impl MoodCategory {
    pub const ALL: [Self; 5] = [
        Self::HappyEnergetic,
        Self::HappyCalm,
        Self::SadEnergetic,
        Self::SadCalm,
        Self::Neutral,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HappyEnergetic => "Happy & Energetic",
            Self::HappyCalm => "Happy & Calm",
            Self::SadEnergetic => "Sad & Energetic",
            Self::SadCalm => "Sad & Calm",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for MoodCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MoodCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("Energetic & Happy") {
            return Ok(Self::HappyEnergetic);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidData(format!("unknown mood category: {s}")))
    }
}

/// Map a `(valence, energy)` pair to its mood category.
#[must_use]
pub fn categorize(valence: f64, energy: f64) -> MoodCategory {
    let happy = valence >= HIGH_THRESHOLD;
    let sad = valence < LOW_THRESHOLD;
    let energetic = energy >= HIGH_THRESHOLD;
    let calm = energy < LOW_THRESHOLD;

    if happy && energetic {
        MoodCategory::HappyEnergetic
    } else if happy {
        MoodCategory::HappyCalm
    } else if sad && energetic {
        MoodCategory::SadEnergetic
    } else if sad && calm {
        MoodCategory::SadCalm
    } else {
        MoodCategory::Neutral
    }
}

/// Weighted blend of valence and energy, 0.0 to 1.0.
#[must_use]
pub fn mood_score(valence: f64, energy: f64) -> f64 {
    valence * VALENCE_WEIGHT + energy * (1.0 - VALENCE_WEIGHT)
}

/// Euclidean distance of `(valence, energy)` from the neutral centre.
#[must_use]
pub fn intensity(valence: f64, energy: f64) -> f64 {
    (valence - 0.5).hypot(energy - 0.5)
}
