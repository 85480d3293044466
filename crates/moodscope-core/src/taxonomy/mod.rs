pub mod mood;
pub mod rules;

pub use mood::{categorize, intensity, mood_score, MoodCategory};
pub use rules::{EstimationRules, KeywordFamily, TagLexicon};
