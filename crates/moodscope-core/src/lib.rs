//! Core mood model for moodscope.
//!
//! Feature vectors and their provenance, the valence/energy mood taxonomy,
//! metadata-based estimation, playlist aggregation, and the SQLite analysis
//! log. Nothing in this crate touches the network.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod estimate;
pub mod model;
pub mod provenance;
pub mod schema;
pub mod summary;
pub mod taxonomy;

pub use error::{Error, Result};
pub use estimate::{FeatureEstimator, RuleEstimator, TagBlendEstimator};
pub use model::{
    FeatureComponents, FeatureVector, GenreTag, PlaylistId, Track, TrackId, TrackRecord,
};
pub use provenance::Provenance;
pub use schema::{AnalysisEntry, AnalysisLog};
pub use summary::{summarize, MoodCount, PlaylistSummary};
pub use taxonomy::{EstimationRules, MoodCategory};
