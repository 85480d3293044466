//! Feature acquisition and analysis for moodscope.
//!
//! Talks to the playlist catalog and feature providers, falls back through
//! alternate authorization and metadata estimation, and aggregates the
//! result into a [`PlaylistSummary`](moodscope_core::PlaylistSummary).

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod provider;
pub mod resilience;

pub use analyzer::{Analysis, MoodAnalyzer};
pub use cache::CachedGenreSource;
pub use config::{Config, EstimatorKind};
pub use error::{AnalysisError, AnalysisResult, ProviderError, ProviderErrorKind, ProviderResult};
pub use fallback::{Acquisition, FallbackOrchestrator, Tier};
pub use provider::{Catalog, FeatureSource, GenreSource};
