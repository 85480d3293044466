//! Collaborators the analysis consumes: a playlist catalog, audio-feature
//! sources, and folksonomy tag sources.
//!
//! Everything behind these traits is I/O. The analyzer and the fallback
//! orchestrator only ever see the traits, so any of them can be swapped for
//! the scripted doubles in [`memory`].

use async_trait::async_trait;
use std::fmt;

use moodscope_core::{FeatureComponents, GenreTag, PlaylistId, Track, TrackId};

use crate::error::ProviderResult;

pub mod lastfm;
pub mod memory;
pub mod spotify;

pub use lastfm::{LastFmClient, LastFmTagSource};
pub use memory::{StaticCatalog, StaticFeatures, StaticGenres};
pub use spotify::SpotifyClient;

/// Source of playlist contents.
#[async_trait]
pub trait Catalog: fmt::Debug + Send + Sync {
    /// Ordered tracks of a playlist.
    async fn fetch_tracks(&self, playlist_id: &PlaylistId) -> ProviderResult<Vec<Track>>;
}

/// Source of measured audio features under one authorization mode.
#[async_trait]
pub trait FeatureSource: fmt::Debug + Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Features for a single track. `Ok(None)` means the provider answered
    /// but has nothing for this id.
    async fn probe_feature(&self, track_id: &TrackId) -> ProviderResult<Option<FeatureComponents>>;

    /// Features for up to 50 tracks, aligned with `track_ids`; unavailable
    /// entries are `None`.
    async fn fetch_features_batch(
        &self,
        track_ids: &[TrackId],
    ) -> ProviderResult<Vec<Option<FeatureComponents>>>;
}

/// Best-effort folksonomy tags for a track. Never fails; an unreachable
/// source yields no tags.
#[async_trait]
pub trait GenreSource: fmt::Debug + Send + Sync {
    async fn enrich_genres(&self, track: &Track) -> Vec<GenreTag>;
}
