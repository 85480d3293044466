//! Playlist analysis entry point.
//!
//! [`MoodAnalyzer::analyze`] resolves a playlist reference, fetches its
//! tracks, acquires features through the [`FallbackOrchestrator`] and
//! aggregates them, all under a single timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;

use moodscope_core::{
    EstimationRules, FeatureEstimator, PlaylistId, PlaylistSummary, RuleEstimator,
    TagBlendEstimator, TrackId, TrackRecord,
};

use crate::cache::CachedGenreSource;
use crate::config::{Config, EstimatorKind};
use crate::error::{AnalysisError, AnalysisResult};
use crate::fallback::FallbackOrchestrator;
use crate::provider::{Catalog, FeatureSource, GenreSource, LastFmTagSource, SpotifyClient};

/// Default number of tracks analyzed per playlist.
pub const DEFAULT_MAX_TRACKS: usize = 100;

/// Default ceiling on one analysis run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of analyzing one playlist.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub playlist_id: PlaylistId,
    pub records: Vec<TrackRecord>,
    pub summary: PlaylistSummary,
    /// Tracks the provider returned no features for.
    pub unmatched: Vec<TrackId>,
    /// Original track count when the playlist was cut to the track cap.
    pub truncated_from: Option<usize>,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MoodAnalyzer {
    catalog: Arc<dyn Catalog>,
    orchestrator: FallbackOrchestrator,
    max_tracks: usize,
    timeout: Duration,
}

impl MoodAnalyzer {
    pub fn new(catalog: Arc<dyn Catalog>, orchestrator: FallbackOrchestrator) -> Self {
        Self {
            catalog,
            orchestrator,
            max_tracks: DEFAULT_MAX_TRACKS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_tracks(mut self, max_tracks: usize) -> Self {
        self.max_tracks = max_tracks.max(1);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wire the Spotify and Last.fm clients described by `config`.
    ///
    /// A user token makes user authorization the primary tier, with client
    /// credentials (when configured) as the alternate. Without a user token
    /// client credentials are the only provider tier.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let (primary, alternate) =
            match (config.spotify_user_token(), config.spotify_credentials()) {
                (Some(token), credentials) => {
                    let user = SpotifyClient::with_user_token(token)?;
                    let alternate = match credentials {
                        Some((id, secret)) => {
                            Some(Arc::new(SpotifyClient::with_client_credentials(id, secret)?))
                        }
                        None => None,
                    };
                    (Arc::new(user), alternate)
                }
                (None, Some((id, secret))) => (
                    Arc::new(SpotifyClient::with_client_credentials(id, secret)?),
                    None,
                ),
                (None, None) => bail!(
                    "No Spotify credentials configured. Set spotify_client_id and \
                     spotify_client_secret (or spotify_user_token) with `moodscope config set`"
                ),
            };

        let rules = match &config.rules_path {
            Some(path) => EstimationRules::load(path).with_context(|| {
                format!("Failed to load estimation rules from {}", path.display())
            })?,
            None => EstimationRules::builtin(),
        };

        let estimator: Arc<dyn FeatureEstimator> = match config.estimator {
            EstimatorKind::Rule => Arc::new(RuleEstimator::new(rules)),
            EstimatorKind::TagBlend => {
                if config.lastfm_api_key().is_none() {
                    log::warn!("tag-blend estimator without a Last.fm API key uses rules only");
                }
                Arc::new(TagBlendEstimator::new(rules))
            }
        };

        let catalog: Arc<dyn Catalog> = Arc::clone(&primary) as Arc<dyn Catalog>;
        let mut orchestrator = FallbackOrchestrator::new(primary, estimator)
            .with_batch_size(config.effective_batch_size());
        if let Some(alternate) = alternate {
            orchestrator = orchestrator.with_alternate(alternate as Arc<dyn FeatureSource>);
        }
        if let Some(key) = config.lastfm_api_key() {
            let genres = CachedGenreSource::new(LastFmTagSource::new(key)?);
            orchestrator = orchestrator.with_genres(Arc::new(genres) as Arc<dyn GenreSource>);
        }

        Ok(Self::new(catalog, orchestrator)
            .with_max_tracks(config.max_tracks)
            .with_timeout(config.timeout()))
    }

    /// Analyze the playlist named by `playlist` (id, URI or URL).
    pub async fn analyze(&self, playlist: &str) -> AnalysisResult<Analysis> {
        let playlist_id = PlaylistId::parse(playlist)
            .map_err(|_| AnalysisError::InvalidPlaylistId(playlist.to_string()))?;

        if let Ok(result) = tokio::time::timeout(self.timeout, self.run(&playlist_id)).await {
            result
        } else {
            log::warn!("Analysis of playlist {} timed out", playlist_id);
            Err(AnalysisError::Timeout(self.timeout))
        }
    }

    /// Aggregate already acquired records.
    pub fn summarize(&self, records: &[TrackRecord]) -> AnalysisResult<PlaylistSummary> {
        Ok(moodscope_core::summarize(records)?)
    }

    async fn run(&self, playlist_id: &PlaylistId) -> AnalysisResult<Analysis> {
        log::info!("Analyzing playlist {}", playlist_id);

        let mut tracks = self
            .catalog
            .fetch_tracks(playlist_id)
            .await
            .map_err(|e| AnalysisError::from_playlist_fetch(playlist_id, &e))?;

        if tracks.is_empty() {
            return Err(AnalysisError::EmptyPlaylist(playlist_id.clone()));
        }

        let truncated_from = (tracks.len() > self.max_tracks).then(|| {
            log::warn!(
                "Playlist {} has {} tracks, analyzing the first {}",
                playlist_id,
                tracks.len(),
                self.max_tracks
            );
            let total = tracks.len();
            tracks.truncate(self.max_tracks);
            total
        });

        let acquisition = self.orchestrator.acquire(&tracks).await;
        let summary = self.summarize(&acquisition.records)?;
        log::info!(
            "Playlist {}: {} tracks, dominant mood {} ({})",
            playlist_id,
            summary.total_tracks,
            summary.dominant_mood,
            summary.provenance
        );

        Ok(Analysis {
            playlist_id: playlist_id.clone(),
            records: acquisition.records,
            summary,
            unmatched: acquisition.unmatched,
            truncated_from,
            analyzed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = config();
        config.spotify_client_id = None;
        config.spotify_client_secret = None;
        config.spotify_user_token = None;
        let err = MoodAnalyzer::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("No Spotify credentials"));
    }

    #[test]
    fn test_from_config_with_client_credentials() {
        let mut config = config();
        config.spotify_client_id = Some("id".to_string());
        config.spotify_client_secret = Some("secret".to_string());
        config.spotify_user_token = None;
        config.max_tracks = 25;
        let analyzer = MoodAnalyzer::from_config(&config).unwrap();
        assert_eq!(analyzer.max_tracks, 25);
        assert_eq!(analyzer.timeout, config.timeout());
    }

    #[test]
    fn test_from_config_missing_rules_file() {
        let mut config = config();
        config.spotify_user_token = Some("token".to_string());
        config.rules_path = Some(PathBuf::from("/nonexistent/rules.toml"));
        let err = MoodAnalyzer::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("estimation rules"));
    }
}
