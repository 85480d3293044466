//! Feature acquisition with tiered fallback.
//!
//! The orchestrator is a small state machine:
//!
//! ```text
//! TryPrimary ──ok──▶ FetchAll(Primary) ──results──▶ done (provider-real)
//!     │ fail                 │ none / batch error
//!     ▼                      ▼
//! TryAltAuth ──ok──▶ FetchAll(Alternate) ──results──▶ done (provider-alt-auth)
//!     │ fail                 │ none / batch error
//!     ▼                      ▼
//! Estimate ───────────────────────────────────────▶ done (estimated)
//! ```
//!
//! A single probe request guards each provider tier, so an authorization
//! mode that is already failing costs one call, not a full set of batches.
//! The decision is made once per playlist: every record in an
//! [`Acquisition`] carries the same provenance.

use std::sync::Arc;

use moodscope_core::{
    FeatureComponents, FeatureEstimator, FeatureVector, Provenance, Track, TrackId, TrackRecord,
};

use crate::config::MAX_BATCH_SIZE;
use crate::provider::{FeatureSource, GenreSource};

/// Which provider credential mode a fetch runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Alternate,
}

impl Tier {
    pub fn provenance(self) -> Provenance {
        match self {
            Self::Primary => Provenance::ProviderReal,
            Self::Alternate => Provenance::ProviderAltAuth,
        }
    }
}

#[derive(Debug)]
enum State {
    TryPrimary,
    TryAltAuth,
    FetchAll(Tier),
    Estimate,
}

/// Outcome of acquiring features for a playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    /// One record per track that received features, in playlist order.
    pub records: Vec<TrackRecord>,
    /// Tier shared by every record.
    pub provenance: Provenance,
    /// Tracks the provider had no features for. Only non-empty on a
    /// provider tier.
    pub unmatched: Vec<TrackId>,
}

#[derive(Debug)]
pub struct FallbackOrchestrator {
    primary: Arc<dyn FeatureSource>,
    alternate: Option<Arc<dyn FeatureSource>>,
    estimator: Arc<dyn FeatureEstimator>,
    genres: Option<Arc<dyn GenreSource>>,
    batch_size: usize,
}

impl FallbackOrchestrator {
    pub fn new(primary: Arc<dyn FeatureSource>, estimator: Arc<dyn FeatureEstimator>) -> Self {
        Self {
            primary,
            alternate: None,
            estimator,
            genres: None,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Feature source to try when the primary probe fails.
    #[must_use]
    pub fn with_alternate(mut self, alternate: Arc<dyn FeatureSource>) -> Self {
        self.alternate = Some(alternate);
        self
    }

    /// Tag source consulted during estimation.
    #[must_use]
    pub fn with_genres(mut self, genres: Arc<dyn GenreSource>) -> Self {
        self.genres = Some(genres);
        self
    }

    /// Ids per batch request, clamped to `1..=50`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Produce feature vectors for `tracks`.
    ///
    /// Never fails: every provider failure demotes the playlist to the next
    /// tier, and estimation always succeeds.
    pub async fn acquire(&self, tracks: &[Track]) -> Acquisition {
        let Some(probe_track) = tracks.first() else {
            return Acquisition {
                records: Vec::new(),
                provenance: self.estimator.provenance(),
                unmatched: Vec::new(),
            };
        };

        let mut state = State::TryPrimary;
        loop {
            log::debug!("Feature acquisition state: {:?}", state);
            state = match state {
                State::TryPrimary => {
                    if self.probe(self.primary.as_ref(), &probe_track.id).await {
                        State::FetchAll(Tier::Primary)
                    } else if self.alternate.is_some() {
                        log::info!(
                            "Primary feature source unavailable, trying alternate authorization"
                        );
                        State::TryAltAuth
                    } else {
                        log::info!("Primary feature source unavailable, estimating features");
                        State::Estimate
                    }
                }
                State::TryAltAuth => match &self.alternate {
                    Some(alternate) if self.probe(alternate.as_ref(), &probe_track.id).await => {
                        State::FetchAll(Tier::Alternate)
                    }
                    _ => {
                        log::info!("Alternate feature source unavailable, estimating features");
                        State::Estimate
                    }
                },
                State::FetchAll(tier) => match self.fetch_all(tier, tracks).await {
                    Some(acquisition) => return acquisition,
                    None if tier == Tier::Primary && self.alternate.is_some() => State::TryAltAuth,
                    None => State::Estimate,
                },
                State::Estimate => return self.estimate_all(tracks).await,
            };
        }
    }

    fn source(&self, tier: Tier) -> Option<&dyn FeatureSource> {
        match tier {
            Tier::Primary => Some(self.primary.as_ref()),
            Tier::Alternate => self.alternate.as_deref(),
        }
    }

    async fn probe(&self, source: &dyn FeatureSource, track_id: &TrackId) -> bool {
        match source.probe_feature(track_id).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                log::warn!("{}: no features for probe track {}", source.name(), track_id);
                false
            }
            Err(e) => {
                log::warn!("{}: probe for track {} failed: {}", source.name(), track_id, e);
                false
            }
        }
    }

    /// Fetch every batch under `tier`. `None` means the tier is unusable:
    /// a batch failed or nothing came back.
    async fn fetch_all(&self, tier: Tier, tracks: &[Track]) -> Option<Acquisition> {
        let source = self.source(tier)?;
        let provenance = tier.provenance();
        let mut records = Vec::with_capacity(tracks.len());
        let mut unmatched = Vec::new();

        for batch in tracks.chunks(self.batch_size) {
            let ids: Vec<TrackId> = batch.iter().map(|t| t.id.clone()).collect();
            let features = match source.fetch_features_batch(&ids).await {
                Ok(features) => features,
                Err(e) => {
                    log::warn!(
                        "{}: batch of {} tracks failed, abandoning tier: {}",
                        source.name(),
                        ids.len(),
                        e
                    );
                    return None;
                }
            };
            merge_batch(batch, features, provenance, &mut records, &mut unmatched);
        }

        if records.is_empty() {
            log::warn!("{}: no usable features for any track", source.name());
            return None;
        }
        if !unmatched.is_empty() {
            log::warn!(
                "{}: {} of {} tracks have no features and were left out",
                source.name(),
                unmatched.len(),
                tracks.len()
            );
        }
        log::info!(
            "Fetched features for {} tracks ({})",
            records.len(),
            provenance
        );

        Some(Acquisition {
            records,
            provenance,
            unmatched,
        })
    }

    async fn estimate_all(&self, tracks: &[Track]) -> Acquisition {
        let mut records = Vec::with_capacity(tracks.len());
        for track in tracks {
            let tags = match &self.genres {
                Some(genres) if self.estimator.wants_tags(track) => {
                    genres.enrich_genres(track).await
                }
                _ => Vec::new(),
            };
            let features = self.estimator.estimate(track, &tags);
            records.push(TrackRecord::new(track.clone(), features));
        }
        let provenance = self.estimator.provenance();
        log::info!("Estimated features for {} tracks ({})", records.len(), provenance);

        Acquisition {
            records,
            provenance,
            unmatched: Vec::new(),
        }
    }
}

/// Join one batch response with its tracks by position; `None` entries are
/// collected as unmatched.
fn merge_batch(
    batch: &[Track],
    features: Vec<Option<FeatureComponents>>,
    provenance: Provenance,
    records: &mut Vec<TrackRecord>,
    unmatched: &mut Vec<TrackId>,
) {
    let mut features = features.into_iter();
    for track in batch {
        match features.next().flatten() {
            Some(components) => records.push(TrackRecord::new(
                track.clone(),
                FeatureVector::from_components(components, provenance),
            )),
            None => unmatched.push(track.id.clone()),
        }
    }
}
