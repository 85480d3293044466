//! Scripted in-memory providers.
//!
//! Used by the test suites and for offline runs. Each double counts its
//! calls so tests can assert exactly which tiers were exercised.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use moodscope_core::{FeatureComponents, GenreTag, PlaylistId, Track, TrackId};

use super::{Catalog, FeatureSource, GenreSource};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};

fn scripted_error(kind: ProviderErrorKind, source_name: &str, entity: &str) -> ProviderError {
    let source_name = source_name.to_string();
    let entity = entity.to_string();
    match kind {
        ProviderErrorKind::NotFound => ProviderError::NotFound {
            entity,
            source_name,
        },
        ProviderErrorKind::AccessDenied => ProviderError::AccessDenied {
            entity,
            source_name,
        },
        ProviderErrorKind::RateLimited => ProviderError::RateLimited { source_name },
        ProviderErrorKind::Unknown => ProviderError::Http {
            source_name,
            status: 500,
            message: format!("scripted failure for {entity}"),
        },
    }
}

/// Playlists held in memory.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    playlists: HashMap<PlaylistId, Vec<Track>>,
    failures: HashMap<PlaylistId, ProviderErrorKind>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_playlist(mut self, id: impl Into<PlaylistId>, tracks: Vec<Track>) -> Self {
        self.playlists.insert(id.into(), tracks);
        self
    }

    #[must_use]
    pub fn with_failure(mut self, id: impl Into<PlaylistId>, kind: ProviderErrorKind) -> Self {
        self.failures.insert(id.into(), kind);
        self
    }

    /// Sleep before answering every request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn fetch_tracks(&self, playlist_id: &PlaylistId) -> ProviderResult<Vec<Track>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(kind) = self.failures.get(playlist_id) {
            return Err(scripted_error(*kind, "memory", "playlist"));
        }
        self.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| scripted_error(ProviderErrorKind::NotFound, "memory", "playlist"))
    }
}

/// Audio features held in memory, with optional scripted failures.
///
/// Ids without an entry are answered with `None`, like a provider that has
/// no analysis for a track.
#[derive(Debug)]
pub struct StaticFeatures {
    name: String,
    features: HashMap<TrackId, FeatureComponents>,
    probe_failure: Option<ProviderErrorKind>,
    batch_failure: Option<ProviderErrorKind>,
    batch_delay: Option<Duration>,
    probe_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl StaticFeatures {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: HashMap::new(),
            probe_failure: None,
            batch_failure: None,
            batch_delay: None,
            probe_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_features(mut self, id: impl Into<TrackId>, features: FeatureComponents) -> Self {
        self.features.insert(id.into(), features);
        self
    }

    #[must_use]
    pub fn failing_probe(mut self, kind: ProviderErrorKind) -> Self {
        self.probe_failure = Some(kind);
        self
    }

    #[must_use]
    pub fn failing_batches(mut self, kind: ProviderErrorKind) -> Self {
        self.batch_failure = Some(kind);
        self
    }

    /// Sleep before answering every batch request. Probes stay immediate.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of ids requested by each batch call, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FeatureSource for StaticFeatures {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe_feature(&self, track_id: &TrackId) -> ProviderResult<Option<FeatureComponents>> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.probe_failure {
            return Err(scripted_error(kind, &self.name, "audio features"));
        }
        Ok(self.features.get(track_id).copied())
    }

    async fn fetch_features_batch(
        &self,
        track_ids: &[TrackId],
    ) -> ProviderResult<Vec<Option<FeatureComponents>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.batch_sizes.lock() {
            sizes.push(track_ids.len());
        }
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(kind) = self.batch_failure {
            return Err(scripted_error(kind, &self.name, "audio features"));
        }
        Ok(track_ids
            .iter()
            .map(|id| self.features.get(id).copied())
            .collect())
    }
}

/// Folksonomy tags held in memory.
#[derive(Debug, Default)]
pub struct StaticGenres {
    tags: HashMap<TrackId, Vec<GenreTag>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticGenres {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tags(mut self, id: impl Into<TrackId>, tags: Vec<GenreTag>) -> Self {
        self.tags.insert(id.into(), tags);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenreSource for StaticGenres {
    async fn enrich_genres(&self, track: &Track) -> Vec<GenreTag> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tags.get(&track.id).cloned().unwrap_or_default()
    }
}
