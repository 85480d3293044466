//! Per-track cache in front of a [`GenreSource`].
//!
//! Keyed by track id. Concurrent requests for the same id share one
//! in-flight lookup, so the underlying source is called at most once per id
//! for the lifetime of the cache. Only tags are cached; nothing about which
//! feature tier a playlist ended up on is stored here.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use moodscope_core::{GenreTag, Track, TrackId};

use crate::provider::GenreSource;

type Slot = Arc<OnceCell<Vec<GenreTag>>>;

/// Genre cache with one slot per track id seen.
///
/// Slots are never evicted on their own: the map holds every id looked up
/// since construction or the last [`clear`](Self::clear). A long-lived owner
/// should clear it between runs.
#[derive(Debug)]
pub struct CachedGenreSource<S> {
    inner: S,
    slots: Mutex<HashMap<TrackId, Slot>>,
}

impl<S: GenreSource> CachedGenreSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of ids with a cached or in-flight lookup.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry. Lookups already in flight finish on their
    /// detached slot and are not stored.
    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.clear();
        }
    }

    fn slot(&self, id: &TrackId) -> Slot {
        match self.slots.lock() {
            Ok(mut slots) => Arc::clone(slots.entry(id.clone()).or_default()),
            // A poisoned map only loses sharing, never correctness.
            Err(_) => Arc::new(OnceCell::new()),
        }
    }
}

#[async_trait]
impl<S: GenreSource> GenreSource for CachedGenreSource<S> {
    async fn enrich_genres(&self, track: &Track) -> Vec<GenreTag> {
        let slot = self.slot(&track.id);
        if let Some(tags) = slot.get() {
            log::debug!("Genre cache hit for track {}", track.id);
            return tags.clone();
        }
        slot.get_or_init(|| async {
            log::debug!("Genre cache miss for track {}", track.id);
            self.inner.enrich_genres(track).await
        })
        .await
        .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticGenres;
    use std::time::Duration;

    fn source() -> CachedGenreSource<StaticGenres> {
        CachedGenreSource::new(
            StaticGenres::new()
                .with_tags("a", vec![GenreTag::new("dance", 1.0)])
                .with_delay(Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn test_second_lookup_is_cached() {
        let cache = source();
        let track = Track::new("a", "A");
        let first = cache.enrich_genres(&track).await;
        let second = cache.enrich_genres(&track).await;
        assert_eq!(first, second);
        assert_eq!(cache.inner().calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_fetch() {
        let cache = source();
        let track = Track::new("a", "A");
        let (x, y, z) = tokio::join!(
            cache.enrich_genres(&track),
            cache.enrich_genres(&track),
            cache.enrich_genres(&track),
        );
        assert_eq!(x.len(), 1);
        assert_eq!(x, y);
        assert_eq!(y, z);
        assert_eq!(cache.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_clear_forgets_cached_ids() {
        let cache = source();
        let track = Track::new("a", "A");
        cache.enrich_genres(&track).await;
        cache.enrich_genres(&Track::new("b", "B")).await;
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());

        let again = cache.enrich_genres(&track).await;
        assert_eq!(again.len(), 1);
        assert_eq!(cache.inner().calls(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_ids_fetch_separately() {
        let cache = source();
        cache.enrich_genres(&Track::new("a", "A")).await;
        let empty = cache.enrich_genres(&Track::new("b", "B")).await;
        assert!(empty.is_empty());
        assert_eq!(cache.inner().calls(), 2);
        assert!(!cache.is_empty());
    }
}
