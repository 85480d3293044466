//! Last.fm folksonomy tags.
//!
//! Tags are community-driven genre/mood/style labels with associated
//! popularity counts. The tag source asks for track-level tags first and
//! falls back to the primary artist's tags, filters out low-count noise,
//! and normalises counts to weights (0.0--1.0) relative to the top tag.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use reqwest::Client;
use serde::Deserialize;

use moodscope_core::model::track::UNKNOWN_ARTIST;
use moodscope_core::{GenreTag, Track};

use super::GenreSource;
use crate::error::{ProviderError, ProviderResult};
use crate::resilience::{backoff, RateLimiter};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const SOURCE_NAME: &str = "Last.fm";

/// Minimum tag count to include (filters noise from low-vote tags).
const MIN_TAG_COUNT: u32 = 10;

/// Tags kept per track after filtering.
const MAX_TAGS: usize = 10;

// Last.fm error codes that map onto the provider taxonomy.
const LASTFM_INVALID_PARAMETERS: u32 = 6;
const LASTFM_INVALID_API_KEY: u32 = 10;
const LASTFM_RATE_LIMITED: u32 = 29;

// ---------------------------------------------------------------------------
// API response types (private -- Last.fm nests JSON awkwardly and reports
// errors inside 200 responses)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopTagsEnvelope {
    Tags { toptags: TopTags },
    Error { error: u32, message: String },
}

#[derive(Debug, Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: Vec<LastFmTag>,
}

/// A single folksonomy tag returned by the Last.fm API.
#[derive(Debug, Clone, Deserialize)]
pub struct LastFmTag {
    /// Human-readable tag name (e.g. "dance", "melancholic").
    pub name: String,
    /// Number of users who applied this tag.
    #[serde(default)]
    pub count: u32,
}

/// Last.fm API client.
///
/// Wraps an HTTP client, an API key, and a rate limiter. The Last.fm API
/// allows up to 5 requests per second for non-commercial use.
#[derive(Debug, Clone)]
pub struct LastFmClient {
    http: Client,
    api_key: String,
    rate_limiter: RateLimiter,
}

impl LastFmClient {
    /// Create a new Last.fm API client.
    ///
    /// The `api_key` must be a valid Last.fm API key obtained from
    /// <https://www.last.fm/api/account/create>.
    pub fn new(api_key: impl Into<String>) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("moodscope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            rate_limiter: RateLimiter::new(5),
        })
    }

    /// Get top tags for a track (`track.getTopTags`), unfiltered.
    pub async fn get_track_tags(
        &self,
        artist: &str,
        track: &str,
    ) -> ProviderResult<Vec<LastFmTag>> {
        self.top_tags(&[
            ("method", "track.getTopTags"),
            ("artist", artist),
            ("track", track),
            ("autocorrect", "1"),
        ])
        .await
    }

    /// Get top tags for an artist (`artist.getTopTags`), unfiltered.
    pub async fn get_artist_tags(&self, artist: &str) -> ProviderResult<Vec<LastFmTag>> {
        self.top_tags(&[
            ("method", "artist.getTopTags"),
            ("artist", artist),
            ("autocorrect", "1"),
        ])
        .await
    }

    async fn top_tags(&self, params: &[(&str, &str)]) -> ProviderResult<Vec<LastFmTag>> {
        let attempt = || async {
            self.rate_limiter.acquire().await;

            let response = self
                .http
                .get(LASTFM_API_BASE)
                .query(params)
                .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
                .send()
                .await?;

            let status = response.status();
            if status.is_server_error() {
                return Err(http_error(status));
            }

            // Errors arrive as an `{"error": .., "message": ..}` body, with
            // either a 200 or a 4xx status.
            let body = response.text().await?;
            match serde_json::from_str::<TopTagsEnvelope>(&body) {
                Ok(envelope) => envelope_tags(envelope),
                Err(_) if !status.is_success() => Err(http_error(status)),
                Err(e) => Err(ProviderError::Parse {
                    source_name: SOURCE_NAME.to_string(),
                    message: e.to_string(),
                }),
            }
        };

        attempt
            .retry(backoff())
            .sleep(tokio::time::sleep)
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, dur: Duration| {
                log::warn!("Last.fm request failed ({}), retrying in {:?}", err, dur);
            })
            .await
    }
}

fn http_error(status: reqwest::StatusCode) -> ProviderError {
    ProviderError::Http {
        source_name: SOURCE_NAME.to_string(),
        status: status.as_u16(),
        message: status.to_string(),
    }
}

fn envelope_tags(envelope: TopTagsEnvelope) -> ProviderResult<Vec<LastFmTag>> {
    match envelope {
        TopTagsEnvelope::Tags { toptags } => Ok(toptags.tag),
        TopTagsEnvelope::Error { error, message } => Err(match error {
            LASTFM_INVALID_PARAMETERS => ProviderError::NotFound {
                entity: message,
                source_name: SOURCE_NAME.to_string(),
            },
            LASTFM_INVALID_API_KEY => ProviderError::Auth {
                source_name: SOURCE_NAME.to_string(),
                message,
            },
            LASTFM_RATE_LIMITED => ProviderError::RateLimited {
                source_name: SOURCE_NAME.to_string(),
            },
            code => ProviderError::Parse {
                source_name: SOURCE_NAME.to_string(),
                message: format!("error {}: {}", code, message),
            },
        }),
    }
}

/// Filter by minimum count and normalise counts to weights relative to the
/// most-applied tag.
fn weighted_tags(tags: &[LastFmTag], min_count: u32) -> Vec<GenreTag> {
    let max_count = tags.iter().map(|t| t.count).max().unwrap_or(1).max(1);
    tags.iter()
        .filter(|tag| tag.count >= min_count && !tag.name.trim().is_empty())
        .take(MAX_TAGS)
        .map(|tag| {
            GenreTag::new(
                tag.name.trim().to_lowercase(),
                f64::from(tag.count) / f64::from(max_count),
            )
        })
        .collect()
}

/// [`GenreSource`] backed by Last.fm.
#[derive(Debug, Clone)]
pub struct LastFmTagSource {
    client: LastFmClient,
    min_tag_count: u32,
}

impl LastFmTagSource {
    /// Create a new Last.fm tag source.
    pub fn new(api_key: impl Into<String>) -> ProviderResult<Self> {
        Ok(Self {
            client: LastFmClient::new(api_key)?,
            min_tag_count: MIN_TAG_COUNT,
        })
    }
}

#[async_trait]
impl GenreSource for LastFmTagSource {
    async fn enrich_genres(&self, track: &Track) -> Vec<GenreTag> {
        let artist = track.primary_artist();
        if artist == UNKNOWN_ARTIST {
            return Vec::new();
        }

        match self.client.get_track_tags(artist, &track.title).await {
            Ok(tags) => {
                let weighted = weighted_tags(&tags, self.min_tag_count);
                if !weighted.is_empty() {
                    return weighted;
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to get Last.fm track tags for {} - {}: {}",
                    artist,
                    track.title,
                    e
                );
            }
        }

        match self.client.get_artist_tags(artist).await {
            Ok(tags) => weighted_tags(&tags, self.min_tag_count),
            Err(e) => {
                log::warn!("Failed to get Last.fm artist tags for {}: {}", artist, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, count: u32) -> LastFmTag {
        LastFmTag {
            name: name.to_string(),
            count,
        }
    }

    #[test]
    fn test_lastfm_client_creation() {
        let client = LastFmClient::new("test-key").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("LastFmClient"));
        assert!(debug.contains("RateLimiter"));
    }

    #[test]
    fn test_top_tags_deserialize() {
        let json = r#"{
            "toptags": {
                "tag": [
                    {"name": "dance", "count": 100},
                    {"name": "pop", "count": 50},
                    {"name": "seen live", "count": 5}
                ]
            }
        }"#;
        let envelope: TopTagsEnvelope = serde_json::from_str(json).unwrap();
        let tags = envelope_tags(envelope).unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].name, "dance");
        assert_eq!(tags[0].count, 100);
    }

    #[test]
    fn test_top_tags_missing_tag_field_defaults_to_empty() {
        let envelope: TopTagsEnvelope = serde_json::from_str(r#"{"toptags": {}}"#).unwrap();
        assert!(envelope_tags(envelope).unwrap().is_empty());
    }

    #[test]
    fn test_error_envelope_mapping() {
        let envelope: TopTagsEnvelope =
            serde_json::from_str(r#"{"error": 6, "message": "Track not found"}"#).unwrap();
        assert!(envelope_tags(envelope).unwrap_err().is_not_found());

        let envelope: TopTagsEnvelope =
            serde_json::from_str(r#"{"error": 29, "message": "Rate limit exceeded"}"#).unwrap();
        assert!(envelope_tags(envelope).unwrap_err().is_transient());

        let envelope: TopTagsEnvelope =
            serde_json::from_str(r#"{"error": 10, "message": "Invalid API key"}"#).unwrap();
        assert!(matches!(
            envelope_tags(envelope),
            Err(ProviderError::Auth { .. })
        ));
    }

    #[test]
    fn test_weighted_tags_filters_low_count() {
        let tags = vec![tag("Classical", 100), tag("piano", 50), tag("noise", 3)];
        let weighted = weighted_tags(&tags, MIN_TAG_COUNT);
        assert_eq!(weighted.len(), 2);
        assert_eq!(weighted[0].name, "classical");
        assert!((weighted[0].weight - 1.0).abs() < f64::EPSILON);
        assert!((weighted[1].weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_tags_all_below_threshold() {
        let tags = vec![tag("obscure", 2), tag("niche", 5)];
        assert!(weighted_tags(&tags, MIN_TAG_COUNT).is_empty());
        assert!(weighted_tags(&[], MIN_TAG_COUNT).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_artist_skips_lookup() {
        let source = LastFmTagSource::new("key").unwrap();
        let track = Track::new("t1", "Untitled");
        assert!(source.enrich_genres(&track).await.is_empty());
    }
}
