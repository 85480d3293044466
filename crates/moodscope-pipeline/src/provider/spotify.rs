//! Spotify Web API client.
//!
//! One client serves one authorization mode: either the client-credentials
//! flow (an app token fetched and cached on demand) or a caller-supplied
//! user token. Running two clients side by side gives the fallback
//! orchestrator its primary and alternate tiers.
//!
//! Every request goes through the client's [`RateLimiter`], and transient
//! failures (429, 5xx, connect/timeouts) are retried with exponential
//! back-off before the error is surfaced.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backon::Retryable;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;

use moodscope_core::{FeatureComponents, PlaylistId, Track, TrackId};

use super::{Catalog, FeatureSource};
use crate::error::{ProviderError, ProviderResult};
use crate::resilience::{backoff, RateLimiter};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
const USER_AGENT: &str = concat!("moodscope/", env!("CARGO_PKG_VERSION"));

/// Largest page the playlist-items endpoint serves.
const PLAYLIST_PAGE_SIZE: usize = 100;

/// Largest id list the several-artists and audio-features endpoints accept.
const MAX_IDS_PER_REQUEST: usize = 50;

/// Tokens are refreshed this long before they actually expire.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

const fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    album: Option<AlbumRef>,
    popularity: Option<u32>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    explicit: bool,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    name: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistsResponse {
    #[serde(default)]
    artists: Vec<Option<FullArtist>>,
}

#[derive(Debug, Deserialize)]
struct FullArtist {
    id: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    #[serde(default)]
    audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Debug, Clone, Deserialize)]
struct AudioFeatures {
    id: Option<String>,
    valence: Option<f64>,
    energy: Option<f64>,
    danceability: Option<f64>,
    acousticness: Option<f64>,
    instrumentalness: Option<f64>,
    speechiness: Option<f64>,
}

impl AudioFeatures {
    /// Features missing any of the three core values are unusable.
    fn components(&self) -> Option<FeatureComponents> {
        Some(FeatureComponents {
            valence: self.valence?,
            energy: self.energy?,
            danceability: self.danceability?,
            acousticness: self.acousticness,
            instrumentalness: self.instrumentalness,
            speechiness: self.speechiness,
        })
    }
}

impl SpotifyTrack {
    fn into_track(self) -> Option<Track> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let (album, release_date) = match self.album {
            Some(album) => (album.name.unwrap_or_default(), album.release_date),
            None => (String::new(), None),
        };
        let mut track = Track::new(id, self.name)
            .with_artists(self.artists.iter().filter_map(|a| a.name.clone()))
            .with_artist_ids(self.artists.iter().filter_map(|a| a.id.clone()).collect())
            .with_album(album)
            .with_popularity(self.popularity)
            .with_duration_ms(self.duration_ms)
            .with_explicit(self.explicit);
        if let Some(date) = release_date {
            track = track.with_release_date(date);
        }
        Some(track)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

enum Auth {
    ClientCredentials {
        client_id: String,
        client_secret: String,
        token: RwLock<Option<CachedToken>>,
    },
    User {
        token: String,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::User { .. } => f.debug_struct("User").finish_non_exhaustive(),
        }
    }
}

/// Spotify API client bound to one authorization mode.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    auth: Arc<Auth>,
    label: String,
    rate_limiter: RateLimiter,
}

impl SpotifyClient {
    /// Client using the client-credentials flow.
    pub fn with_client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> ProviderResult<Self> {
        Self::build(
            Auth::ClientCredentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                token: RwLock::new(None),
            },
            "spotify-client-credentials",
        )
    }

    /// Client using a user access token obtained elsewhere.
    pub fn with_user_token(token: impl Into<String>) -> ProviderResult<Self> {
        Self::build(
            Auth::User {
                token: token.into(),
            },
            "spotify-user",
        )
    }

    fn build(auth: Auth, label: &str) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            auth: Arc::new(auth),
            label: label.to_string(),
            rate_limiter: RateLimiter::new(10),
        })
    }

    /// A valid bearer token, fetching a new app token when needed.
    async fn access_token(&self) -> ProviderResult<String> {
        match self.auth.as_ref() {
            Auth::User { token } => Ok(token.clone()),
            Auth::ClientCredentials {
                client_id,
                client_secret,
                token,
            } => {
                {
                    let guard = token.read().await;
                    if let Some(cached) = guard.as_ref() {
                        if cached.expires_at > Instant::now() {
                            return Ok(cached.access_token.clone());
                        }
                    }
                }

                let fresh = self.fetch_token(client_id, client_secret).await?;
                let access_token = fresh.access_token.clone();
                *token.write().await = Some(fresh);
                Ok(access_token)
            }
        }
    }

    async fn fetch_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> ProviderResult<CachedToken> {
        log::debug!("Requesting Spotify app token");
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", client_id, client_secret).as_bytes());

        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth {
                source_name: self.label.clone(),
                message: format!("token request failed: {} {}", status, body),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| ProviderError::Parse {
            source_name: self.label.clone(),
            message: e.to_string(),
        })?;
        let lifetime = body.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }

    async fn forget_token(&self) {
        if let Auth::ClientCredentials { token, .. } = self.auth.as_ref() {
            *token.write().await = None;
        }
    }

    /// GET a JSON document, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        entity: &str,
    ) -> ProviderResult<T> {
        let attempt = || async {
            self.rate_limiter.acquire().await;
            let token = self.access_token().await?;
            let response = self
                .http
                .get(url)
                .query(query)
                .bearer_auth(token)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                if status == StatusCode::UNAUTHORIZED {
                    self.forget_token().await;
                }
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, &self.label, entity, &body));
            }

            response.json::<T>().await.map_err(|e| ProviderError::Parse {
                source_name: self.label.clone(),
                message: e.to_string(),
            })
        };

        attempt
            .retry(backoff())
            .sleep(tokio::time::sleep)
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, dur: Duration| {
                log::warn!(
                    "{} request for {} failed ({}), retrying in {:?}",
                    self.label,
                    entity,
                    err,
                    dur
                );
            })
            .await
    }

    /// Fill in each track's genres from its artists. Best-effort: a failed
    /// lookup leaves genres empty.
    async fn attach_artist_genres(&self, tracks: &mut [Track]) {
        let mut seen = HashSet::new();
        let artist_ids: Vec<String> = tracks
            .iter()
            .flat_map(|t| t.artist_ids.iter())
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut genres_by_artist: HashMap<String, Vec<String>> = HashMap::new();
        for chunk in artist_ids.chunks(MAX_IDS_PER_REQUEST) {
            let url = format!("{}/artists", API_BASE);
            let query = [("ids", chunk.join(","))];
            match self.get_json::<ArtistsResponse>(&url, &query, "artists").await {
                Ok(response) => {
                    for artist in response.artists.into_iter().flatten() {
                        genres_by_artist.insert(artist.id, artist.genres);
                    }
                }
                Err(e) => {
                    log::warn!("Failed to fetch artist genres from {}: {}", self.label, e);
                }
            }
        }

        for track in tracks.iter_mut() {
            let mut genres: Vec<String> = Vec::new();
            for id in &track.artist_ids {
                for genre in genres_by_artist.get(id).into_iter().flatten() {
                    if !genres.contains(genre) {
                        genres.push(genre.clone());
                    }
                }
            }
            track.genres = genres;
        }
    }
}

/// Map a non-success status to the provider error taxonomy.
fn status_error(status: StatusCode, source_name: &str, entity: &str, body: &str) -> ProviderError {
    let source_name = source_name.to_string();
    let entity = entity.to_string();
    match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound {
            entity,
            source_name,
        },
        StatusCode::UNAUTHORIZED => ProviderError::Auth {
            source_name,
            message: "access token expired or invalid (401)".to_string(),
        },
        StatusCode::FORBIDDEN => ProviderError::AccessDenied {
            entity,
            source_name,
        },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { source_name },
        _ => ProviderError::Http {
            source_name,
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        },
    }
}

/// Align features to the requested ids by matching on id.
fn align_features(
    ids: &[TrackId],
    features: Vec<Option<AudioFeatures>>,
) -> Vec<Option<FeatureComponents>> {
    let by_id: HashMap<String, AudioFeatures> = features
        .into_iter()
        .flatten()
        .filter_map(|f| f.id.clone().map(|id| (id, f)))
        .collect();
    ids.iter()
        .map(|id| by_id.get(id.as_str()).and_then(AudioFeatures::components))
        .collect()
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn fetch_tracks(&self, playlist_id: &PlaylistId) -> ProviderResult<Vec<Track>> {
        let mut tracks = Vec::new();
        let mut url = format!("{}/playlists/{}/tracks", API_BASE, playlist_id);
        let mut query = vec![("limit", PLAYLIST_PAGE_SIZE.to_string())];

        loop {
            let page: PlaylistPage = self.get_json(&url, &query, "playlist").await?;
            let before = tracks.len();
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track.and_then(SpotifyTrack::into_track)),
            );
            log::debug!(
                "Fetched {} tracks of playlist {} from {}",
                tracks.len() - before,
                playlist_id,
                self.label
            );
            match page.next {
                // `next` already carries the paging query
                Some(next) => {
                    url = next;
                    query.clear();
                }
                None => break,
            }
        }

        self.attach_artist_genres(&mut tracks).await;
        Ok(tracks)
    }
}

#[async_trait]
impl FeatureSource for SpotifyClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn probe_feature(&self, track_id: &TrackId) -> ProviderResult<Option<FeatureComponents>> {
        let url = format!("{}/audio-features/{}", API_BASE, track_id);
        let features: AudioFeatures = self.get_json(&url, &[], "audio features").await?;
        Ok(features.components())
    }

    async fn fetch_features_batch(
        &self,
        track_ids: &[TrackId],
    ) -> ProviderResult<Vec<Option<FeatureComponents>>> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = track_ids
            .iter()
            .take(MAX_IDS_PER_REQUEST)
            .map(TrackId::as_str)
            .collect();
        let url = format!("{}/audio-features", API_BASE);
        let query = [("ids", ids.join(","))];
        let response: AudioFeaturesResponse = self.get_json(&url, &query, "audio features").await?;

        let mut aligned = align_features(track_ids, response.audio_features);
        aligned.truncate(ids.len());
        Ok(aligned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;

    #[test]
    fn test_client_creation() {
        let client = SpotifyClient::with_client_credentials("id", "secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("SpotifyClient"));
        assert!(debug.contains("RateLimiter"));
        assert!(!debug.contains("secret"));
        assert_eq!(client.name(), "spotify-client-credentials");

        let user = SpotifyClient::with_user_token("tok-123").unwrap();
        assert!(!format!("{:?}", user).contains("tok-123"));
        assert_eq!(user.name(), "spotify-user");
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(StatusCode::NOT_FOUND, "s", "playlist", "");
        assert!(err.is_not_found());
        let err = status_error(StatusCode::FORBIDDEN, "s", "playlist", "");
        assert!(matches!(err, ProviderError::AccessDenied { .. }));
        let err = status_error(StatusCode::UNAUTHORIZED, "s", "playlist", "");
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert_eq!(err.kind(), ProviderErrorKind::Unknown);
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "s", "playlist", "");
        assert!(err.is_transient());
        let err = status_error(StatusCode::BAD_GATEWAY, "s", "playlist", "upstream");
        assert!(err.is_transient());
        let err = status_error(StatusCode::BAD_REQUEST, "s", "playlist", "bad");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_playlist_page_deserialize() {
        let json = r#"{
            "items": [
                {"track": {
                    "id": "t1", "name": "One",
                    "artists": [{"id": "a1", "name": "Alpha"}, {"id": "a2", "name": ""}],
                    "album": {"name": "Album", "release_date": "2020-01-01"},
                    "popularity": 81, "duration_ms": 200000, "explicit": true
                }},
                {"track": null},
                {"track": {"id": null, "name": "Local file"}},
                {"track": {"id": "t2", "name": "Two", "artists": []}}
            ],
            "next": "https://api.spotify.com/v1/playlists/p/tracks?offset=100&limit=100"
        }"#;
        let page: PlaylistPage = serde_json::from_str(json).unwrap();
        assert!(page.next.is_some());
        let tracks: Vec<Track> = page
            .items
            .into_iter()
            .filter_map(|i| i.track.and_then(SpotifyTrack::into_track))
            .collect();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artists, vec!["Alpha".to_string()]);
        assert_eq!(tracks[0].artist_ids, vec!["a1".to_string(), "a2".to_string()]);
        assert_eq!(tracks[0].popularity, 81);
        assert_eq!(tracks[0].release_date.as_deref(), Some("2020-01-01"));
        assert_eq!(tracks[1].artists, vec!["Unknown Artist".to_string()]);
        assert_eq!(tracks[1].popularity, 50);
    }

    #[test]
    fn test_audio_features_nulls_and_alignment() {
        let json = r#"{"audio_features": [
            {"id": "b", "valence": 0.2, "energy": 0.9, "danceability": 0.5, "speechiness": 0.05},
            null,
            {"id": "a", "valence": 0.8, "energy": null, "danceability": 0.5}
        ]}"#;
        let response: AudioFeaturesResponse = serde_json::from_str(json).unwrap();
        let ids = [TrackId::new("a"), TrackId::new("b"), TrackId::new("c")];
        let aligned = align_features(&ids, response.audio_features);
        assert_eq!(aligned.len(), 3);
        // "a" lacks energy, so it is unusable
        assert!(aligned[0].is_none());
        let b = aligned[1].unwrap();
        assert!((b.valence - 0.2).abs() < f64::EPSILON);
        assert_eq!(b.speechiness, Some(0.05));
        assert!(aligned[2].is_none());
    }

    #[test]
    fn test_artists_response_skips_nulls() {
        let json = r#"{"artists": [{"id": "a1", "genres": ["dance pop"]}, null]}"#;
        let response: ArtistsResponse = serde_json::from_str(json).unwrap();
        let artists: Vec<FullArtist> = response.artists.into_iter().flatten().collect();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].genres, vec!["dance pop".to_string()]);
    }
}
