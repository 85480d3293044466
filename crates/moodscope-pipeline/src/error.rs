//! Error types for feature acquisition and analysis.

use std::time::Duration;

use moodscope_core::PlaylistId;
use thiserror::Error;

/// Errors raised at the provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An HTTP request to an external source failed with an unexpected status.
    #[error("HTTP error from {source_name} (status {status}): {message}")]
    Http {
        source_name: String,
        status: u16,
        message: String,
    },

    /// The external source returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// The requested entity was not found at the external source.
    #[error("not found: {entity} at {source_name}")]
    NotFound { entity: String, source_name: String },

    /// The credentials in use may not read the requested entity.
    #[error("access denied: {entity} at {source_name}")]
    AccessDenied { entity: String, source_name: String },

    /// A response from an external source could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Credentials are missing or were rejected when exchanged for a token.
    #[error("authentication failed for {source_name}: {message}")]
    Auth {
        source_name: String,
        message: String,
    },
}

/// The only distinctions the fallback policy draws between provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    NotFound,
    AccessDenied,
    RateLimited,
    Unknown,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::NotFound { .. } => ProviderErrorKind::NotFound,
            Self::AccessDenied { .. } => ProviderErrorKind::AccessDenied,
            Self::RateLimited { .. } => ProviderErrorKind::RateLimited,
            _ => ProviderErrorKind::Unknown,
        }
    }

    /// Returns `true` when the error is transient and the operation may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` when the error indicates the entity was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias for provider results.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors surfaced to callers of an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid playlist reference: {0}")]
    InvalidPlaylistId(String),

    #[error(
        "Playlist not found (ID: {0}). Please check the URL and make sure the playlist is public or you have access to it."
    )]
    NotFound(PlaylistId),

    #[error(
        "Access denied to playlist (ID: {0}). The playlist may be private or region-restricted."
    )]
    AccessDenied(PlaylistId),

    #[error("Playlist {0} contains no tracks")]
    EmptyPlaylist(PlaylistId),

    #[error("Analysis timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Analysis failed: {0}")]
    Unknown(String),

    #[error(transparent)]
    Core(#[from] moodscope_core::Error),
}

impl AnalysisError {
    /// Map a playlist-fetch failure to the caller-facing error.
    pub(crate) fn from_playlist_fetch(playlist_id: &PlaylistId, err: &ProviderError) -> Self {
        match err.kind() {
            ProviderErrorKind::NotFound => Self::NotFound(playlist_id.clone()),
            ProviderErrorKind::AccessDenied => Self::AccessDenied(playlist_id.clone()),
            ProviderErrorKind::RateLimited | ProviderErrorKind::Unknown => {
                Self::Unknown(err.to_string())
            }
        }
    }
}

/// Convenience alias for analysis results.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
