use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(TrackId, "Catalog identifier of a single track.");
define_id!(PlaylistId, "Catalog identifier of a playlist.");

const URI_PREFIX: &str = "spotify:playlist:";
const URL_MARKER: &str = "playlist/";

impl PlaylistId {
    /// Parse a playlist reference.
    ///
    /// Accepts a bare id, a `spotify:playlist:<id>` URI, or a share URL such
    /// as `https://open.spotify.com/playlist/<id>?si=...`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidData`] when no alphanumeric id can be found.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let candidate = if let Some(rest) = input.strip_prefix(URI_PREFIX) {
            rest
        } else if let Some(pos) = input.find(URL_MARKER) {
            let rest = &input[pos + URL_MARKER.len()..];
            rest.split(['?', '/', '#']).next().unwrap_or_default()
        } else {
            input
        };

        if candidate.is_empty() || !candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidData(format!(
                "not a playlist id, URI, or URL: {input:?}"
            )));
        }

        Ok(Self::new(candidate))
    }
}
