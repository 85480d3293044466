use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ids::TrackId;

/// Artist name used when a catalog entry carries no artist credit.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Popularity assumed when the catalog does not report one.
pub const DEFAULT_POPULARITY: u8 = 50;

/// A playlist entry as fetched from the catalog.
///
/// Tracks are immutable once fetched. Construction goes through
/// [`Track::new`] and the `with_*` builders, which normalize the artist
/// list and the popularity range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    pub title: String,

    /// Credited artists in catalog order. Never empty.
    #[serde(default = "unknown_artists", deserialize_with = "normalized_artists")]
    pub artists: Vec<String>,

    /// Catalog ids of the credited artists, aligned with `artists` when known.
    #[serde(default)]
    pub artist_ids: Vec<String>,

    #[serde(default)]
    pub album: String,

    /// Catalog popularity, 0 to 100.
    #[serde(default = "default_popularity", deserialize_with = "clamped_popularity")]
    pub popularity: u8,

    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default)]
    pub release_date: Option<String>,

    /// Genre tags. Entries that are not strings are dropped on deserialization.
    #[serde(default, deserialize_with = "lenient_strings")]
    pub genres: Vec<String>,

    #[serde(default)]
    pub explicit: bool,
}

impl Track {
    #[must_use]
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: unknown_artists(),
            artist_ids: Vec::new(),
            album: String::new(),
            popularity: DEFAULT_POPULARITY,
            duration_ms: 0,
            release_date: None,
            genres: Vec::new(),
            explicit: false,
        }
    }

    /// Set the artist credits, dropping blank names.
    #[must_use]
    pub fn with_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artists = normalize_artists(artists);
        self
    }

    #[must_use]
    pub fn with_artist_ids(mut self, ids: Vec<String>) -> Self {
        self.artist_ids = ids;
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    /// Set popularity; `None` means the catalog did not report one.
    #[must_use]
    pub fn with_popularity(mut self, popularity: Option<u32>) -> Self {
        self.popularity = popularity.map_or(DEFAULT_POPULARITY, |p| {
            u8::try_from(p.min(100)).unwrap_or(100)
        });
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    #[must_use]
    pub fn with_release_date(mut self, date: impl Into<String>) -> Self {
        self.release_date = Some(date.into());
        self
    }

    #[must_use]
    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres
            .into_iter()
            .map(Into::into)
            .filter(|g: &String| !g.trim().is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }

    /// The first credited artist.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or(UNKNOWN_ARTIST, String::as_str)
    }

    /// All credited artists joined for display.
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// A folksonomy or catalog genre tag with a normalized weight (0.0 to 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreTag {
    pub name: String,
    pub weight: f64,
}

impl GenreTag {
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

fn normalize_artists<I, S>(artists: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = artists
        .into_iter()
        .map(|a| a.into().trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    if names.is_empty() {
        unknown_artists()
    } else {
        names
    }
}

fn unknown_artists() -> Vec<String> {
    vec![UNKNOWN_ARTIST.to_string()]
}

const fn default_popularity() -> u8 {
    DEFAULT_POPULARITY
}

/// Artist credits with blanks dropped; an empty or `null` list becomes
/// the unknown artist.
fn normalized_artists<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_strings(deserializer).map(normalize_artists)
}

/// Popularity clamped to 100. `null` and negative or non-integer values fall
/// back to the default.
fn clamped_popularity<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_u64)
        .map_or(DEFAULT_POPULARITY, |p| u8::try_from(p.min(100)).unwrap_or(100)))
}

/// Deserialize a list of strings, skipping entries of any other JSON type.
/// A missing or `null` list becomes empty.
pub fn lenient_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_new_defaults() {
        let track = Track::new("t1", "Blinding Lights");
        assert_eq!(track.id.as_str(), "t1");
        assert_eq!(track.artists, vec![UNKNOWN_ARTIST.to_string()]);
        assert_eq!(track.popularity, DEFAULT_POPULARITY);
        assert!(track.genres.is_empty());
    }

    #[test]
    fn test_with_artists_drops_blanks() {
        let track = Track::new("t1", "x").with_artists(["", "  ", "Adele"]);
        assert_eq!(track.artists, vec!["Adele".to_string()]);
        assert_eq!(track.primary_artist(), "Adele");
    }

    #[test]
    fn test_with_artists_all_blank_falls_back() {
        let track = Track::new("t1", "x").with_artists(Vec::<String>::new());
        assert_eq!(track.primary_artist(), UNKNOWN_ARTIST);
    }

    #[test]
    fn test_with_popularity_clamps_and_defaults() {
        assert_eq!(Track::new("a", "a").with_popularity(Some(250)).popularity, 100);
        assert_eq!(Track::new("a", "a").with_popularity(None).popularity, 50);
        assert_eq!(Track::new("a", "a").with_popularity(Some(73)).popularity, 73);
    }

    #[test]
    fn test_artist_line() {
        let track = Track::new("t", "x").with_artists(["A", "B"]);
        assert_eq!(track.artist_line(), "A, B");
    }

    #[test]
    fn test_deserialize_tolerates_malformed_genres() {
        let json = r#"{
            "id": "t1",
            "title": "Song",
            "genres": ["pop", 42, null, {"name": "rock"}, "", "dance"]
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.genres, vec!["pop".to_string(), "dance".to_string()]);
        assert_eq!(track.popularity, DEFAULT_POPULARITY);
        assert_eq!(track.primary_artist(), UNKNOWN_ARTIST);
    }

    #[test]
    fn test_deserialize_normalizes_artists_and_popularity() {
        let json = r#"{"id": "t", "title": "x", "artists": [], "popularity": 150}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.artists, vec![UNKNOWN_ARTIST.to_string()]);
        assert_eq!(track.popularity, 100);

        let json = r#"{
            "id": "t",
            "title": "x",
            "artists": [" ", "Adele ", 7],
            "popularity": null
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.artists, vec!["Adele".to_string()]);
        assert_eq!(track.popularity, DEFAULT_POPULARITY);
    }

    #[test]
    fn test_deserialize_null_genres() {
        let json = r#"{"id": "t1", "title": "Song", "genres": null}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert!(track.genres.is_empty());
    }
}
