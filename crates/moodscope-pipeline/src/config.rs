use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use toml_edit::DocumentMut;

/// Upper bound on ids per audio-features request.
pub const MAX_BATCH_SIZE: usize = 50;

/// Which metadata estimator runs when provider features are unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    /// Keyword rules over genres and popularity.
    #[default]
    Rule,
    /// Keyword rules blended with Last.fm tags.
    TagBlend,
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule => f.write_str("rule"),
            Self::TagBlend => f.write_str("tag-blend"),
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rule" => Ok(Self::Rule),
            "tag-blend" | "tag_blend" | "ai" => Ok(Self::TagBlend),
            other => {
                anyhow::bail!("unknown estimator '{}' (expected 'rule' or 'tag-blend')", other)
            }
        }
    }
}

/// Configuration for moodscope.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (MOODSCOPE_* prefix)
/// 3. Config file (~/.config/moodscope/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Spotify application client id (client-credentials flow).
    ///
    /// Can be set via:
    /// - ENV: MOODSCOPE_SPOTIFY_CLIENT_ID
    /// - Config: spotify_client_id = "..."
    #[serde(default)]
    pub spotify_client_id: Option<String>,

    /// Spotify application client secret.
    #[serde(default)]
    pub spotify_client_secret: Option<String>,

    /// Optional user access token. When set, user auth is the primary tier
    /// and client credentials become the alternate tier.
    #[serde(default)]
    pub spotify_user_token: Option<String>,

    /// Last.fm API key. Enables tag enrichment.
    #[serde(default)]
    pub lastfm_api_key: Option<String>,

    /// Path to the analysis history database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: MOODSCOPE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/moodscope/history.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub estimator: EstimatorKind,

    /// Track ids per audio-features request, clamped to 1..=50.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Longer playlists are cut to their first `max_tracks` tracks.
    #[serde(default = "default_max_tracks")]
    pub max_tracks: usize,

    /// Ceiling on one whole analysis.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// TOML file replacing the built-in estimation rules.
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_client_id: None,
            spotify_client_secret: None,
            spotify_user_token: None,
            lastfm_api_key: None,
            database_path: default_db_path(),
            estimator: EstimatorKind::default(),
            batch_size: default_batch_size(),
            max_tracks: default_max_tracks(),
            timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
            rules_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/moodscope/config.toml
    /// Reads environment variables with MOODSCOPE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific file plus the environment.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("moodscope");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Client-credentials pair, when both halves are set and non-empty.
    pub fn spotify_credentials(&self) -> Option<(&str, &str)> {
        let id = non_empty(self.spotify_client_id.as_deref())?;
        let secret = non_empty(self.spotify_client_secret.as_deref())?;
        Some((id, secret))
    }

    pub fn spotify_user_token(&self) -> Option<&str> {
        non_empty(self.spotify_user_token.as_deref())
    }

    pub fn lastfm_api_key(&self) -> Option<&str> {
        non_empty(self.lastfm_api_key.as_deref())
    }

    /// The log level as a `log` filter, defaulting to `Info` when the
    /// configured name is not recognised.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

const fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

const fn default_max_tracks() -> usize {
    100
}

const fn default_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Get the default database path.
///
/// Returns: ~/.local/share/moodscope/history.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("moodscope")
        .join("history.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/moodscope/config.toml
/// - macOS: ~/Library/Application Support/moodscope/config.toml
/// - Windows: %APPDATA%\moodscope\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("moodscope")
        .join("config.toml")
}

/// Keys accepted by [`set_value`].
pub const KNOWN_KEYS: &[&str] = &[
    "spotify_client_id",
    "spotify_client_secret",
    "spotify_user_token",
    "lastfm_api_key",
    "database_path",
    "estimator",
    "batch_size",
    "max_tracks",
    "timeout_secs",
    "log_level",
    "rules_path",
];

const INTEGER_KEYS: &[&str] = &["batch_size", "max_tracks", "timeout_secs"];

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Moodscope Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (MOODSCOPE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Spotify application credentials (client-credentials flow)
#
# Create an application at: https://developer.spotify.com/dashboard
#
# Can also be set via:
# - Environment: MOODSCOPE_SPOTIFY_CLIENT_ID / MOODSCOPE_SPOTIFY_CLIENT_SECRET
#spotify_client_id = "your-client-id"
#spotify_client_secret = "your-client-secret"

# Optional user access token. When present it is tried first and the
# client credentials above serve as the alternate authorization.
#spotify_user_token = "..."

# Last.fm API key, used for folksonomy tags when features must be estimated
#
# Register at: https://www.last.fm/api/account/create
#lastfm_api_key = "your-lastfm-api-key"

# Estimator used when audio features are unavailable: "rule" or "tag-blend"
estimator = "rule"

# Audio-feature ids per request (1-50)
batch_size = 50

# Playlists longer than this are truncated
max_tracks = 100

# Ceiling on one whole analysis, in seconds
timeout_secs = 120

# One of: error, warn, info, debug, trace
log_level = "info"

# Optional TOML file replacing the built-in genre keyword rules
#rules_path = "/path/to/rules.toml"

# Path to the analysis history database
#
# Can also be set via:
# - CLI: moodscope --db /custom/path.db analyze <playlist>
# - Environment: MOODSCOPE_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/history.db"
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    ensure_config_file_at(&config_file_path())
}

pub fn ensure_config_file_at(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

/// Set a single key in the default config file, creating it if needed.
pub fn set_value(key: &str, value: &str) -> Result<()> {
    set_value_at(&config_file_path(), key, value)
}

/// Set a single top-level key in a config file, keeping comments and
/// layout intact.
pub fn set_value_at(config_path: &Path, key: &str, value: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        anyhow::bail!(
            "Unknown config key: {}\n\nValid keys: {}",
            key,
            KNOWN_KEYS.join(", ")
        );
    }

    ensure_config_file_at(config_path)?;
    let contents = std::fs::read_to_string(config_path).context("Failed to read config file")?;
    let mut doc: DocumentMut = contents
        .parse()
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    if INTEGER_KEYS.contains(&key) {
        let n: i64 = value
            .parse()
            .with_context(|| format!("{} must be an integer, got '{}'", key, value))?;
        doc[key] = toml_edit::value(n);
    } else if key == "estimator" {
        let kind: EstimatorKind = value.parse()?;
        doc[key] = toml_edit::value(kind.to_string());
    } else {
        doc[key] = toml_edit::value(value);
    }

    std::fs::write(config_path, doc.to_string()).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert!(config.spotify_credentials().is_none());
        assert_eq!(config.estimator, EstimatorKind::Rule);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_tracks, 100);
        assert_eq!(config.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_custom_db_path() {
        let custom_path = PathBuf::from("/tmp/test.db");
        let config = Config::load_with_db_path(custom_path.clone());
        assert!(config.is_ok());
        assert_eq!(config.unwrap().database_path, custom_path);
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let mut config = Config::default();
        config.batch_size = 500;
        assert_eq!(config.effective_batch_size(), 50);
        config.batch_size = 0;
        assert_eq!(config.effective_batch_size(), 1);
    }

    #[test]
    fn test_blank_credentials_are_ignored() {
        let config = Config {
            spotify_client_id: Some("id".to_string()),
            spotify_client_secret: Some("  ".to_string()),
            lastfm_api_key: Some(String::new()),
            ..Config::default()
        };
        assert!(config.spotify_credentials().is_none());
        assert!(config.lastfm_api_key().is_none());
    }

    #[test]
    fn test_level_filter() {
        let mut config = Config::default();
        config.log_level = "debug".to_string();
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
        config.log_level = "chatty".to_string();
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_estimator_kind_parse() {
        assert_eq!("tag-blend".parse::<EstimatorKind>().unwrap(), EstimatorKind::TagBlend);
        assert_eq!("RULE".parse::<EstimatorKind>().unwrap(), EstimatorKind::Rule);
        assert!("neural".parse::<EstimatorKind>().is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.estimator, EstimatorKind::Rule);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_set_value_preserves_comments() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        set_value_at(&path, "batch_size", "20").unwrap();
        set_value_at(&path, "estimator", "tag_blend").unwrap();
        set_value_at(&path, "lastfm_api_key", "abc").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# Moodscope Configuration File"));
        assert!(contents.contains("batch_size = 20"));
        assert!(contents.contains("estimator = \"tag-blend\""));

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.estimator, EstimatorKind::TagBlend);
        assert_eq!(config.lastfm_api_key(), Some("abc"));
    }

    #[test]
    fn test_set_value_rejects_unknown_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        assert!(set_value_at(&path, "colour", "blue").is_err());
        assert!(set_value_at(&path, "max_tracks", "lots").is_err());
    }
}
