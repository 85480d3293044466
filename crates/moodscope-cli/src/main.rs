use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use moodscope_pipeline::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "moodscope", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the history database (default: ~/.local/share/moodscope/history.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Analyze the mood of a playlist
    ///
    /// Accepts a playlist id, a spotify:playlist: URI, or an
    /// open.spotify.com share URL. Audio features are taken from Spotify
    /// when available; otherwise they are estimated from genres,
    /// popularity and (when a Last.fm key is configured) folksonomy tags.
    /// The output states which of the two was used.
    ///
    /// Every successful analysis is appended to the history database
    /// unless --no-save is given.
    Analyze {
        /// Playlist id, URI or URL
        playlist: String,

        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,

        /// Do not record the analysis in the history database
        #[arg(long)]
        no_save: bool,
    },
    /// List previously recorded analyses, newest first
    History {
        /// Only show analyses of this playlist (id, URI or URL)
        playlist: Option<String>,

        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Inspect the genre keyword rules used for estimation
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Create the config file with defaults
    Init,
    /// Set a value in the config file
    Set { key: String, value: String },
    /// Print an example config file
    Example,
}

#[derive(Debug, clap::Subcommand)]
enum RulesAction {
    /// Print the built-in rules as TOML
    Show,
    /// Check a rules file (default: the configured rules_path)
    Validate { path: Option<PathBuf> },
}

fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    twyg::setup(twyg::Opts::default()).map_err(|e| anyhow!("Failed to set up logging: {e}"))?;
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        config.level_filter()
    };
    log::set_max_level(level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.db {
        Some(db) => Config::load_with_db_path(db)?,
        None => Config::load()?,
    };
    setup_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Analyze {
            playlist,
            json,
            no_save,
        } => {
            commands::run_analyze(&config, &playlist, json, !no_save).await?;
        }
        Commands::History { playlist, limit } => {
            commands::show_history(&config.database_path, playlist.as_deref(), limit)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Path => commands::config::show_path(),
            ConfigAction::Init => commands::config::init_config()?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigAction::Example => commands::config::show_example(),
        },
        Commands::Rules { action } => match action {
            RulesAction::Show => commands::rules::show_rules()?,
            RulesAction::Validate { path } => {
                commands::rules::validate_rules(path.or_else(|| config.rules_path.clone()))?;
            }
        },
    }

    Ok(())
}
