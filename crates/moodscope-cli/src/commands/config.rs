use anyhow::Result;
use moodscope_pipeline::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    let config_path = config::config_file_path();

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config_path.display());
    println!(
        "File exists: {}\n",
        if config_path.exists() { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!("  spotify_client_id: {}", display_opt(config.spotify_client_id.as_deref()));
    println!("  spotify_client_secret: {}", mask(config.spotify_client_secret.as_deref()));
    println!("  spotify_user_token: {}", mask(config.spotify_user_token.as_deref()));
    println!("  lastfm_api_key: {}", mask(config.lastfm_api_key.as_deref()));
    println!("  database_path: {}", config.database_path.display());
    println!("  estimator: {}", config.estimator);
    println!("  batch_size: {}", config.effective_batch_size());
    println!("  max_tracks: {}", config.max_tracks);
    println!("  timeout_secs: {}", config.timeout_secs);
    println!("  log_level: {}", config.level_filter());
    println!(
        "  rules_path: {}",
        config
            .rules_path
            .as_ref()
            .map_or_else(|| "<built-in>".to_string(), |p| p.display().to_string())
    );

    println!("\nPriority: CLI args > ENV vars (MOODSCOPE_*) > Config file > Defaults");

    Ok(())
}

fn display_opt(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("<not set>")
}

fn mask(value: Option<&str>) -> String {
    match value.filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > 4 => {
            let tail: String = v.chars().skip(v.chars().count() - 4).collect();
            format!("****{tail}")
        }
        Some(_) => "****".to_string(),
        None => "<not set>".to_string(),
    }
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    config::set_value(key, value)?;
    println!("✓ Updated {} = {}", key, value);
    println!("  in {}", config::config_file_path().display());
    Ok(())
}

/// Show the config file path.
pub fn show_path() {
    println!("{}", config::config_file_path().display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file or use 'moodscope config set' to add credentials.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
