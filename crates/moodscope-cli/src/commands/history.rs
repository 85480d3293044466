use anyhow::{Context, Result};
use std::path::Path;

use moodscope_core::{AnalysisLog, PlaylistId};

pub fn show_history(db_path: &Path, playlist: Option<&str>, limit: usize) -> Result<()> {
    if !db_path.exists() {
        println!("No analyses recorded yet ({} does not exist)", db_path.display());
        return Ok(());
    }

    let playlist_id = playlist
        .map(PlaylistId::parse)
        .transpose()
        .context("Invalid playlist reference")?;

    let log = AnalysisLog::open(db_path)?;
    let entries = log.list(playlist_id.as_ref(), limit)?;

    println!("\n📜 Analysis history ({} recorded)\n", log.count()?);
    if entries.is_empty() {
        println!("  No matching analyses.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "  {}  {}  {:>4} tracks  {:<20}  {}",
            entry.recorded_at.format("%Y-%m-%d %H:%M"),
            entry.playlist_id,
            entry.total_tracks,
            entry.dominant_mood.to_string(),
            entry.provenance
        );
    }

    Ok(())
}
