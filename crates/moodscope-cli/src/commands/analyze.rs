use anyhow::{Context, Result};
use moodscope_core::{AnalysisLog, PlaylistSummary};
use moodscope_pipeline::{Analysis, Config, MoodAnalyzer};

/// Analyze one playlist, print the report and optionally record it.
pub async fn run_analyze(config: &Config, playlist: &str, json: bool, save: bool) -> Result<()> {
    let analyzer = MoodAnalyzer::from_config(config)?;
    let analysis = analyzer.analyze(playlist).await?;

    if save {
        let history = AnalysisLog::open(&config.database_path).with_context(|| {
            format!(
                "Failed to open history database {}",
                config.database_path.display()
            )
        })?;
        let entry = history.record(&analysis.playlist_id, &analysis.summary)?;
        log::debug!("Recorded analysis {}", entry.id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_report(&analysis);
    }

    Ok(())
}

fn print_report(analysis: &Analysis) {
    let summary = &analysis.summary;

    println!("\n🎧 Playlist {}\n", analysis.playlist_id);
    println!("  Tracks analyzed:  {}", summary.total_tracks);
    if let Some(total) = analysis.truncated_from {
        println!("  (first {} of {} tracks)", summary.total_tracks, total);
    }
    println!("  Dominant mood:    {}", summary.dominant_mood);
    println!("  Mood score:       {:.2}", summary.avg_mood_score);
    println!("  Valence:          {:.2}", summary.avg_valence);
    println!("  Energy:           {:.2}", summary.avg_energy);
    println!("  Danceability:     {:.2}", summary.avg_danceability);
    println!("  Intensity:        {:.2}", summary.avg_intensity);
    println!("  Emotional range:  {:.2}", summary.emotional_range);
    print_optional("Acousticness", summary.avg_acousticness);
    print_optional("Instrumentalness", summary.avg_instrumentalness);
    print_optional("Speechiness", summary.avg_speechiness);
    println!("  Avg popularity:   {:.0}", summary.avg_popularity);
    println!("  Duration:         {:.1} h", summary.total_duration_hours);

    println!("\n  Mood distribution:");
    for entry in &summary.mood_distribution {
        println!("    {:<20} {}", entry.mood.to_string(), entry.count);
    }

    println!();
    print_source(summary);
    if !analysis.unmatched.is_empty() {
        println!(
            "  {} tracks had no audio features and were left out",
            analysis.unmatched.len()
        );
    }
}

fn print_optional(label: &str, value: Option<f64>) {
    if let Some(value) = value {
        println!("  {:<17} {:.2}", format!("{label}:"), value);
    }
}

fn print_source(summary: &PlaylistSummary) {
    if summary.provenance.is_estimated() {
        println!(
            "  ⚠ Features estimated from metadata ({}); treat values as approximate",
            summary.provenance
        );
    } else if summary.using_estimates {
        println!(
            "  ⚠ Features fetched with fallback credentials ({})",
            summary.provenance
        );
    } else {
        println!("  ✓ Features measured by the provider ({})", summary.provenance);
    }
    if summary.uniform_energy {
        println!("  ⚠ Energy is nearly identical across tracks");
    }
}
