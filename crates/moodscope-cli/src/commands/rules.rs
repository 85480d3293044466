use anyhow::{Context, Result};
use std::path::PathBuf;

use moodscope_core::EstimationRules;

/// Print the built-in rules as TOML, a starting point for a custom file.
pub fn show_rules() -> Result<()> {
    let rules = EstimationRules::builtin();
    let content = toml::to_string_pretty(&rules).context("Failed to serialize rules")?;
    println!("# Moodscope estimation rules");
    println!("#");
    println!("# Save as a file and point rules_path at it to override the defaults.\n");
    print!("{}", content);
    Ok(())
}

/// Validate a rules file.
pub fn validate_rules(path: Option<PathBuf>) -> Result<()> {
    let Some(rules_path) = path else {
        println!("No rules file configured; the built-in rules are in use.");
        println!("\nRun 'moodscope rules show' to see them.");
        return Ok(());
    };

    if !rules_path.exists() {
        println!("Rules file not found: {}", rules_path.display());
        return Ok(());
    }

    match EstimationRules::load(&rules_path) {
        Ok(rules) => {
            println!("✓ Rules file is valid!");
            println!("\nSummary:");
            println!("  Baseline:           {:.2}", rules.baseline);
            println!(
                "  Popularity bonus:   +{:.2} above {}",
                rules.popularity_bonus, rules.popularity_threshold
            );
            println!("  Keyword families:   {}", rules.families.len());
            for family in &rules.families {
                println!(
                    "    {:<12} energy {:+.2}  valence {:+.2}  ({} keywords)",
                    family.name,
                    family.energy,
                    family.valence,
                    family.keywords.len()
                );
            }
        }
        Err(e) => {
            println!("✗ Rules file has errors:");
            println!("\n{}", e);
            println!("\nFix the errors and run 'moodscope rules validate' again.");
        }
    }

    Ok(())
}
