//! Record the working tree

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snap_journal::{create_snapshot, History};

pub fn run() -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let previous = history.latest()?;
    let outcome = create_snapshot(&history).context("Failed to create snapshot")?;

    if previous == Some(outcome.id) {
        println!(
            "{} {}",
            "No changes; latest snapshot is".dimmed(),
            util::short_id(&outcome.id).yellow()
        );
        return Ok(());
    }

    let stats = outcome.stats;
    println!("{} {}", "Snapshot".green().bold(), outcome.id.to_string().yellow());
    println!(
        "  {} new, {} modified, {} unchanged",
        stats.new.to_string().green(),
        stats.modified.to_string().yellow(),
        stats.unchanged.to_string().dimmed()
    );
    Ok(())
}
