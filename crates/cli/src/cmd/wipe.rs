//! Remove history older than a snapshot

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snap_journal::History;

pub fn run(before: &str) -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let id = history.resolve(before)?;
    let removed = history.wipe_before(id)?;

    if removed.is_empty() {
        println!("{}", "Nothing older to remove".dimmed());
        return Ok(());
    }

    for old in &removed {
        println!("  {} {}", "removed".red(), util::short_id(old));
    }
    println!(
        "{} {} snapshots older than {}",
        "Wiped".green(),
        removed.len(),
        util::short_id(&id).yellow()
    );
    Ok(())
}
