//! Display snapshot history

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snap_journal::History;

pub fn run(limit: Option<usize>) -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let entries = history.list()?;
    if entries.is_empty() {
        println!("{}", "No snapshots yet".dimmed());
        return Ok(());
    }

    let latest = entries.last().map(|entry| entry.id);
    let shown = limit.unwrap_or(entries.len());

    for entry in entries.iter().rev().take(shown) {
        let files = history.load(entry.id)?.leaves().count();
        let marker = if Some(entry.id) == latest { " (latest)" } else { "" };

        println!(
            "{}  {}  {}  {} files{}",
            util::short_id(&entry.id).yellow(),
            util::format_absolute_time(entry.created),
            util::format_relative_time(entry.created).dimmed(),
            files,
            marker.green()
        );
    }

    if shown < entries.len() {
        println!("{}", format!("... {} older", entries.len() - shown).dimmed());
    }
    Ok(())
}
