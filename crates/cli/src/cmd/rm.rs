//! Remove one snapshot

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snap_journal::History;

pub fn run(reference: &str) -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let id = history.resolve(reference)?;
    history.remove(id)?;

    println!("{} {}", "Removed snapshot".green(), util::short_id(&id).yellow());
    println!("{}", "Run `snap gc` to reclaim unreferenced blobs".dimmed());
    Ok(())
}
