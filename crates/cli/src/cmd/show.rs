//! Show the contents of one snapshot

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snap_journal::History;

pub fn run(reference: &str, as_tree: bool) -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let id = history.resolve(reference)?;
    let tree = history.load(id)?;

    println!("{} {}", "snapshot".bold(), id.to_string().yellow());
    println!();

    if as_tree {
        print!("{}", tree.render());
        return Ok(());
    }

    for (path, file) in tree.leaves() {
        println!("{}  {}", util::short_id(&file.hash).dimmed(), path.display());
    }
    Ok(())
}
