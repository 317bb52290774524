//! Preview what the next snapshot would record

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use snap_core::ChangeState;
use snap_journal::{History, SnapshotBuilder};

pub fn run(against: Option<&str>) -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let base = match against {
        Some(reference) => Some(history.resolve(reference)?),
        None => history.latest()?,
    };
    let tree = base.map(|id| history.load(id)).transpose()?;

    match base {
        Some(id) => println!("Compared against {}", util::short_id(&id).yellow()),
        None => println!("{}", "No snapshots yet; every file is new".dimmed()),
    }

    let changes = SnapshotBuilder::new(&store)?.preview(tree.as_deref())?;
    if changes.is_empty() {
        println!("{}", "Nothing to record".dimmed());
        return Ok(());
    }

    println!();
    for change in &changes {
        match change.state {
            ChangeState::New => println!("  {:>9} {}", "new:".green(), change.path.display()),
            ChangeState::Modified => {
                println!("  {:>9} {}", "modified:".yellow(), change.path.display())
            }
        }
    }
    Ok(())
}
