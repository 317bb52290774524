//! Materialize a snapshot

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snap_core::MaterializeMode;
use snap_journal::History;
use std::path::PathBuf;

pub fn run(
    reference: &str,
    dest: Option<PathBuf>,
    mode: Option<MaterializeMode>,
    keep_existing: bool,
) -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    let id = history.resolve(reference)?;
    let tree = history.load(id)?;

    let dest = dest.unwrap_or_else(|| store.root().to_path_buf());
    let mode = mode.unwrap_or(store.config().checkout.mode);

    let result = match mode {
        MaterializeMode::Copy => {
            let unlink_existing = store.config().checkout.unlink_existing && !keep_existing;
            tree.checkout(&store, &dest, unlink_existing)
        }
        MaterializeMode::Hardlink => tree.link(&store, &dest, false),
        MaterializeMode::Symlink => tree.link(&store, &dest, true),
    };
    result.with_context(|| format!("Failed to check out {} into {}", util::short_id(&id), dest.display()))?;

    println!(
        "{} {} into {}",
        "Checked out".green(),
        util::short_id(&id).yellow(),
        dest.display()
    );
    Ok(())
}
