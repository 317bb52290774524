//! Check store integrity

use crate::util;
use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use snap_journal::History;

pub fn run() -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);
    let blobs = store.blob_store();

    let mut checked = 0usize;
    let mut corrupt = Vec::new();
    for hash in blobs.list()? {
        let hash = hash?;
        checked += 1;
        if !blobs.verify(hash)? {
            corrupt.push(hash);
        }
    }

    let mut missing: Vec<_> = history
        .referenced_objects()?
        .into_iter()
        .filter(|hash| !blobs.has_blob(*hash))
        .collect();
    missing.sort();

    for hash in &corrupt {
        println!("  {} {}", "corrupt".red(), hash);
    }
    for hash in &missing {
        println!("  {} {}", "missing".red(), hash);
    }

    if !corrupt.is_empty() || !missing.is_empty() {
        bail!(
            "Verification failed: {} corrupt, {} missing",
            corrupt.len(),
            missing.len()
        );
    }

    println!("{} {} blobs checked", "OK".green().bold(), checked);
    Ok(())
}
