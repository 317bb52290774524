//! Apply the retention policy and collect garbage

use crate::cmd::gc::print_report;
use anyhow::Result;
use owo_colors::OwoColorize;
use snap_journal::{History, RetentionPolicy};

pub fn run(keep: Option<usize>) -> Result<()> {
    let store = crate::util::open_store()?;
    let history = History::new(&store);

    let policy = match keep {
        Some(count) => RetentionPolicy::keep_last(count),
        None => RetentionPolicy::from_config(store.config()),
    };

    let report = history.prune(&policy)?;

    if policy.keep_last == 0 {
        println!("{}", "Retention keeps every snapshot".dimmed());
    } else {
        println!(
            "Snapshots removed: {} (keeping newest {})",
            report.snapshots_removed.len().to_string().yellow(),
            policy.keep_last
        );
    }
    print_report(&report.gc);
    Ok(())
}
