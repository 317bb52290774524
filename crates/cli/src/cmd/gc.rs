//! Run garbage collection

use crate::util;
use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use snap_journal::{GcReport, History};

pub fn run() -> Result<()> {
    let store = util::open_store()?;
    let history = History::new(&store);

    println!("{}", "Running Garbage Collection...".bold());
    println!();

    let report = history.gc()?;
    print_report(&report);

    if !report.is_clean() {
        bail!("{} blobs could not be removed", report.failures.len());
    }
    Ok(())
}

pub fn print_report(report: &GcReport) {
    if report.removed.is_empty() && report.failures.is_empty() {
        println!("{}", "No garbage found - store is already clean".dimmed());
        return;
    }

    println!("Blobs deleted: {}", report.removed.len().to_string().yellow());
    println!("Space freed:   {}", util::format_size(report.bytes_freed).green());

    for (hash, err) in &report.failures {
        println!("  {} {}: {}", "failed".red(), util::short_id(hash), err);
    }
}
