//! Initialize a snap store

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snap_core::Store;
use std::path::PathBuf;

pub fn run(path: Option<PathBuf>) -> Result<()> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create {}", root.display()))?;
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))?;

    let store = Store::init(&root)
        .with_context(|| format!("Failed to initialize store in {}", root.display()))?;

    println!(
        "{} {}",
        "Initialized empty snap store in".green(),
        store.control_dir().display()
    );
    Ok(())
}
