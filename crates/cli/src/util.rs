//! Shared utilities for CLI commands

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use snap_core::{ObjectHash, Store, CONTROL_DIR};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Find the working root by walking up from `start` to the nearest `.snap/`
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONTROL_DIR).is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => bail!("Not a snap repository (no {} directory found)", CONTROL_DIR),
        }
    }
}

/// Open the store enclosing the current directory
pub fn open_store() -> Result<Store> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let root = find_repo_root(&cwd)?;
    Store::open(&root).with_context(|| format!("Failed to open store at {}", root.display()))
}

/// First 12 hex characters of a hash
pub fn short_id(hash: &ObjectHash) -> String {
    hash.to_hex()[..12].to_string()
}

/// Local wall-clock time ("2024-01-03 14:30:00")
pub fn format_absolute_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Format a timestamp relative to now ("2 hours ago")
pub fn format_relative_time(time: SystemTime) -> String {
    match SystemTime::now().duration_since(time) {
        Ok(elapsed) => {
            let seconds = elapsed.as_secs();
            if seconds < 60 {
                format!("{} seconds ago", seconds)
            } else if seconds < 3600 {
                format!("{} minutes ago", seconds / 60)
            } else if seconds < 86400 {
                format!("{} hours ago", seconds / 3600)
            } else if seconds < 604800 {
                format!("{} days ago", seconds / 86400)
            } else {
                format!("{} weeks ago", seconds / 604800)
            }
        }
        Err(_) => "in the future".to_string(),
    }
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_find_repo_root_walks_up() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join(CONTROL_DIR))?;
        std::fs::create_dir_all(root.join("a/b/c"))?;

        assert_eq!(find_repo_root(&root.join("a/b/c"))?, root);
        assert_eq!(find_repo_root(root)?, root);
        Ok(())
    }

    #[test]
    fn test_find_repo_root_fails_outside() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        // A plain file named like the control directory does not count
        std::fs::write(temp_dir.path().join(CONTROL_DIR), b"")?;
        assert!(find_repo_root(temp_dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_format_relative_time() {
        let now = SystemTime::now();
        assert!(format_relative_time(now - Duration::from_secs(5)).ends_with("seconds ago"));
        assert_eq!(format_relative_time(now - Duration::from_secs(7200)), "2 hours ago");
        assert_eq!(format_relative_time(now + Duration::from_secs(600)), "in the future");
    }

    #[test]
    fn test_short_id() {
        let hash = snap_core::hash::hash_bytes(b"hi");
        assert_eq!(short_id(&hash), "8f434346648f");
    }
}
