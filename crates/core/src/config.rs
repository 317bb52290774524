//! `config.toml` handling

use crate::error::{IoResultExt, Result, SnapError};
use crate::hash::DEFAULT_MMAP_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a stored blob is realized in a working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterializeMode {
    /// Independent, user-writable copy
    #[default]
    Copy,
    /// Shared inode with the store (inherits read-only permissions)
    Hardlink,
    /// Symbolic link to the resolved store path
    Symlink,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Hash new and modified files on the rayon pool
    #[serde(default = "default_true")]
    pub parallel_hashing: bool,
    /// Files at or above this size are hashed through mmap
    #[serde(default = "default_mmap_threshold")]
    pub mmap_threshold: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            parallel_hashing: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub mode: MaterializeMode,
    /// Remove new/modified working files before checkout
    #[serde(default = "default_true")]
    pub unlink_existing: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            mode: MaterializeMode::Copy,
            unlink_existing: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Patterns applied in addition to the `ignore` file
    #[serde(default)]
    pub additional_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Snapshots kept by `prune`; 0 keeps everything
    #[serde(default)]
    pub keep_last: usize,
}

fn default_true() -> bool {
    true
}

fn default_mmap_threshold() -> u64 {
    DEFAULT_MMAP_THRESHOLD
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).at(path)?;
        toml::from_str(&content)
            .map_err(|e| SnapError::invalid("config.toml", e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SnapError::invalid("config.toml", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::load(&temp_dir.path().join("config.toml"))?;
        assert_eq!(config, Config::default());
        assert!(config.snapshot.parallel_hashing);
        assert_eq!(config.checkout.mode, MaterializeMode::Copy);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[checkout]\nmode = \"hardlink\"\n\n[ignore]\nadditional_patterns = [\"*.log\"]\n",
        )
        .unwrap();

        let config = Config::load(&path)?;
        assert_eq!(config.checkout.mode, MaterializeMode::Hardlink);
        assert!(config.checkout.unlink_existing);
        assert_eq!(config.ignore.additional_patterns, vec!["*.log".to_string()]);
        assert_eq!(config.snapshot.mmap_threshold, DEFAULT_MMAP_THRESHOLD);
        Ok(())
    }

    #[test]
    fn test_roundtrip_through_toml() -> Result<()> {
        let mut config = Config::default();
        config.retention.keep_last = 5;
        config.checkout.mode = MaterializeMode::Symlink;

        let parsed: Config = toml::from_str(&config.to_toml()?).unwrap();
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_garbage_is_invalid_data() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[checkout\nmode = ").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(SnapError::InvalidData { .. })
        ));
    }
}
