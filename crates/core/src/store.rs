//! Control directory management

use crate::blob::BlobStore;
use crate::config::Config;
use crate::error::{IoResultExt, Result, SnapError};
use crate::hash::ObjectHash;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the control directory inside a working root
pub const CONTROL_DIR: &str = ".snap";

const STORAGE_DIR: &str = "storage";
const SNAPSHOTS_DIR: &str = "snapshots";
const IGNORE_FILE: &str = "ignore";
const CONFIG_FILE: &str = "config.toml";
const LOCKS_DIR: &str = "locks";
const TMP_DIR: &str = "tmp";

const DEFAULT_IGNORE: &str = "# One glob pattern per line; '#' starts a comment.\n";

/// Handle on a working root and its control directory
///
/// ```text
/// .snap/
///   config.toml
///   ignore
///   locks/
///     store.lock
///   storage/
///     <2 hex>/<62 hex>
///   snapshots/
///     <64 hex>
///   tmp/
/// ```
pub struct Store {
    /// Working tree root
    root: PathBuf,
    /// Path to .snap directory
    control_dir: PathBuf,
    blob_store: BlobStore,
    config: Config,
}

impl Store {
    /// Bootstrap the control directory under `root`
    pub fn init(root: &Path) -> Result<Self> {
        let control_dir = root.join(CONTROL_DIR);

        if control_dir.exists() {
            return Err(SnapError::Conflict { path: control_dir });
        }

        for dir in [STORAGE_DIR, SNAPSHOTS_DIR, LOCKS_DIR, TMP_DIR] {
            let path = control_dir.join(dir);
            fs::create_dir_all(&path).at(&path)?;
        }

        let ignore_path = control_dir.join(IGNORE_FILE);
        fs::write(&ignore_path, DEFAULT_IGNORE).at(&ignore_path)?;

        let config = Config::default();
        let config_path = control_dir.join(CONFIG_FILE);
        fs::write(&config_path, config.to_toml()?).at(&config_path)?;

        tracing::debug!(root = %root.display(), "initialized store");
        Ok(Self::assemble(root, control_dir, config))
    }

    /// Open an existing control directory under `root`
    pub fn open(root: &Path) -> Result<Self> {
        let control_dir = root.join(CONTROL_DIR);

        for dir in [STORAGE_DIR, SNAPSHOTS_DIR] {
            let path = control_dir.join(dir);
            if !path.is_dir() {
                return Err(SnapError::io(
                    &path,
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "not a snap repository (missing control directory)",
                    ),
                ));
            }
        }

        // Created lazily so stores bootstrapped by older layouts still open
        for dir in [LOCKS_DIR, TMP_DIR] {
            let path = control_dir.join(dir);
            fs::create_dir_all(&path).at(&path)?;
        }

        let config = Config::load(&control_dir.join(CONFIG_FILE))?;
        Ok(Self::assemble(root, control_dir, config))
    }

    fn assemble(root: &Path, control_dir: PathBuf, config: Config) -> Self {
        let blob_store = BlobStore::new(control_dir.join(STORAGE_DIR), control_dir.join(TMP_DIR))
            .with_mmap_threshold(config.snapshot.mmap_threshold);
        Self {
            root: root.to_path_buf(),
            control_dir,
            blob_store,
            config,
        }
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.blob_store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Working tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the .snap directory
    pub fn control_dir(&self) -> &Path {
        &self.control_dir
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.control_dir.join(SNAPSHOTS_DIR)
    }

    /// Persisted location of a snapshot
    pub fn snapshot_path(&self, id: ObjectHash) -> PathBuf {
        self.snapshots_dir().join(id.to_hex())
    }

    pub fn ignore_path(&self) -> PathBuf {
        self.control_dir.join(IGNORE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.control_dir.join(LOCKS_DIR).join("store.lock")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.control_dir.join(TMP_DIR)
    }
}

/// Atomic write helper
///
/// Writes data to a temporary file, fsyncs it, then renames it to the target path.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(tmp_dir).at(tmp_dir)?;

    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let mut temp_file = fs::File::create(&temp_path).at(&temp_path)?;
    temp_file.write_all(data).at(&temp_path)?;
    temp_file.sync_all().at(&temp_path)?;
    drop(temp_file);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(SnapError::io(target, e));
    }

    // Best effort, may fail on some filesystems
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
