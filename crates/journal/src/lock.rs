//! Advisory exclusive lock around store mutations
//!
//! Snapshot builds, GC sweeps and prunes form one single-writer critical
//! section. The lock is a `flock` on `.snap/locks/store.lock`, released
//! when the guard is dropped (or the process dies).

use serde::{Deserialize, Serialize};
use snap_core::{Result, SnapError, Store};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Held store lock
pub struct StoreLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Diagnostic content written into the lock file
#[derive(Debug, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at_ms: u64,
}

impl StoreLock {
    /// Block until the store lock is ours
    pub fn acquire(store: &Store) -> Result<Self> {
        Self::acquire_at(&store.lock_path(), true)?.ok_or_else(|| SnapError::Locked {
            path: store.lock_path(),
            reason: "lock unavailable".to_string(),
        })
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(store: &Store) -> Result<Option<Self>> {
        Self::acquire_at(&store.lock_path(), false)
    }

    fn acquire_at(lock_path: &Path, wait: bool) -> Result<Option<Self>> {
        let locked = |reason: String| SnapError::Locked {
            path: lock_path.to_path_buf(),
            reason,
        };

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| locked(e.to_string()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)
            .map_err(|e| locked(e.to_string()))?;

        if !flock_exclusive(&file, wait).map_err(|e| locked(e.to_string()))? {
            tracing::debug!(path = %lock_path.display(), "store lock is held elsewhere");
            return Ok(None);
        }

        write_holder(&mut file).map_err(|e| locked(e.to_string()))?;
        tracing::trace!(path = %lock_path.display(), "acquired store lock");

        Ok(Some(Self {
            path: lock_path.to_path_buf(),
            file,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Who holds (or last held) the lock at `store`
    pub fn holder(store: &Store) -> Result<Option<LockHolder>> {
        let path = store.lock_path();
        let mut contents = String::new();
        match File::open(&path) {
            Ok(mut file) => file
                .read_to_string(&mut contents)
                .map_err(|e| SnapError::Locked {
                    path: path.clone(),
                    reason: e.to_string(),
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SnapError::Locked {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        Ok(serde_json::from_str(&contents).ok())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path.display(), "released store lock");
    }
}

fn write_holder(file: &mut File) -> std::io::Result<()> {
    let holder = LockHolder {
        pid: std::process::id(),
        acquired_at_ms: current_timestamp_ms(),
    };
    let serialized = serde_json::to_string(&holder)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()
}

#[cfg(unix)]
fn flock_exclusive(file: &File, wait: bool) -> std::io::Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    let arg = if wait {
        FlockArg::LockExclusive
    } else {
        FlockArg::LockExclusiveNonblock
    };

    match flock(file.as_raw_fd(), arg) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File, _wait: bool) -> std::io::Result<bool> {
    // No advisory locking; single-process use only
    Ok(true)
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
