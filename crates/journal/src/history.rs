//! Snapshot history: every persisted tree under `.snap/snapshots/`

use crate::lock::StoreLock;
use dashmap::DashMap;
use snap_core::error::IoResultExt;
use snap_core::{Directory, ObjectHash, Result, SnapError, SnapshotId, Store};
use std::fs;
use std::sync::Arc;
use std::time::SystemTime;

/// A persisted snapshot and when its file was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub id: SnapshotId,
    pub created: SystemTime,
}

/// History handle over a store's snapshot directory
pub struct History<'a> {
    store: &'a Store,
    /// Loaded trees; snapshots are immutable so entries never go stale
    cache: DashMap<SnapshotId, Arc<Directory>>,
}

impl<'a> History<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    pub fn store(&self) -> &'a Store {
        self.store
    }

    /// All snapshots, oldest first
    ///
    /// Ordered by the snapshot file's timestamp; ties are broken by ID so
    /// the order is stable.
    pub fn list(&self) -> Result<Vec<SnapshotEntry>> {
        let dir = self.store.snapshots_dir();
        let mut entries = Vec::new();

        for item in fs::read_dir(&dir).at(&dir)? {
            let item = item.at(&dir)?;
            let name = item.file_name();
            let Some(id) = name.to_str().and_then(|n| ObjectHash::from_hex(n).ok()) else {
                continue;
            };

            let path = item.path();
            let created = item.metadata().at(&path)?.modified().at(&path)?;
            entries.push(SnapshotEntry { id, created });
        }

        entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Most recent snapshot, `None` on an empty history
    pub fn latest(&self) -> Result<Option<SnapshotId>> {
        Ok(self.list()?.last().map(|entry| entry.id))
    }

    pub fn latest_tree(&self) -> Result<Option<Arc<Directory>>> {
        match self.latest()? {
            Some(id) => self.load(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.store.snapshot_path(id).is_file()
    }

    pub fn load(&self, id: SnapshotId) -> Result<Arc<Directory>> {
        if let Some(cached) = self.cache.get(&id) {
            return Ok(Arc::clone(&cached));
        }

        let tree = Arc::new(Directory::load(self.store, id)?);
        self.cache.insert(id, Arc::clone(&tree));
        Ok(tree)
    }

    /// Resolve a full ID or a unique prefix of at least 4 hex characters
    pub fn resolve(&self, reference: &str) -> Result<SnapshotId> {
        let not_found = || SnapError::NoSuchSnapshot {
            id: reference.to_string(),
        };

        if let Ok(id) = ObjectHash::from_hex(reference) {
            return if self.contains(id) { Ok(id) } else { Err(not_found()) };
        }

        if reference.len() < 4 {
            return Err(not_found());
        }

        let reference_lower = reference.to_ascii_lowercase();
        let matching: Vec<_> = self
            .list()?
            .into_iter()
            .filter(|entry| entry.id.to_hex().starts_with(&reference_lower))
            .collect();

        match matching.as_slice() {
            [only] => Ok(only.id),
            [] => Err(not_found()),
            many => Err(SnapError::InvalidData {
                what: "snapshot reference",
                reason: format!("'{}' matches {} snapshots", reference, many.len()),
            }),
        }
    }

    /// Delete one snapshot's metadata; blobs are left for `gc`
    pub fn remove(&self, id: SnapshotId) -> Result<()> {
        let _lock = StoreLock::acquire(self.store)?;
        self.remove_unlocked(id)
    }

    pub(crate) fn remove_unlocked(&self, id: SnapshotId) -> Result<()> {
        let path = self.store.snapshot_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapError::NoSuchSnapshot { id: id.to_hex() });
            }
            Err(e) => return Err(SnapError::Io { path, source: e }),
        }

        self.cache.remove(&id);
        tracing::debug!(%id, "removed snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use snap_core::{FileNode, Mtime};
    use std::path::Path;
    use tempfile::TempDir;

    fn saved(store: &Store, name: &str, stamp: i64) -> Result<SnapshotId> {
        let mut tree = Directory::new();
        tree.add_file(
            Path::new(name),
            FileNode::new(Mtime::from_nanos(1), snap_core::hash::hash_bytes(name.as_bytes())),
        )?;
        let id = tree.save(store)?;
        set_file_mtime(store.snapshot_path(id), FileTime::from_unix_time(stamp, 0)).unwrap();
        Ok(id)
    }

    #[test]
    fn test_list_sorted_by_time() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path())?;
        let history = History::new(&store);
        assert!(history.list()?.is_empty());
        assert_eq!(history.latest()?, None);

        let newest = saved(&store, "c", 3_000)?;
        let oldest = saved(&store, "a", 1_000)?;
        let middle = saved(&store, "b", 2_000)?;

        let ids: Vec<_> = history.list()?.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![oldest, middle, newest]);
        assert_eq!(history.latest()?, Some(newest));
        Ok(())
    }

    #[test]
    fn test_list_ties_break_by_id() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path())?;
        let history = History::new(&store);

        let mut ids = vec![saved(&store, "x", 500)?, saved(&store, "y", 500)?];
        ids.sort();

        let listed: Vec<_> = history.list()?.into_iter().map(|e| e.id).collect();
        assert_eq!(listed, ids);
        Ok(())
    }

    #[test]
    fn test_list_ignores_stray_files() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path())?;
        fs::write(store.snapshots_dir().join("notes.txt"), b"hi").unwrap();

        assert!(History::new(&store).list()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_remove() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path())?;
        let history = History::new(&store);
        let id = saved(&store, "a", 1_000)?;

        history.load(id)?;
        history.remove(id)?;
        assert!(!history.contains(id));
        assert!(matches!(history.load(id), Err(SnapError::NoSuchSnapshot { .. })));
        assert!(matches!(history.remove(id), Err(SnapError::NoSuchSnapshot { .. })));
        Ok(())
    }

    #[test]
    fn test_resolve_prefix() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path())?;
        let history = History::new(&store);
        let id = saved(&store, "a", 1_000)?;
        let hex = id.to_hex();

        assert_eq!(history.resolve(&hex)?, id);
        assert_eq!(history.resolve(&hex[..8])?, id);
        assert_eq!(history.resolve(&hex[..8].to_uppercase())?, id);
        assert!(history.resolve(&hex[..3]).is_err());

        let other = if hex.starts_with('0') { "1111" } else { "0000" };
        assert!(matches!(
            history.resolve(other),
            Err(SnapError::NoSuchSnapshot { .. })
        ));
        Ok(())
    }
}
