//! Snapshot construction
//!
//! Walks the working tree, reuses the prior snapshot's node for every file
//! whose mtime has not moved forward, and stores only new or modified
//! files in the blob store before persisting the resulting tree.

use crate::history::History;
use crate::lock::StoreLock;
use rayon::prelude::*;
use snap_core::{
    classify, walk, Change, Classification, Directory, FileNode, IgnoreRules, Result, SnapshotId,
    Store, WorkingFile,
};

/// File counts for one build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl BuildStats {
    pub fn stored(&self) -> usize {
        self.new + self.modified
    }

    pub fn total(&self) -> usize {
        self.stored() + self.unchanged
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub id: SnapshotId,
    pub tree: Directory,
    pub stats: BuildStats,
}

pub struct SnapshotBuilder<'a> {
    store: &'a Store,
    ignore: IgnoreRules,
    parallel: bool,
}

impl<'a> SnapshotBuilder<'a> {
    /// Builder using the store's ignore rules and hashing settings
    pub fn new(store: &'a Store) -> Result<Self> {
        Ok(Self {
            store,
            ignore: IgnoreRules::load(store)?,
            parallel: store.config().snapshot.parallel_hashing,
        })
    }

    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Build a tree of the working directory relative to `prior`
    ///
    /// Blobs for new and modified files are stored; the tree itself is not
    /// persisted.
    pub fn build(&self, prior: Option<&Directory>) -> Result<(Directory, BuildStats)> {
        let mut tree = Directory::new();
        let mut stats = BuildStats::default();
        let mut pending: Vec<WorkingFile> = Vec::new();

        // Step 1: Classify every working file against the prior snapshot
        for file in walk(self.store.root(), &self.ignore)? {
            match classify(prior, &file.path, file.mtime) {
                Classification::Unchanged(node) => {
                    tree.add_file(&file.path, *node)?;
                    stats.unchanged += 1;
                }
                Classification::Modified(_) => {
                    stats.modified += 1;
                    pending.push(file);
                }
                Classification::New => {
                    stats.new += 1;
                    pending.push(file);
                }
            }
        }

        // Step 2: Store changed content
        let stored = self.store_files(&pending)?;

        // Step 3: Record the mtime observed during the walk with the new hash
        for (file, hash) in pending.iter().zip(stored) {
            tree.add_file(&file.path, FileNode::new(file.mtime, hash))?;
        }

        tracing::debug!(
            new = stats.new,
            modified = stats.modified,
            unchanged = stats.unchanged,
            "built snapshot tree"
        );
        Ok((tree, stats))
    }

    fn store_files(&self, files: &[WorkingFile]) -> Result<Vec<snap_core::ObjectHash>> {
        let blobs = self.store.blob_store();
        if self.parallel {
            files.par_iter().map(|file| blobs.put(&file.abs_path)).collect()
        } else {
            files.iter().map(|file| blobs.put(&file.abs_path)).collect()
        }
    }

    /// What a build would store relative to `prior`, without storing it
    pub fn preview(&self, prior: Option<&Directory>) -> Result<Vec<Change>> {
        snap_core::changes(self.store.root(), &self.ignore, prior)
    }
}

/// Snapshot the working tree against the latest snapshot and persist it
///
/// Runs under the store lock. Building an unchanged tree yields the latest
/// snapshot's ID again and writes nothing.
pub fn create_snapshot(history: &History<'_>) -> Result<BuildOutcome> {
    let builder = SnapshotBuilder::new(history.store())?;
    create_snapshot_with(history, &builder)
}

pub fn create_snapshot_with(history: &History<'_>, builder: &SnapshotBuilder<'_>) -> Result<BuildOutcome> {
    let _lock = StoreLock::acquire(history.store())?;

    let prior = history.latest_tree()?;
    let (tree, stats) = builder.build(prior.as_deref())?;
    let id = tree.save(history.store())?;

    tracing::info!(%id, files = stats.total(), stored = stats.stored(), "snapshot created");
    Ok(BuildOutcome { id, tree, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_at(root: &Path, rel: &str, data: &[u8], secs: i64) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, data).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn test_build_counts_and_reuse() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let store = Store::init(root)?;
        write_at(root, "a.txt", b"A", 100);
        write_at(root, "d/b.txt", b"B", 100);

        let builder = SnapshotBuilder::new(&store)?.parallel(false);
        let (first, stats) = builder.build(None)?;
        assert_eq!(stats, BuildStats { new: 2, modified: 0, unchanged: 0 });

        write_at(root, "a.txt", b"A2", 200);
        write_at(root, "c.txt", b"C", 100);
        let (second, stats) = builder.build(Some(&first))?;
        assert_eq!(stats, BuildStats { new: 1, modified: 1, unchanged: 1 });
        assert_eq!(
            second.lookup(Path::new("d/b.txt"))?,
            first.lookup(Path::new("d/b.txt"))?
        );
        assert_ne!(
            second.lookup(Path::new("a.txt"))?.hash,
            first.lookup(Path::new("a.txt"))?.hash
        );
        Ok(())
    }

    #[test]
    fn test_unchanged_file_is_not_rehashed() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let store = Store::init(root)?;
        write_at(root, "a.txt", b"original", 100);

        let builder = SnapshotBuilder::new(&store)?;
        let (first, _) = builder.build(None)?;

        // Same mtime, different bytes: carried over untouched
        write_at(root, "a.txt", b"sneaky", 100);
        let (second, stats) = builder.build(Some(&first))?;
        assert_eq!(stats.unchanged, 1);
        assert_eq!(second, first);
        Ok(())
    }

    #[test]
    fn test_parallel_matches_serial() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let store = Store::init(root)?;
        for i in 0..32 {
            write_at(root, &format!("dir{}/file{}.txt", i % 4, i), format!("{i}").as_bytes(), 100);
        }

        let (serial, _) = SnapshotBuilder::new(&store)?.parallel(false).build(None)?;
        let (parallel, _) = SnapshotBuilder::new(&store)?.parallel(true).build(None)?;
        assert_eq!(serial.id()?, parallel.id()?);
        Ok(())
    }

    #[test]
    fn test_preview_stores_nothing() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let store = Store::init(root)?;
        write_at(root, "a.txt", b"A", 100);

        let preview = SnapshotBuilder::new(&store)?.preview(None)?;
        assert_eq!(preview.len(), 1);
        assert_eq!(store.blob_store().list()?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_create_snapshot_persists() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let store = Store::init(root)?;
        write_at(root, "a.txt", b"A", 100);

        let history = History::new(&store);
        let outcome = create_snapshot(&history)?;
        assert_eq!(history.latest()?, Some(outcome.id));
        assert_eq!(*history.load(outcome.id)?, outcome.tree);

        // Nothing changed: same ID, still one snapshot
        let again = create_snapshot(&history)?;
        assert_eq!(again.id, outcome.id);
        assert_eq!(again.stats.unchanged, 1);
        assert_eq!(history.list()?.len(), 1);
        Ok(())
    }
}
