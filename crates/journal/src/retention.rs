//! Retention and garbage collection
//!
//! Blobs are reclaimed by mark and sweep: the live set is every hash
//! reachable from any persisted snapshot, and everything else in the blob
//! store is deleted. Pruning drops old snapshot metadata first and then
//! runs the same sweep, all inside one store lock.

use crate::history::History;
use crate::lock::StoreLock;
use snap_core::{Config, ObjectHash, Result, SnapError, SnapshotId};
use std::collections::HashSet;
use std::time::Instant;

/// How much history `prune` keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Newest snapshots to keep; 0 keeps everything
    pub keep_last: usize,
}

impl RetentionPolicy {
    pub fn keep_last(count: usize) -> Self {
        Self { keep_last: count }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            keep_last: config.retention.keep_last,
        }
    }

    /// The oldest snapshot this policy keeps, if anything must go
    fn cutoff(&self, ids: &[SnapshotId]) -> Option<SnapshotId> {
        if self.keep_last == 0 || ids.len() <= self.keep_last {
            return None;
        }
        Some(ids[ids.len() - self.keep_last])
    }
}

/// Result of a blob sweep
#[derive(Debug, Default)]
pub struct GcReport {
    pub removed: Vec<ObjectHash>,
    pub bytes_freed: u64,
    /// Blobs that could not be deleted; the sweep carries on past them
    pub failures: Vec<(ObjectHash, SnapError)>,
    pub duration_ms: u64,
}

impl GcReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn log_summary(&self) {
        tracing::info!(
            removed = self.removed.len(),
            bytes_freed = self.bytes_freed,
            failures = self.failures.len(),
            duration_ms = self.duration_ms,
            "gc completed"
        );
    }
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub snapshots_removed: Vec<SnapshotId>,
    pub gc: GcReport,
}

impl History<'_> {
    /// Union of blob hashes referenced by every persisted snapshot
    ///
    /// Fails if any snapshot cannot be read, so a sweep never runs on an
    /// incomplete live set.
    pub fn referenced_objects(&self) -> Result<HashSet<ObjectHash>> {
        let mut live = HashSet::new();
        for entry in self.list()? {
            let tree = self.load(entry.id)?;
            live.extend(tree.leaves().map(|(_, node)| node.hash));
        }
        Ok(live)
    }

    /// Delete every stored blob no snapshot references
    pub fn gc(&self) -> Result<GcReport> {
        let _lock = StoreLock::acquire(self.store())?;
        self.sweep()
    }

    /// Remove every snapshot strictly older than `id`
    ///
    /// Fails with `NoSuchSnapshot`, leaving history untouched, when `id`
    /// is not in history. Blobs are left for `gc`.
    pub fn wipe_before(&self, id: SnapshotId) -> Result<Vec<SnapshotId>> {
        let _lock = StoreLock::acquire(self.store())?;
        self.wipe_before_unlocked(id)
    }

    /// Apply `policy` to history, then sweep orphaned blobs
    pub fn prune(&self, policy: &RetentionPolicy) -> Result<PruneReport> {
        let _lock = StoreLock::acquire(self.store())?;

        let ids: Vec<_> = self.list()?.into_iter().map(|entry| entry.id).collect();
        let snapshots_removed = match policy.cutoff(&ids) {
            Some(cutoff) => self.wipe_before_unlocked(cutoff)?,
            None => Vec::new(),
        };

        let gc = self.sweep()?;
        Ok(PruneReport {
            snapshots_removed,
            gc,
        })
    }

    fn wipe_before_unlocked(&self, id: SnapshotId) -> Result<Vec<SnapshotId>> {
        let ids: Vec<_> = self.list()?.into_iter().map(|entry| entry.id).collect();
        let position = ids
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or_else(|| SnapError::NoSuchSnapshot { id: id.to_hex() })?;

        let doomed = ids[..position].to_vec();
        for old in &doomed {
            self.remove_unlocked(*old)?;
        }

        tracing::debug!(kept_from = %id, removed = doomed.len(), "wiped old snapshots");
        Ok(doomed)
    }

    fn sweep(&self) -> Result<GcReport> {
        let start = Instant::now();
        let blobs = self.store().blob_store();

        // Mark
        let live = self.referenced_objects()?;

        // Enumerate fully before deleting so shard directories are not
        // removed out from under the iterator
        let stored = blobs.list()?.collect::<Result<Vec<_>>>()?;

        // Sweep
        let mut report = GcReport::default();
        for hash in stored.into_iter().filter(|hash| !live.contains(hash)) {
            match blobs.remove(hash) {
                Ok(size) => {
                    report.removed.push(hash);
                    report.bytes_freed += size;
                }
                Err(e) => {
                    tracing::warn!(%hash, error = %e, "failed to remove unreferenced blob");
                    report.failures.push((hash, e));
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.log_summary();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snap_core::hash::hash_bytes;

    #[test]
    fn test_cutoff() {
        let ids: Vec<_> = (0u8..5).map(|i| hash_bytes(&[i])).collect();

        assert_eq!(RetentionPolicy::keep_last(0).cutoff(&ids), None);
        assert_eq!(RetentionPolicy::keep_last(5).cutoff(&ids), None);
        assert_eq!(RetentionPolicy::keep_last(9).cutoff(&ids), None);
        assert_eq!(RetentionPolicy::keep_last(2).cutoff(&ids), Some(ids[3]));
        assert_eq!(RetentionPolicy::keep_last(1).cutoff(&ids), Some(ids[4]));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = Config::default();
        config.retention.keep_last = 7;
        assert_eq!(RetentionPolicy::from_config(&config).keep_last, 7);
    }
}
