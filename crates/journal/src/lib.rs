//! Snapshot history and lifecycle
//!
//! This crate provides:
//! - Snapshot construction with unchanged-node reuse
//! - History listing, lookup and removal
//! - Reference tracking, garbage collection and retention
//! - The advisory store lock serializing all of the above

pub mod builder;
pub mod history;
pub mod lock;
pub mod retention;

// Re-exports
pub use builder::{create_snapshot, create_snapshot_with, BuildOutcome, BuildStats, SnapshotBuilder};
pub use history::{History, SnapshotEntry};
pub use lock::{LockHolder, StoreLock};
pub use retention::{GcReport, PruneReport, RetentionPolicy};
