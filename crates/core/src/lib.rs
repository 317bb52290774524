//! Snap Core - content-addressed storage primitives for directory snapshots
//!
//! This crate provides the foundational storage layer:
//! - SHA-256 hashing
//! - Blob storage (sharded, read-only, deduplicated)
//! - Snapshot trees and their canonical serialization
//! - Working tree walking and mtime-based change detection
//! - Control directory management

pub mod blob;
pub mod changes;
pub mod config;
pub mod error;
pub mod hash;
pub mod ignore;
pub mod store;
pub mod tree;

// Re-export main types for convenience
pub use blob::BlobStore;
pub use changes::{changes, classify, walk, Change, ChangeState, Classification, WorkingFile};
pub use config::{Config, MaterializeMode};
pub use error::{ErrorKind, Result, SnapError};
pub use hash::ObjectHash;
pub use ignore::IgnoreRules;
pub use store::{Store, CONTROL_DIR};
pub use tree::{Directory, FileNode, Mtime, Node, SnapshotId};
