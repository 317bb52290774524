//! Working tree walk and mtime-based change detection
//!
//! A path is `new` when the prior snapshot has no file there, `modified`
//! when its current mtime is strictly greater than the recorded one, and
//! `unchanged` otherwise. Unchanged files are never re-hashed, so a
//! content edit that leaves the mtime in place (or rolls it back) goes
//! unnoticed.

use crate::error::{Result, SnapError};
use crate::ignore::IgnoreRules;
use crate::tree::{Directory, FileNode, Mtime};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A trackable file found in the working tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingFile {
    /// Path relative to the walked root
    pub path: PathBuf,
    /// Path as found on disk
    pub abs_path: PathBuf,
    pub mtime: Mtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeState {
    New,
    Modified,
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Modified => f.write_str("modified"),
        }
    }
}

/// Outcome of comparing one working file against the prior snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    New,
    Modified(&'a FileNode),
    Unchanged(&'a FileNode),
}

impl Classification<'_> {
    /// `None` for unchanged files
    pub fn state(&self) -> Option<ChangeState> {
        match self {
            Self::New => Some(ChangeState::New),
            Self::Modified(_) => Some(ChangeState::Modified),
            Self::Unchanged(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub state: ChangeState,
}

pub fn classify<'a>(prior: Option<&'a Directory>, path: &Path, mtime: Mtime) -> Classification<'a> {
    let Some(tree) = prior else {
        return Classification::New;
    };

    match tree.lookup(path) {
        Ok(node) if mtime > node.mtime => Classification::Modified(node),
        Ok(node) => Classification::Unchanged(node),
        Err(_) => Classification::New,
    }
}

/// Recursively collect trackable files under `root`
///
/// Ignored directories are pruned, never descended into. Symlinks are
/// tracked as files by the content they resolve to; symlinks to
/// directories and dangling symlinks are skipped.
pub fn walk(root: &Path, ignore: &IgnoreRules) -> Result<Vec<WorkingFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(root) {
            Ok(rel) => !ignore.matches(rel, entry.file_type().is_dir()),
            Err(_) => true,
        });

    for entry in walker {
        let entry = entry.map_err(walk_error)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }

        let metadata = if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(target) if target.is_file() => target,
                Ok(_) => {
                    tracing::warn!(path = %entry.path().display(), "skipping symlink to a non-file");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping dangling symlink");
                    continue;
                }
            }
        } else if file_type.is_file() {
            entry.metadata().map_err(walk_error)?
        } else {
            tracing::trace!(path = %entry.path().display(), "skipping special file");
            continue;
        };

        let mtime = Mtime::from_metadata(&metadata).map_err(|_| {
            SnapError::invalid("mtime", format!("out of range for {}", entry.path().display()))
        })?;

        let path = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| SnapError::invalid("path", entry.path().display().to_string()))?
            .to_path_buf();

        files.push(WorkingFile {
            path,
            abs_path: entry.path().to_path_buf(),
            mtime,
        });
    }

    Ok(files)
}

/// Read-only preview of what a snapshot of `root` would record as new or
/// modified relative to `snapshot`
pub fn changes(
    root: &Path,
    ignore: &IgnoreRules,
    snapshot: Option<&Directory>,
) -> Result<Vec<Change>> {
    let mut changes = Vec::new();

    for file in walk(root, ignore)? {
        if let Some(state) = classify(snapshot, &file.path, file.mtime).state() {
            changes.push(Change {
                path: file.path,
                state,
            });
        }
    }

    Ok(changes)
}

fn walk_error(err: walkdir::Error) -> SnapError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    match err.into_io_error() {
        Some(source) => SnapError::Io { path, source },
        None => SnapError::invalid("working tree", format!("filesystem loop at {}", path.display())),
    }
}
