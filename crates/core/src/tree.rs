//! Snapshot tree: a recursive directory/file model of a working tree
//!
//! Canonical form is JSON with sorted keys, directories as nested objects
//! and files as `[mtime, hash]` pairs. A snapshot is named by the SHA-256
//! of that serialization, so identical trees always share an ID.

use crate::config::MaterializeMode;
use crate::error::{IoResultExt, Result, SnapError};
use crate::hash::{hash_bytes, ObjectHash};
use crate::store::{atomic_write, Store};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

/// Snapshot identifier: hash of the canonical tree serialization
pub type SnapshotId = ObjectHash;

/// Modification time in nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mtime(i64);

impl Mtime {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn from_metadata(metadata: &Metadata) -> Result<Self> {
        Self::from_filetime(filetime::FileTime::from_last_modification_time(metadata))
    }

    /// Fails with `InvalidData` outside the representable range (about
    /// years 1677 to 2262)
    pub fn from_filetime(ft: filetime::FileTime) -> Result<Self> {
        ft.unix_seconds()
            .checked_mul(1_000_000_000)
            .and_then(|nanos| nanos.checked_add(i64::from(ft.nanoseconds())))
            .map(Self)
            .ok_or_else(|| {
                SnapError::invalid(
                    "mtime",
                    format!("{}s since the epoch is out of range", ft.unix_seconds()),
                )
            })
    }

    pub fn to_filetime(self) -> filetime::FileTime {
        let secs = self.0.div_euclid(1_000_000_000);
        let nanos = self.0.rem_euclid(1_000_000_000) as u32;
        filetime::FileTime::from_unix_time(secs, nanos)
    }
}

/// Leaf: last observed modification time plus content hash
///
/// Immutable once built; unchanged files are carried from one snapshot
/// into the next by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Mtime, ObjectHash)", into = "(Mtime, ObjectHash)")]
pub struct FileNode {
    pub mtime: Mtime,
    pub hash: ObjectHash,
}

impl FileNode {
    pub fn new(mtime: Mtime, hash: ObjectHash) -> Self {
        Self { mtime, hash }
    }
}

impl From<(Mtime, ObjectHash)> for FileNode {
    fn from((mtime, hash): (Mtime, ObjectHash)) -> Self {
        Self { mtime, hash }
    }
}

impl From<FileNode> for (Mtime, ObjectHash) {
    fn from(node: FileNode) -> Self {
        (node.mtime, node.hash)
    }
}

/// Tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    File(FileNode),
    Directory(Directory),
}

/// Internal node: name -> child
///
/// Children are kept in a `BTreeMap` so serialization is always key-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Directory {
    children: BTreeMap<String, Node>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Insert `file` at `path`, creating intermediate directories on demand
    ///
    /// Replaces a file already at `path`; fails with `Conflict` when a
    /// component would have to be both a file and a directory.
    pub fn add_file(&mut self, path: &Path, file: FileNode) -> Result<()> {
        let parts = split_components(path)?;
        self.insert_parts(path, &parts, file)
    }

    fn insert_parts(&mut self, full: &Path, parts: &[&str], file: FileNode) -> Result<()> {
        let (name, rest) = match parts.split_first() {
            Some(split) => split,
            None => {
                return Err(SnapError::invalid("path", "empty path"));
            }
        };

        if rest.is_empty() {
            if let Some(Node::Directory(_)) = self.children.get(*name) {
                return Err(SnapError::Conflict {
                    path: full.to_path_buf(),
                });
            }
            self.children.insert((*name).to_string(), Node::File(file));
            return Ok(());
        }

        let child = self
            .children
            .entry((*name).to_string())
            .or_insert_with(|| Node::Directory(Directory::new()));

        match child {
            Node::Directory(dir) => dir.insert_parts(full, rest, file),
            Node::File(_) => Err(SnapError::Conflict {
                path: full.to_path_buf(),
            }),
        }
    }

    /// Resolve `path` to the file stored there
    pub fn lookup(&self, path: &Path) -> Result<&FileNode> {
        let no_such_file = || SnapError::NoSuchFile {
            path: path.to_path_buf(),
        };

        let parts = split_components(path).map_err(|_| no_such_file())?;
        let mut dir = self;
        let mut remaining = parts.as_slice();

        while let Some((name, rest)) = remaining.split_first() {
            match dir.children.get(*name) {
                Some(Node::File(file)) if rest.is_empty() => return Ok(file),
                // A file cannot resolve a non-empty residual path
                Some(Node::File(_)) => return Err(no_such_file()),
                Some(Node::Directory(child)) => dir = child,
                None => return Err(no_such_file()),
            }
            remaining = rest;
        }

        // Path named a directory (or nothing at all)
        Err(no_such_file())
    }

    /// Every file in the tree with its relative path
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![(PathBuf::new(), self.children.iter())],
        }
    }

    /// Canonical JSON: sorted keys, no insignificant whitespace
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SnapError::invalid("snapshot", e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| SnapError::invalid("snapshot", e.to_string()))
    }

    /// Snapshot ID this tree would be saved under
    pub fn id(&self) -> Result<SnapshotId> {
        Ok(hash_bytes(&self.to_canonical_json()?))
    }

    /// Persist under `snapshots/<hash of body>`
    ///
    /// Saving a tree that already exists writes nothing.
    pub fn save(&self, store: &Store) -> Result<SnapshotId> {
        let body = self.to_canonical_json()?;
        let id = hash_bytes(&body);
        let path = store.snapshot_path(id);

        if path.exists() {
            tracing::debug!(%id, "snapshot already present");
            return Ok(id);
        }

        atomic_write(&store.tmp_dir(), &path, &body)?;
        tracing::debug!(%id, bytes = body.len(), "saved snapshot");
        Ok(id)
    }

    pub fn load(store: &Store, id: SnapshotId) -> Result<Self> {
        let path = store.snapshot_path(id);
        let body = match std::fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapError::NoSuchSnapshot { id: id.to_hex() });
            }
            Err(e) => return Err(SnapError::Io { path, source: e }),
        };
        Self::from_json(&body)
    }

    /// Copy every leaf under `dest_root`
    ///
    /// With `unlink_existing`, the working files a snapshot of `dest_root`
    /// would classify as new or modified relative to this tree are removed
    /// first. A remaining regular file is kept only if its mtime equals the
    /// recorded one; anything else at a leaf path is replaced, except a
    /// directory, which is a `Conflict`.
    pub fn checkout(&self, store: &Store, dest_root: &Path, unlink_existing: bool) -> Result<()> {
        std::fs::create_dir_all(dest_root).at(dest_root)?;

        if unlink_existing {
            let ignore = crate::ignore::IgnoreRules::load(store)?;
            for change in crate::changes::changes(dest_root, &ignore, Some(self))? {
                let path = dest_root.join(&change.path);
                tracing::debug!(path = %change.path.display(), state = ?change.state, "unlinking before checkout");
                std::fs::remove_file(&path).at(&path)?;
            }
        }

        for (path, file) in self.leaves() {
            let dest = dest_root.join(&path);

            if unlink_existing && !clear_stale(&dest, file)? {
                continue;
            }

            store
                .blob_store()
                .materialize(file.hash, &dest, MaterializeMode::Copy)?;
            filetime::set_file_mtime(&dest, file.mtime.to_filetime()).at(&dest)?;
        }

        Ok(())
    }

    /// Realize the tree under `dest_root` sharing bytes with the store
    pub fn link(&self, store: &Store, dest_root: &Path, soft: bool) -> Result<()> {
        let mode = if soft {
            MaterializeMode::Symlink
        } else {
            MaterializeMode::Hardlink
        };

        std::fs::create_dir_all(dest_root).at(dest_root)?;
        for (path, file) in self.leaves() {
            store
                .blob_store()
                .materialize(file.hash, &dest_root.join(&path), mode)?;
        }
        Ok(())
    }

    /// Indented listing, directories before their contents
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for (name, node) in &self.children {
            out.push_str(&"  ".repeat(depth));
            out.push_str(name);
            if let Node::Directory(dir) = node {
                out.push_str("/\n");
                dir.render_into(out, depth + 1);
            } else {
                out.push('\n');
            }
        }
    }
}

/// Depth-first iterator over a tree's files
pub struct Leaves<'a> {
    stack: Vec<(PathBuf, btree_map::Iter<'a, String, Node>)>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (PathBuf, &'a FileNode);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, iter) = self.stack.last_mut()?;
            match iter.next() {
                Some((name, Node::File(file))) => return Some((prefix.join(name), file)),
                Some((name, Node::Directory(dir))) => {
                    let child_prefix = prefix.join(name);
                    self.stack.push((child_prefix, dir.children.iter()));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Make way for a leaf at `dest`
///
/// Returns `false` when `dest` is a regular file carrying exactly the
/// recorded mtime, which is then left alone. Anything else but a
/// directory is removed.
fn clear_stale(dest: &Path, file: &FileNode) -> Result<bool> {
    let metadata = match std::fs::symlink_metadata(dest) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(SnapError::io(dest, e)),
    };

    if metadata.is_dir() {
        return Err(SnapError::Conflict {
            path: dest.to_path_buf(),
        });
    }

    if metadata.is_file() && Mtime::from_metadata(&metadata).ok() == Some(file.mtime) {
        return Ok(false);
    }

    tracing::debug!(path = %dest.display(), "replacing stale file on checkout");
    std::fs::remove_file(dest).at(dest)?;
    Ok(true)
}

fn split_components(path: &Path) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                SnapError::invalid("path", format!("not valid UTF-8: {}", path.display()))
            })?),
            Component::CurDir => {}
            _ => {
                return Err(SnapError::invalid(
                    "path",
                    format!("must be relative without '..': {}", path.display()),
                ));
            }
        }
    }

    if parts.is_empty() {
        return Err(SnapError::invalid("path", "empty path"));
    }
    Ok(parts)
}
