//! Content-addressed blob storage
//!
//! Every unique file content is stored once, at `storage/<2 hex>/<62 hex>`
//! derived from its SHA-256 digest, and made read-only after the write.
//! The store does not track references; callers decide what is garbage.

use crate::config::MaterializeMode;
use crate::error::{IoResultExt, Result, SnapError};
use crate::hash::{self, ObjectHash, DEFAULT_MMAP_THRESHOLD};
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

pub struct BlobStore {
    /// Root of the sharded object tree
    root: PathBuf,
    /// Staging area for atomic writes
    tmp_dir: PathBuf,
    mmap_threshold: u64,
}

impl BlobStore {
    pub fn new(root: PathBuf, tmp_dir: PathBuf) -> Self {
        Self {
            root,
            tmp_dir,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }

    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Store the content of `source`, returning its hash
    ///
    /// Idempotent: if the blob already exists nothing is written. The
    /// source is hashed up front so a stored blob costs one read and no
    /// copy. On a miss the copy is hashed again as it is written, and a
    /// mismatch with the first hash means the file changed in between;
    /// that second read is what keeps a torn copy out of the store.
    pub fn put(&self, source: &Path) -> Result<ObjectHash> {
        let hash = hash::hash_file_auto(source, self.mmap_threshold)?;
        let blob_path = self.blob_path(hash);

        if blob_path.exists() {
            tracing::trace!(%hash, source = %source.display(), "blob already stored");
            return Ok(hash);
        }

        fs::create_dir_all(&self.tmp_dir).at(&self.tmp_dir)?;
        let temp_path = self
            .tmp_dir
            .join(format!("{}-{}", uuid::Uuid::new_v4(), hash.to_hex()));

        let copied = match copy_hashing(source, &temp_path) {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        // The source may have changed between hashing and copying
        if copied != hash {
            let _ = fs::remove_file(&temp_path);
            return Err(SnapError::io(
                source,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "file changed while it was being stored",
                ),
            ));
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        set_readonly(&temp_path, true)?;

        if let Err(e) = fs::rename(&temp_path, &blob_path) {
            let _ = set_readonly(&temp_path, false);
            let _ = fs::remove_file(&temp_path);
            return Err(SnapError::io(&blob_path, e));
        }

        tracing::debug!(%hash, source = %source.display(), "stored blob");
        Ok(hash)
    }

    /// Realize a stored blob at `dest`
    ///
    /// Fails with `MissingObject` if the hash is absent and `Conflict` if
    /// anything already exists at `dest`.
    pub fn materialize(&self, hash: ObjectHash, dest: &Path, mode: MaterializeMode) -> Result<()> {
        let blob_path = self.existing_blob_path(hash)?;

        if fs::symlink_metadata(dest).is_ok() {
            return Err(SnapError::Conflict {
                path: dest.to_path_buf(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }

        match mode {
            MaterializeMode::Copy => {
                fs::copy(&blob_path, dest).at(dest)?;
                set_readonly(dest, false)?;
            }
            MaterializeMode::Hardlink => {
                fs::hard_link(&blob_path, dest).at(dest)?;
            }
            MaterializeMode::Symlink => {
                let target = fs::canonicalize(&blob_path).at(&blob_path)?;
                symlink_file(&target, dest).at(dest)?;
            }
        }

        tracing::trace!(%hash, dest = %dest.display(), ?mode, "materialized blob");
        Ok(())
    }

    /// Delete a blob and its shard directory once empty
    ///
    /// The caller must already know the blob is unreferenced.
    pub fn remove(&self, hash: ObjectHash) -> Result<u64> {
        let blob_path = self.existing_blob_path(hash)?;
        let size = fs::metadata(&blob_path).at(&blob_path)?.len();

        set_readonly(&blob_path, false)?;
        fs::remove_file(&blob_path).at(&blob_path)?;

        if let Some(shard) = blob_path.parent() {
            let empty = fs::read_dir(shard)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                // Another writer may have just repopulated the shard
                let _ = fs::remove_dir(shard);
            }
        }

        tracing::debug!(%hash, size, "removed blob");
        Ok(size)
    }

    /// Lazily enumerate every stored hash
    ///
    /// Each call starts a fresh walk of the shard directories.
    pub fn list(&self) -> Result<BlobIter> {
        let shards = if self.root.exists() {
            Some(fs::read_dir(&self.root).at(&self.root)?)
        } else {
            None
        };

        Ok(BlobIter {
            root: self.root.clone(),
            shards,
            current: None,
        })
    }

    pub fn has_blob(&self, hash: ObjectHash) -> bool {
        self.blob_path(hash).is_file()
    }

    /// Re-hash a stored blob and compare against its name
    pub fn verify(&self, hash: ObjectHash) -> Result<bool> {
        let blob_path = self.existing_blob_path(hash)?;
        Ok(hash::hash_file(&blob_path)? == hash)
    }

    /// Read a blob into memory
    pub fn read(&self, hash: ObjectHash) -> Result<Vec<u8>> {
        let blob_path = self.existing_blob_path(hash)?;
        fs::read(&blob_path).at(&blob_path)
    }

    /// Filesystem path for a blob: storage/<prefix>/<rest>
    pub fn blob_path(&self, hash: ObjectHash) -> PathBuf {
        let (prefix, rest) = hash.split();
        self.root.join(prefix).join(rest)
    }

    fn existing_blob_path(&self, hash: ObjectHash) -> Result<PathBuf> {
        let blob_path = self.blob_path(hash);
        if blob_path.is_file() {
            Ok(blob_path)
        } else {
            Err(SnapError::MissingObject { hash })
        }
    }
}

/// Iterator over the two-level shard layout
pub struct BlobIter {
    root: PathBuf,
    shards: Option<ReadDir>,
    current: Option<(String, ReadDir)>,
}

impl Iterator for BlobIter {
    type Item = Result<ObjectHash>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((prefix, entries)) = self.current.as_mut() {
                match entries.next() {
                    Some(Ok(entry)) => {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        // Stray files (editor droppings, partial names) are not blobs
                        if let Ok(hash) = ObjectHash::from_hex(&format!("{prefix}{name}")) {
                            return Some(Ok(hash));
                        }
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some(Err(SnapError::io(&self.root.join(prefix.as_str()), e)))
                    }
                    None => {
                        self.current = None;
                    }
                }
            }

            let shard = match self.shards.as_mut()?.next()? {
                Ok(shard) => shard,
                Err(e) => return Some(Err(SnapError::io(&self.root, e))),
            };

            let path = shard.path();
            let prefix = shard.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !path.is_dir() {
                continue;
            }

            match fs::read_dir(&path) {
                Ok(entries) => self.current = Some((prefix, entries)),
                Err(e) => return Some(Err(SnapError::io(&path, e))),
            }
        }
    }
}

/// Copy `source` to `dest`, hashing the bytes as they are written
fn copy_hashing(source: &Path, dest: &Path) -> Result<ObjectHash> {
    use sha2::{Digest, Sha256};
    use std::io::{Read, Write};

    let mut reader = fs::File::open(source).at(source)?;
    let mut writer = fs::File::create(dest).at(dest)?;
    let mut hasher = Sha256::new();

    let mut buffer = vec![0u8; 1 << 20];
    loop {
        let n = reader.read(&mut buffer).at(source)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        writer.write_all(&buffer[..n]).at(dest)?;
    }
    writer.sync_all().at(dest)?;

    Ok(ObjectHash::from_bytes(hasher.finalize().into()))
}

fn set_readonly(path: &Path, readonly: bool) -> Result<()> {
    let mut perms = fs::metadata(path).at(path)?.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = perms.mode();
        let mode = if readonly { mode & !0o222 } else { mode | 0o200 };
        perms.set_mode(mode);
    }

    #[cfg(not(unix))]
    perms.set_readonly(readonly);

    fs::set_permissions(path, perms).at(path)
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
