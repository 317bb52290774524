//! Error taxonomy shared by every snap crate

use crate::hash::ObjectHash;
use std::path::{Path, PathBuf};

/// Coarse classification of a [`SnapError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown path in a tree, unknown snapshot, absent blob
    NotFound,
    /// Unreadable source, unwritable destination, corrupt data
    Io,
    /// Materializing into a path that already exists
    Conflict,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    #[error("no such file in snapshot: {}", path.display())]
    NoSuchFile { path: PathBuf },

    #[error("no such snapshot: {id}")]
    NoSuchSnapshot { id: String },

    #[error("object {hash} is not in the store")]
    MissingObject { hash: ObjectHash },

    #[error("destination already exists: {}", path.display())]
    Conflict { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {what}: {reason}")]
    InvalidData { what: &'static str, reason: String },

    #[error("could not lock {}: {reason}", path.display())]
    Locked { path: PathBuf, reason: String },
}

impl SnapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchFile { .. } | Self::NoSuchSnapshot { .. } | Self::MissingObject { .. } => {
                ErrorKind::NotFound
            }
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Io { .. } | Self::InvalidData { .. } | Self::Locked { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            what,
            reason: reason.into(),
        }
    }
}

/// Attach the offending path to a raw `std::io::Error`
pub trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| SnapError::io(path, e))
    }
}

/// Common result type used throughout snap
pub type Result<T> = std::result::Result<T, SnapError>;
