//! SHA-256 hashing primitives for content-addressed storage

use crate::error::{Result, SnapError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Files at or above this size are hashed through a memory map by default.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

const READ_BLOCK_SIZE: usize = 1 << 20;

/// A SHA-256 digest (32 bytes) naming a blob or a snapshot
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ObjectHash([u8; 32]);

impl ObjectHash {
    /// Create a new ObjectHash from raw digest bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64 character hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 64 {
            return Err(SnapError::invalid(
                "hash",
                format!("expected 64 hex characters, got {}", s.len()),
            ));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| SnapError::invalid("hash", format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }

    /// Shard split: 2 character prefix directory, 62 character file name
    pub fn split(&self) -> (String, String) {
        let hex = self.to_hex();
        let (prefix, rest) = hex.split_at(2);
        (prefix.to_string(), rest.to_string())
    }
}

impl std::fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectHash({})", self.to_hex())
    }
}

impl std::fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for ObjectHash {
    type Err = SnapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> ObjectHash {
    ObjectHash::from_bytes(Sha256::digest(data).into())
}

/// Hash a file, streaming it in 1 MiB blocks
///
/// Only the file's bytes contribute; name, location and timestamps never do.
pub fn hash_file(path: &Path) -> Result<ObjectHash> {
    let mut file = File::open(path).map_err(|e| SnapError::io(path, e))?;
    let mut hasher = Sha256::new();

    let mut buffer = vec![0u8; READ_BLOCK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| SnapError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ObjectHash::from_bytes(hasher.finalize().into()))
}

/// Hash a file using memory-mapped I/O (large files)
pub fn hash_file_mmap(path: &Path) -> Result<ObjectHash> {
    use memmap2::Mmap;

    let file = File::open(path).map_err(|e| SnapError::io(path, e))?;
    // SAFETY: the map is read-only and dropped before returning. A concurrent
    // writer can only change the digest we compute, not memory safety of the
    // slice we hand to the hasher.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SnapError::io(path, e))?;
    Ok(hash_bytes(&mmap))
}

/// Pick streaming or mmap hashing by file size
pub fn hash_file_auto(path: &Path, mmap_threshold: u64) -> Result<ObjectHash> {
    let len = std::fs::metadata(path)
        .map_err(|e| SnapError::io(path, e))?
        .len();

    // Empty files cannot be mapped on every platform
    if len > 0 && len >= mmap_threshold {
        hash_file_mmap(path)
    } else {
        hash_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_consistency() {
        let data = b"hello world";
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn test_known_digest() {
        // sha256("hi")
        assert_eq!(
            hash_bytes(b"hi").to_hex(),
            "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4"
        );
    }

    #[test]
    fn test_hex_encoding_roundtrip() {
        let original = ObjectHash::from_bytes([42; 32]);
        let decoded = ObjectHash::from_hex(&original.to_hex()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_hex_decoding_invalid() {
        assert!(ObjectHash::from_hex("abc").is_err());
        assert!(ObjectHash::from_hex("").is_err());
        assert!(ObjectHash::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_split_is_two_and_sixty_two() {
        let hash = hash_bytes(b"shard me");
        let (prefix, rest) = hash.split();
        assert_eq!(prefix.len(), 2);
        assert_eq!(rest.len(), 62);
        assert_eq!(format!("{prefix}{rest}"), hash.to_hex());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = hash_bytes(b"json");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ObjectHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_hash_file_matches_bytes() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        std::fs::write(&file_path, b"test file content").unwrap();

        assert_eq!(hash_file(&file_path)?, hash_bytes(b"test file content"));
        assert_eq!(hash_file_mmap(&file_path)?, hash_bytes(b"test file content"));
        Ok(())
    }

    #[test]
    fn test_hash_large_file_both_paths() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("large.bin");

        let mut file = std::fs::File::create(&file_path).unwrap();
        let chunk = vec![0xAB; 1024 * 1024];
        for _ in 0..5 {
            file.write_all(&chunk).unwrap();
        }
        drop(file);

        let streaming = hash_file(&file_path)?;
        assert_eq!(streaming, hash_file_mmap(&file_path)?);
        assert_eq!(streaming, hash_file_auto(&file_path, DEFAULT_MMAP_THRESHOLD)?);
        Ok(())
    }

    #[test]
    fn test_hash_empty_file_auto() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("empty");
        std::fs::write(&file_path, b"").unwrap();

        assert_eq!(hash_file_auto(&file_path, 0)?, hash_bytes(b""));
        Ok(())
    }

    #[test]
    fn test_hash_missing_file_is_io() {
        let err = hash_file(Path::new("/definitely/not/here")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
