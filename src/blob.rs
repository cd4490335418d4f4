//! Content-addressed storage for image payloads.
//!
//! Image bytes never live in the database rows. The post store keeps an
//! [`ImageRef`] (digest + length) and the bytes are written here, one file
//! per distinct payload.
//!
//! # Keys
//!
//! The key is the SHA-256 of the payload, as lowercase hex. Saving the same
//! photo twice stores one file. Files are sharded by the first two hex
//! characters so no single directory grows unbounded:
//!
//! ```text
//! blobs/
//! ├── 3f/
//! │   └── 3fa1c9...e2      # one image payload
//! └── b0/
//!     └── b04d17...9a
//! ```
//!
//! # Lifetime
//!
//! Blobs are shared, so deleting a post does not blindly delete its blob.
//! The post store removes a blob only when no remaining post references its
//! digest, and [`BlobStore::sweep`] clears anything left behind by an
//! interrupted write.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Blob {0} not found")]
    Missing(String),
    #[error("Blob {digest} is {actual} bytes, expected {expected}")]
    Corrupt {
        digest: String,
        expected: u64,
        actual: u64,
    },
    #[error("Invalid blob digest: {0}")]
    InvalidDigest(String),
}

/// Reference from a post row to its out-of-line image payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// SHA-256 of the payload, lowercase hex.
    pub digest: String,
    /// Payload size in bytes.
    pub len: u64,
}

/// SHA-256 of a byte slice, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn is_valid_digest(digest: &str) -> bool {
    digest.len() == 64 && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Directory of content-addressed blob files.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (creating if needed) a blob store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `digest`. The digest must already be validated.
    fn path_for(&self, digest: &str) -> PathBuf {
        self.root.join(&digest[..2]).join(digest)
    }

    fn checked_path(&self, digest: &str) -> Result<PathBuf, BlobError> {
        if !is_valid_digest(digest) {
            return Err(BlobError::InvalidDigest(digest.to_string()));
        }
        Ok(self.path_for(digest))
    }

    /// Store `bytes`, returning its reference. Writing an existing payload is a no-op.
    pub fn put(&self, bytes: &[u8]) -> Result<ImageRef, BlobError> {
        let digest = hash_bytes(bytes);
        let path = self.path_for(&digest);
        let image = ImageRef {
            digest,
            len: bytes.len() as u64,
        };
        if path.exists() {
            tracing::debug!(digest = %image.digest, "blob already stored");
            return Ok(image);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write to a sibling temp file first so a crash never leaves a
        // truncated file under the final name.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(digest = %image.digest, len = image.len, "stored blob");
        Ok(image)
    }

    /// Read the payload behind `image`.
    pub fn get(&self, image: &ImageRef) -> Result<Vec<u8>, BlobError> {
        let path = self.checked_path(&image.digest)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BlobError::Missing(image.digest.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.len() as u64 != image.len {
            return Err(BlobError::Corrupt {
                digest: image.digest.clone(),
                expected: image.len,
                actual: bytes.len() as u64,
            });
        }
        Ok(bytes)
    }

    pub fn contains(&self, digest: &str) -> bool {
        is_valid_digest(digest) && self.path_for(digest).is_file()
    }

    /// Delete the blob for `digest`. Returns `false` if it was not stored.
    pub fn remove(&self, digest: &str) -> Result<bool, BlobError> {
        let path = self.checked_path(digest)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(%digest, "removed blob");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Digests of every stored blob, sorted.
    pub fn list(&self) -> Result<Vec<String>, BlobError> {
        let mut digests = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("blob directory walk failed"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_valid_digest(name)
            {
                digests.push(name.to_string());
            }
        }
        digests.sort();
        Ok(digests)
    }

    /// Remove every blob whose digest is not in `live`, plus any staging
    /// files an interrupted [`put`](Self::put) left in a shard directory.
    /// Returns the removed digests.
    pub fn sweep(&self, live: &HashSet<String>) -> Result<Vec<String>, BlobError> {
        let mut removed = Vec::new();
        for digest in self.list()? {
            if !live.contains(&digest) && self.remove(&digest)? {
                removed.push(digest);
            }
        }
        for tmp in self.staging_files()? {
            match fs::remove_file(&tmp) {
                Ok(()) => tracing::debug!(path = %tmp.display(), "removed stale staging file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// `<digest>.tmp` files inside shard directories.
    fn staging_files(&self) -> Result<Vec<PathBuf>, BlobError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("blob directory walk failed"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Some(stem) = name.strip_suffix(".tmp")
                && is_valid_digest(stem)
            {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, BlobStore) {
        let tmp = TempDir::new().unwrap();
        let blobs = BlobStore::open(tmp.path().join("blobs")).unwrap();
        (tmp, blobs)
    }

    #[test]
    fn hash_bytes_is_hex_sha256() {
        let h = hash_bytes(b"hello world");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn put_then_get() {
        let (_tmp, blobs) = store();
        let image = blobs.put(b"pixels").unwrap();
        assert_eq!(image.len, 6);
        assert_eq!(blobs.get(&image).unwrap(), b"pixels");
    }

    #[test]
    fn put_shards_by_digest_prefix() {
        let (_tmp, blobs) = store();
        let image = blobs.put(b"pixels").unwrap();
        let expected = blobs.root().join(&image.digest[..2]).join(&image.digest);
        assert!(expected.is_file());
    }

    #[test]
    fn identical_payloads_share_one_file() {
        let (_tmp, blobs) = store();
        let a = blobs.put(b"same").unwrap();
        let b = blobs.put(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(blobs.list().unwrap().len(), 1);
    }

    #[test]
    fn get_missing_blob() {
        let (_tmp, blobs) = store();
        let image = ImageRef {
            digest: hash_bytes(b"never stored"),
            len: 12,
        };
        assert!(matches!(blobs.get(&image), Err(BlobError::Missing(_))));
    }

    #[test]
    fn get_detects_length_mismatch() {
        let (_tmp, blobs) = store();
        let mut image = blobs.put(b"pixels").unwrap();
        image.len = 99;
        assert!(matches!(
            blobs.get(&image),
            Err(BlobError::Corrupt {
                expected: 99,
                actual: 6,
                ..
            })
        ));
    }

    #[test]
    fn rejects_path_like_digest() {
        let (_tmp, blobs) = store();
        let image = ImageRef {
            digest: "../../etc/passwd".into(),
            len: 0,
        };
        assert!(matches!(
            blobs.get(&image),
            Err(BlobError::InvalidDigest(_))
        ));
        assert!(!blobs.contains("../../etc/passwd"));
    }

    #[test]
    fn remove_reports_presence() {
        let (_tmp, blobs) = store();
        let image = blobs.put(b"gone soon").unwrap();
        assert!(blobs.remove(&image.digest).unwrap());
        assert!(!blobs.remove(&image.digest).unwrap());
        assert!(!blobs.contains(&image.digest));
    }

    #[test]
    fn list_ignores_stray_files() {
        let (_tmp, blobs) = store();
        let image = blobs.put(b"kept").unwrap();
        fs::write(blobs.root().join("README"), "not a blob").unwrap();
        fs::create_dir_all(blobs.root().join("zz")).unwrap();
        fs::write(blobs.root().join("zz").join("half.tmp"), "partial").unwrap();
        assert_eq!(blobs.list().unwrap(), vec![image.digest]);
    }

    #[test]
    fn sweep_removes_only_unreferenced() {
        let (_tmp, blobs) = store();
        let keep = blobs.put(b"keep").unwrap();
        let drop = blobs.put(b"drop").unwrap();
        let live: HashSet<String> = [keep.digest.clone()].into_iter().collect();

        let removed = blobs.sweep(&live).unwrap();

        assert_eq!(removed, vec![drop.digest.clone()]);
        assert!(blobs.contains(&keep.digest));
        assert!(!blobs.contains(&drop.digest));
    }

    #[test]
    fn sweep_clears_interrupted_writes() {
        let (_tmp, blobs) = store();
        let keep = blobs.put(b"keep").unwrap();
        let digest = hash_bytes(b"half written");
        let shard = blobs.root().join(&digest[..2]);
        fs::create_dir_all(&shard).unwrap();
        let staging = shard.join(format!("{}.tmp", digest));
        fs::write(&staging, b"half").unwrap();
        let unrelated = shard.join("notes.tmp");
        fs::write(&unrelated, b"not ours").unwrap();
        let live: HashSet<String> = [keep.digest.clone()].into_iter().collect();

        let removed = blobs.sweep(&live).unwrap();

        assert!(removed.is_empty());
        assert!(!staging.exists());
        assert!(unrelated.exists());
        assert!(blobs.contains(&keep.digest));
    }
}
