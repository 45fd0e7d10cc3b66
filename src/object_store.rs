//! Content-addressable object store
//!
//! Blobs are stored under the SHA-256 digest of their raw bytes. Identical
//! content is stored exactly once, regardless of which path or commit refers
//! to it, and stored objects are never modified or deleted.
//!
//! ## Layout
//!
//! ```text
//! .strata/objects/
//! └── <prefix>/          # First 2 chars of hash
//!     └── <suffix>       # Remaining 62 hash chars, raw bytes
//! ```
//!
//! Writes go to a temporary file inside the shard directory and are renamed
//! into place, so a crash never leaves a truncated object under a valid name.
//! A stray temporary file is harmless: nothing references it.
//!
//! ## Example
//!
//! ```rust
//! use strata::ObjectStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::TempDir::new()?;
//! let store = ObjectStore::init(dir.path().join("objects"))?;
//!
//! let hash = store.put(b"hello")?;
//! assert_eq!(store.put(b"hello")?, hash);
//! assert_eq!(store.get(&hash)?, b"hello");
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, StrataError};
use crate::types::BlobHash;
use crate::utils;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Aggregate statistics about stored objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectStoreStats {
    /// Number of distinct objects
    pub object_count: usize,
    /// Sum of object sizes in bytes
    pub total_size: u64,
}

/// Append-only content-addressable blob pool
#[derive(Debug, Clone)]
pub struct ObjectStore {
    /// Directory holding the sharded objects
    root: PathBuf,
}

impl ObjectStore {
    /// Create the object directory and return a store over it
    pub fn init(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open an existing object directory
    pub fn open(root: PathBuf) -> Result<Self> {
        if !root.is_dir() {
            return Err(StrataError::corrupt(format!(
                "object directory {:?} is missing",
                root
            )));
        }
        Ok(Self { root })
    }

    /// Store bytes and return their digest
    ///
    /// Idempotent: if an object with the same digest already exists nothing is
    /// written and the existing digest is returned.
    pub fn put(&self, content: &[u8]) -> Result<BlobHash> {
        let hash = utils::hash_data(content);
        let object_path = self.object_path(&hash);

        if object_path.exists() {
            trace!("Object {} already exists", utils::short_hash(&hash));
            return Ok(hash);
        }

        let shard = self.root.join(&hash[..2]);
        fs::create_dir_all(&shard)?;

        let mut temp = tempfile::NamedTempFile::new_in(&shard)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(&object_path)?;

        debug!("Stored object {} ({} bytes)", utils::short_hash(&hash), content.len());
        Ok(hash)
    }

    /// Read a file from disk and store its content
    pub fn put_file(&self, path: &Path) -> Result<BlobHash> {
        let content = fs::read(path)?;
        self.put(&content)
    }

    /// Load the bytes stored under `hash`
    ///
    /// The content is re-hashed on load; an object whose bytes no longer match
    /// its name is reported as corrupt state rather than returned.
    pub fn get(&self, hash: &str) -> Result<Vec<u8>> {
        if !utils::is_valid_hash(hash) {
            return Err(StrataError::ObjectNotFound(hash.to_string()));
        }

        let object_path = self.object_path(hash);
        let content = match fs::read(&object_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StrataError::ObjectNotFound(hash.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let actual = utils::hash_data(&content);
        if actual != hash {
            return Err(StrataError::corrupt(format!(
                "object {} has content hash {}",
                hash, actual
            )));
        }

        Ok(content)
    }

    /// Check whether an object with this digest exists
    pub fn exists(&self, hash: &str) -> bool {
        utils::is_valid_hash(hash) && self.object_path(hash).is_file()
    }

    /// List the digests of every stored object
    pub fn list(&self) -> Result<Vec<BlobHash>> {
        let mut hashes = Vec::new();

        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().to_string();

            for object in fs::read_dir(shard.path())? {
                let object = object?;
                let hash = format!("{}{}", prefix, object.file_name().to_string_lossy());
                // Skips leftover temporary files from interrupted writes
                if utils::is_valid_hash(&hash) {
                    hashes.push(hash);
                }
            }
        }

        hashes.sort();
        Ok(hashes)
    }

    /// Compute object count and total size
    pub fn stats(&self) -> Result<ObjectStoreStats> {
        let mut stats = ObjectStoreStats::default();
        for hash in self.list()? {
            stats.object_count += 1;
            stats.total_size += fs::metadata(self.object_path(&hash))?.len();
        }
        Ok(stats)
    }

    /// Directory holding the objects
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        let (prefix, suffix) = hash.split_at(2);
        self.root.join(prefix).join(suffix)
    }
}
