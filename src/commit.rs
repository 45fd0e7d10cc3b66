//! Commit records
//!
//! A [`Commit`] is an immutable node of the linear history. It carries the full
//! `path -> blob` tree at that point, not a delta against its parent.
//!
//! ## Commit hash
//!
//! The hash is the SHA-256 digest of the bincode encoding (standard config) of
//! `(parent, tree, message, timestamp)`. The tree is a `BTreeMap`, so its
//! encoding is path-ordered and the hash is deterministic. The stored `hash`
//! field is not an input to itself.
//!
//! ```rust
//! use strata::commit::Commit;
//! use strata::types::Tree;
//! use chrono::Utc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let commit = Commit::new(None, Tree::new(), "first".to_string(), Utc::now())?;
//! assert!(commit.verify()?);
//! assert!(commit.is_root());
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::{CommitHash, Tree, TreeDiff};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable commit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Deterministic digest of the other fields
    pub hash: CommitHash,
    /// Previous head, `None` for the root commit
    pub parent: Option<CommitHash>,
    /// Full repository tree
    pub tree: Tree,
    /// Commit message
    pub message: String,
    /// Author timestamp
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    /// Create a commit and compute its hash
    ///
    /// # Errors
    ///
    /// Returns [`crate::StrataError::Bincode`] if the fields cannot be encoded.
    pub fn new(
        parent: Option<CommitHash>,
        tree: Tree,
        message: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let hash = Self::compute_hash(parent.as_deref(), &tree, &message, &timestamp)?;
        Ok(Self {
            hash,
            parent,
            tree,
            message,
            timestamp,
        })
    }

    /// Compute the hash for the given commit fields
    pub fn compute_hash(
        parent: Option<&str>,
        tree: &Tree,
        message: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<CommitHash> {
        let encoded = bincode::serde::encode_to_vec(
            (parent, tree, message, timestamp),
            bincode::config::standard(),
        )?;
        Ok(utils::hash_data(&encoded))
    }

    /// Check that the stored hash matches the commit's fields
    pub fn verify(&self) -> Result<bool> {
        let computed =
            Self::compute_hash(self.parent.as_deref(), &self.tree, &self.message, &self.timestamp)?;
        Ok(computed == self.hash)
    }

    /// Whether this is the first commit of the history
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// First 8 characters of the hash
    pub fn short_hash(&self) -> &str {
        utils::short_hash(&self.hash)
    }

    /// One-line summary for logs and listings
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} - {} ({} files)",
            self.short_hash(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message,
            self.tree.len()
        )
    }
}

/// Compare two trees path by path
///
/// Lists are in path order. An absent `old` tree is treated as empty, so the
/// root commit reports every path as added.
pub fn diff_trees(old: Option<&Tree>, new: &Tree) -> TreeDiff {
    let empty = Tree::new();
    let old = old.unwrap_or(&empty);
    let mut diff = TreeDiff::default();

    for (path, hash) in new {
        match old.get(path) {
            None => diff.added.push(path.clone()),
            Some(previous) if previous != hash => diff.modified.push(path.clone()),
            Some(_) => {}
        }
    }
    diff.removed = old
        .keys()
        .filter(|path| !new.contains_key(*path))
        .cloned()
        .collect();

    diff
}
