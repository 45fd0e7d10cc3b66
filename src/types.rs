//! Core data types used throughout the strata library
//!
//! This module contains the data structures shared between components:
//!
//! - **Staging**: [`StagingEntry`], one draft change for the next commit
//! - **Status**: [`FileStatus`], [`StatusEntry`], [`StatusReport`]
//! - **Operation results**: [`RestoreResult`], [`RevertResult`]
//! - **History**: [`TreeDiff`], the path-level difference between two trees
//! - **Configuration**: [`RepositoryConfig`], [`RepositoryMetadata`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hex-encoded SHA-256 digest of a blob's bytes
pub type BlobHash = String;

/// Hex-encoded SHA-256 digest identifying a commit
pub type CommitHash = String;

/// A commit tree: repository path to blob hash, ordered by path
pub type Tree = BTreeMap<String, BlobHash>;

/// A single entry of the staging index
///
/// Either an upsert (`removed == false`, the path will point at `hash` in the
/// next commit) or a staged removal (`removed == true`, the path will be
/// dropped from the next commit's tree; `hash` is the blob being removed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingEntry {
    /// Repository-relative, `/`-separated path
    pub path: String,
    /// Blob hash of the staged content
    pub hash: BlobHash,
    /// Unix permission bits captured at add time
    pub mode: u32,
    /// Whether this entry stages a removal
    #[serde(default)]
    pub removed: bool,
}

/// Classification of a single path by the status engine
///
/// Exactly one status applies to every path in the union of the working
/// tree, the staging index and the head commit's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FileStatus {
    /// Present only in the working tree
    Untracked,
    /// Staged and absent from head
    StagedNew,
    /// Staged with content different from head
    StagedModified,
    /// Staged as a removal
    StagedDeleted,
    /// Staged, but the working file differs from the staged content
    ModifiedSinceStage,
    /// Not staged, and the working file differs from head
    ModifiedSinceCommit,
    /// Every present hash is equal
    Unmodified,
    /// Tracked by stage or head but missing from the working tree
    Deleted,
}

impl FileStatus {
    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Untracked => "untracked",
            FileStatus::StagedNew => "new file",
            FileStatus::StagedModified => "modified",
            FileStatus::StagedDeleted => "deleted",
            FileStatus::ModifiedSinceStage => "modified since stage",
            FileStatus::ModifiedSinceCommit => "modified",
            FileStatus::Unmodified => "unmodified",
            FileStatus::Deleted => "deleted",
        }
    }

    /// Whether the status describes a change recorded in the staging index
    pub fn is_staged(&self) -> bool {
        matches!(
            self,
            FileStatus::StagedNew | FileStatus::StagedModified | FileStatus::StagedDeleted
        )
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of one path together with the three hashes it was classified from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Repository path
    pub path: String,
    /// Classification
    pub status: FileStatus,
    /// Hash of the working-tree file, if it exists
    pub working: Option<BlobHash>,
    /// Hash of the staged entry, if staged
    pub staged: Option<BlobHash>,
    /// Hash in the head commit's tree, if present
    pub committed: Option<BlobHash>,
}

/// Result of a status computation, ordered by path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
    /// Head commit the report was computed against
    pub head: Option<CommitHash>,
    /// One entry per path
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    /// Look up the status of a single path
    pub fn get(&self, path: &str) -> Option<FileStatus> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|idx| self.entries[idx].status)
    }

    /// All paths with the given status
    pub fn by_status(&self, status: FileStatus) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.path.as_str())
            .collect()
    }

    /// Whether nothing is staged, modified, deleted or untracked
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.status == FileStatus::Unmodified)
    }
}

/// Outcome of a restore operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreResult {
    /// Paths overwritten from a staged blob
    pub from_stage: Vec<String>,
    /// Paths overwritten from the head commit
    pub from_head: Vec<String>,
    /// Bytes written to the working tree
    pub bytes_written: u64,
}

impl RestoreResult {
    /// Total number of restored paths
    pub fn files_restored(&self) -> usize {
        self.from_stage.len() + self.from_head.len()
    }
}

/// Outcome of a revert operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertResult {
    /// The newly created commit
    pub commit: CommitHash,
    /// The commit whose tree was replayed
    pub target: CommitHash,
    /// Working-tree files overwritten to match the target tree
    pub files_written: usize,
    /// Paths tracked by the previous head but absent from the target;
    /// left in place in the working tree
    pub left_in_place: Vec<String>,
}

/// Path-level difference between two commit trees
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    /// Paths only in the newer tree
    pub added: Vec<String>,
    /// Paths whose blob changed
    pub modified: Vec<String>,
    /// Paths only in the older tree
    pub removed: Vec<String>,
}

impl TreeDiff {
    /// Whether the trees are identical
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Number of changed paths
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}

/// Repository configuration persisted in `config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Extra ignore patterns (gitignore syntax) on top of `.strataignore`
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    /// Maximum size of a file that may be staged (0 = no limit)
    #[serde(default)]
    pub max_file_size: u64,
    /// Whether the working-tree scan follows symbolic links
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Metadata written once at `init`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    /// On-disk format version
    pub format_version: u32,
    /// Version of strata that created the repository
    pub strata_version: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Configuration
    pub config: RepositoryConfig,
}
