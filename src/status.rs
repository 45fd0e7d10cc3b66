//! Status engine
//!
//! Compares the working tree, the staging index and the head commit's tree and
//! assigns every path in their union exactly one [`FileStatus`].
//!
//! [`classify`] is a pure function over the three hashes of one path; the
//! rules are evaluated in a fixed order, which makes the categories mutually
//! exclusive and exhaustive:
//!
//! 1. staged removal: `StagedDeleted`
//! 2. missing from the working tree: `Deleted`
//! 3. staged: `ModifiedSinceStage` if the working file differs from the staged
//!    blob, otherwise `StagedNew`, `StagedModified` or `Unmodified` by
//!    comparison with head
//! 4. committed only: `ModifiedSinceCommit` or `Unmodified`
//! 5. working only: `Untracked`
//!
//! [`compute_status`] gathers the hashes; working-tree files are hashed in
//! parallel.

use crate::error::Result;
use crate::index::StagingIndex;
use crate::types::{CommitHash, FileStatus, StagingEntry, StatusEntry, StatusReport, Tree};
use crate::worktree::WorkTree;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Classify one path from its working, staged and committed state
///
/// # Examples
///
/// ```rust
/// use strata::status::classify;
/// use strata::FileStatus;
///
/// assert_eq!(classify(Some("h1"), None, None), FileStatus::Untracked);
/// assert_eq!(classify(Some("h1"), None, Some("h1")), FileStatus::Unmodified);
/// assert_eq!(classify(Some("h2"), None, Some("h1")), FileStatus::ModifiedSinceCommit);
/// assert_eq!(classify(None, None, Some("h1")), FileStatus::Deleted);
/// ```
pub fn classify(
    working: Option<&str>,
    staged: Option<&StagingEntry>,
    committed: Option<&str>,
) -> FileStatus {
    if staged.is_some_and(|entry| entry.removed) {
        return FileStatus::StagedDeleted;
    }

    let Some(working) = working else {
        return FileStatus::Deleted;
    };

    match (staged, committed) {
        (Some(entry), _) if entry.hash != working => FileStatus::ModifiedSinceStage,
        (Some(_), None) => FileStatus::StagedNew,
        (Some(entry), Some(committed)) if entry.hash != committed => FileStatus::StagedModified,
        (Some(_), Some(_)) => FileStatus::Unmodified,
        (None, Some(committed)) if committed != working => FileStatus::ModifiedSinceCommit,
        (None, Some(_)) => FileStatus::Unmodified,
        (None, None) => FileStatus::Untracked,
    }
}

/// Compute the status of every path in the working tree, index and head tree
///
/// Tracked paths are checked directly even when an ignore rule hides them from
/// the scan, so an ignored but committed file is still compared.
pub fn compute_status(
    worktree: &WorkTree,
    index: &StagingIndex,
    head: Option<CommitHash>,
    head_tree: &Tree,
) -> Result<StatusReport> {
    let mut paths: BTreeSet<String> = worktree.scan()?.into_iter().collect();
    paths.extend(index.entries().map(|entry| entry.path.clone()));
    paths.extend(head_tree.keys().cloned());

    let paths: Vec<String> = paths.into_iter().collect();
    let entries = paths
        .into_par_iter()
        .map(|path| -> Result<StatusEntry> {
            let working = worktree.hash(&path)?;
            let staged = index.get(&path);
            let committed = head_tree.get(&path);
            let status = classify(working.as_deref(), staged, committed.map(String::as_str));
            Ok(StatusEntry {
                status,
                working,
                staged: staged.map(|entry| entry.hash.clone()),
                committed: committed.cloned(),
                path,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Computed status for {} paths", entries.len());
    Ok(StatusReport { head, entries })
}
