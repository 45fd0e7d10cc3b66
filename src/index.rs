//! Staging index
//!
//! The staging index is the editable draft of the next commit: a mapping from
//! repository path to a blob reference, persisted in `.strata/index.json`.
//!
//! ## Crash safety
//!
//! The file records the head commit the draft was built on (`base`). Commit
//! replaces `HEAD` first and rewrites the index second, so a crash between the
//! two leaves an index whose `base` is the parent of the new head. Such an
//! index has already been consumed by the commit and is loaded as empty.
//! Recording the commit and clearing the index therefore happen as one atomic
//! step.
//!
//! Revert keeps pending entries across the new commit. Before moving `HEAD` it
//! writes the draft with `carried_to` set to the commit about to become head, so
//! the draft stays valid whichever side of the `HEAD` replacement a crash hits.
//!
//! Any other disagreement between the index and `HEAD` cannot come from an
//! interrupted operation and is reported as corruption.

use crate::commit::Commit;
use crate::error::{Result, StrataError};
use crate::types::{CommitHash, StagingEntry, Tree};
use crate::utils;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Current on-disk format version of `index.json`
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    base: Option<CommitHash>,
    #[serde(default)]
    carried_to: Option<CommitHash>,
    entries: Vec<StagingEntry>,
}

/// In-memory view of the staging index
#[derive(Debug, Clone)]
pub struct StagingIndex {
    path: PathBuf,
    base: Option<CommitHash>,
    entries: BTreeMap<String, StagingEntry>,
}

impl StagingIndex {
    /// Create an empty index bound to `path` and built on `head`
    pub fn new(path: PathBuf, head: Option<CommitHash>) -> Self {
        Self {
            path,
            base: head,
            entries: BTreeMap::new(),
        }
    }

    /// Load the index file, validating it against the current head
    ///
    /// The index is accepted when it was built on `head` or carried to it. An
    /// index built on the parent of `head` is a draft that the head commit
    /// already consumed and loads as empty.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of `index.json`
    /// * `head` - Commit currently named by `HEAD`
    ///
    /// # Errors
    ///
    /// Returns `CorruptState` for a missing or malformed file, for invalid
    /// entries and for an index that belongs to neither `head` nor its parent.
    pub fn load(path: PathBuf, head: Option<&Commit>) -> Result<Self> {
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StrataError::corrupt(format!("index file {:?} is missing", path)));
            }
            Err(e) => return Err(e.into()),
        };

        let file: IndexFile = serde_json::from_slice(&content)
            .map_err(|e| StrataError::corrupt(format!("index file {:?}: {}", path, e)))?;

        if file.version != INDEX_FORMAT_VERSION {
            return Err(StrataError::corrupt(format!(
                "index file {:?} has unsupported version {}",
                path, file.version
            )));
        }

        let head_hash = head.map(|commit| commit.hash.clone());
        let current = file.base == head_hash
            || (file.carried_to.is_some() && file.carried_to == head_hash);

        if !current {
            return match head {
                Some(commit) if commit.parent == file.base => {
                    debug!(
                        "Index was built on {:?}, consumed by {}",
                        file.base.as_deref().map(utils::short_hash),
                        commit.short_hash()
                    );
                    Ok(Self::new(path, head_hash))
                }
                _ => Err(StrataError::corrupt(format!(
                    "index file {:?} was built on {:?} but HEAD is {:?}",
                    path,
                    file.base.as_deref().map(utils::short_hash),
                    head_hash.as_deref().map(utils::short_hash)
                ))),
            };
        }

        let mut entries = BTreeMap::new();
        for entry in file.entries {
            validate_entry(&entry)?;
            if entries.insert(entry.path.clone(), entry).is_some() {
                return Err(StrataError::corrupt(format!(
                    "index file {:?} lists a path twice",
                    path
                )));
            }
        }

        debug!("Loaded index with {} entries", entries.len());
        Ok(Self {
            path,
            base: head_hash,
            entries,
        })
    }

    /// Persist the index atomically
    pub fn save(&self) -> Result<()> {
        self.write(None)
    }

    /// Persist the draft so that it remains valid once `HEAD` moves to `next`
    pub(crate) fn save_carried(&self, next: &str) -> Result<()> {
        self.write(Some(next.to_string()))
    }

    fn write(&self, carried_to: Option<CommitHash>) -> Result<()> {
        let file = IndexFile {
            version: INDEX_FORMAT_VERSION,
            base: self.base.clone(),
            carried_to,
            entries: self.entries.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        utils::atomic_write(&self.path, &json)?;
        trace!("Saved index with {} entries", self.entries.len());
        Ok(())
    }

    /// Insert or replace the entry for its path
    ///
    /// Returns the entry previously staged for the path, if any.
    pub fn stage(&mut self, entry: StagingEntry) -> Option<StagingEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    /// Remove the entry for `path`
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::NotStaged`] if the path has no entry.
    pub fn unstage(&mut self, path: &str) -> Result<StagingEntry> {
        self.entries
            .remove(path)
            .ok_or_else(|| StrataError::NotStaged(PathBuf::from(path)))
    }

    /// Entry staged for `path`
    pub fn get(&self, path: &str) -> Option<&StagingEntry> {
        self.entries.get(path)
    }

    /// Whether `path` has an entry
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Staged upserts as a path-ordered `path -> hash` mapping
    ///
    /// Staged removals are not part of the snapshot.
    pub fn snapshot(&self) -> Tree {
        self.entries
            .values()
            .filter(|e| !e.removed)
            .map(|e| (e.path.clone(), e.hash.clone()))
            .collect()
    }

    /// Build the next commit's tree from the parent's tree
    ///
    /// Every staged upsert overrides the parent's entry, staged removals drop
    /// their path, and every other parent path is inherited unchanged.
    pub fn apply(&self, parent: &Tree) -> Tree {
        let mut tree = parent.clone();
        for entry in self.entries.values() {
            if entry.removed {
                tree.remove(&entry.path);
            } else {
                tree.insert(entry.path.clone(), entry.hash.clone());
            }
        }
        tree
    }

    /// Drop every entry and rebase the draft on `head`
    pub fn clear(&mut self, head: Option<CommitHash>) {
        self.entries.clear();
        self.base = head;
    }

    /// Rebase the draft on `head`, keeping its entries
    pub(crate) fn rebase(&mut self, head: CommitHash) {
        self.base = Some(head);
    }

    /// Entries in path order
    pub fn entries(&self) -> impl Iterator<Item = &StagingEntry> {
        self.entries.values()
    }

    /// Number of entries, removals included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_entry(entry: &StagingEntry) -> Result<()> {
    if !utils::is_valid_hash(&entry.hash) {
        return Err(StrataError::corrupt(format!(
            "index entry {} has malformed hash {:?}",
            entry.path, entry.hash
        )));
    }
    let normalized = utils::to_repo_path(Path::new(&entry.path))
        .map_err(|_| StrataError::corrupt(format!("index entry has invalid path {:?}", entry.path)))?;
    if normalized.is_empty() || normalized != entry.path {
        return Err(StrataError::corrupt(format!(
            "index entry has invalid path {:?}",
            entry.path
        )));
    }
    Ok(())
}
