//! Commit history
//!
//! The history is an append-only, strictly linear chain of [`Commit`] records.
//! Each record is stored as `.strata/commits/<hash>.json` and `.strata/HEAD`
//! names the most recent one (empty before the first commit).
//!
//! Appending writes the record first and replaces `HEAD` second, both through
//! temp-file-and-rename. A record written without a following `HEAD` update
//! is unreachable and harmless.
//!
//! Every record is verified on load: the hash recomputed from its fields must
//! equal both the stored hash and the file name.

use crate::commit::Commit;
use crate::error::{Result, StrataError};
use crate::types::CommitHash;
use crate::utils;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Minimum number of hex characters accepted as a commit prefix
pub const MIN_PREFIX_LEN: usize = 4;

const HEAD_FILE: &str = "HEAD";
const COMMITS_DIR: &str = "commits";

/// Persisted commit chain
#[derive(Debug, Clone)]
pub struct History {
    head_path: PathBuf,
    commits_dir: PathBuf,
}

impl History {
    /// Create an empty history inside the repository state directory
    pub fn init(state_dir: &Path) -> Result<Self> {
        let history = Self::at(state_dir);
        fs::create_dir_all(&history.commits_dir)?;
        utils::atomic_write(&history.head_path, b"")?;
        Ok(history)
    }

    /// Open the history of an existing repository
    pub fn open(state_dir: &Path) -> Result<Self> {
        let history = Self::at(state_dir);
        if !history.commits_dir.is_dir() {
            return Err(StrataError::corrupt(format!(
                "commit directory {:?} is missing",
                history.commits_dir
            )));
        }
        if !history.head_path.is_file() {
            return Err(StrataError::corrupt(format!(
                "HEAD file {:?} is missing",
                history.head_path
            )));
        }
        Ok(history)
    }

    fn at(state_dir: &Path) -> Self {
        Self {
            head_path: state_dir.join(HEAD_FILE),
            commits_dir: state_dir.join(COMMITS_DIR),
        }
    }

    /// Hash of the head commit, `None` if there are no commits
    pub fn head_hash(&self) -> Result<Option<CommitHash>> {
        let content = fs::read_to_string(&self.head_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StrataError::corrupt(format!("HEAD file {:?} is missing", self.head_path))
            } else {
                StrataError::Io(e)
            }
        })?;

        let hash = content.trim();
        if hash.is_empty() {
            return Ok(None);
        }
        if !utils::is_valid_hash(hash) {
            return Err(StrataError::corrupt(format!("HEAD holds malformed hash {:?}", hash)));
        }
        Ok(Some(hash.to_string()))
    }

    /// Most recent commit, `None` if there are no commits
    pub fn head(&self) -> Result<Option<Commit>> {
        match self.head_hash()? {
            Some(hash) => self.get(&hash).map(Some).map_err(|e| match e {
                StrataError::CommitNotFound(hash) => {
                    StrataError::corrupt(format!("HEAD points to missing commit {}", hash))
                }
                other => other,
            }),
            None => Ok(None),
        }
    }

    /// Load and verify the commit with this exact hash
    ///
    /// # Errors
    ///
    /// - [`StrataError::CommitNotFound`] if no record carries the hash
    /// - [`StrataError::CorruptState`] if the record fails to parse or verify
    pub fn get(&self, hash: &str) -> Result<Commit> {
        if !utils::is_valid_hash(hash) {
            return Err(StrataError::CommitNotFound(hash.to_string()));
        }

        let path = self.record_path(hash);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StrataError::CommitNotFound(hash.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let commit: Commit = serde_json::from_slice(&content)
            .map_err(|e| StrataError::corrupt(format!("commit record {:?}: {}", path, e)))?;

        if commit.hash != hash || !commit.verify()? {
            return Err(StrataError::corrupt(format!(
                "commit record {:?} does not match its hash",
                path
            )));
        }

        trace!("Loaded commit {}", commit.short_hash());
        Ok(commit)
    }

    /// Whether a record with this exact hash exists
    pub fn contains(&self, hash: &str) -> bool {
        utils::is_valid_hash(hash) && self.record_path(hash).is_file()
    }

    /// Write a commit record without moving `HEAD`
    pub(crate) fn write_record(&self, commit: &Commit) -> Result<()> {
        let json = serde_json::to_vec_pretty(commit)?;
        utils::atomic_write(&self.record_path(&commit.hash), &json)?;
        trace!("Wrote commit record {}", commit.short_hash());
        Ok(())
    }

    /// Point `HEAD` at `hash`
    fn set_head(&self, hash: &str) -> Result<()> {
        utils::atomic_write(&self.head_path, hash.as_bytes())?;
        debug!("HEAD -> {}", utils::short_hash(hash));
        Ok(())
    }

    /// Append a commit as the new head
    ///
    /// The commit's parent must be the current head; the chain never branches.
    pub fn append(&self, commit: &Commit) -> Result<()> {
        self.append_with(commit, |_| Ok(()))
    }

    /// Append a commit, running `before_head` between the record write and
    /// the `HEAD` replacement
    ///
    /// If `before_head` fails, `HEAD` is left where it was and the written
    /// record stays unreachable.
    pub fn append_with<F>(&self, commit: &Commit, before_head: F) -> Result<()>
    where
        F: FnOnce(&Commit) -> Result<()>,
    {
        self.check_parent(commit)?;
        self.write_record(commit)?;
        before_head(commit)?;
        self.set_head(&commit.hash)?;
        info!("Appended commit {}", commit.short_hash());
        Ok(())
    }

    fn check_parent(&self, commit: &Commit) -> Result<()> {
        let head = self.head_hash()?;
        if commit.parent != head {
            return Err(StrataError::internal(format!(
                "commit {} has parent {:?} but head is {:?}",
                commit.short_hash(),
                commit.parent.as_deref().map(utils::short_hash),
                head.as_deref().map(utils::short_hash)
            )));
        }
        Ok(())
    }

    /// Commits from head to root, most recent first
    ///
    /// The sequence is lazy: each record is read when the iterator reaches it.
    /// Calling `log` again restarts from the current head.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use strata::Repository;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let dir = tempfile::TempDir::new()?;
    /// # let repo = Repository::init(dir.path())?;
    /// for commit in repo.history().log().take(10) {
    ///     let commit = commit?;
    ///     println!("{}", commit.summary());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn log(&self) -> Log<'_> {
        Log {
            history: self,
            cursor: Cursor::Start,
            seen: HashSet::new(),
        }
    }

    /// Number of commits reachable from head
    pub fn len(&self) -> Result<usize> {
        self.log().try_fold(0, |count, commit| commit.map(|_| count + 1))
    }

    /// Whether there are no commits yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.head_hash()?.is_none())
    }

    /// Resolve a full hash or a unique prefix to a full commit hash
    ///
    /// Prefixes must be at least [`MIN_PREFIX_LEN`] hex characters and are
    /// matched case-insensitively.
    ///
    /// # Errors
    ///
    /// - [`StrataError::CommitNotFound`] if nothing matches
    /// - [`StrataError::AmbiguousCommit`] if several commits match
    pub fn resolve(&self, prefix: &str) -> Result<CommitHash> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.len() < MIN_PREFIX_LEN || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StrataError::CommitNotFound(prefix));
        }

        if self.contains(&prefix) {
            return Ok(prefix);
        }

        let mut candidates: Vec<CommitHash> = self
            .record_hashes()?
            .into_iter()
            .filter(|hash| hash.starts_with(&prefix))
            .collect();

        match candidates.len() {
            0 => Err(StrataError::CommitNotFound(prefix)),
            1 => Ok(candidates.remove(0)),
            _ => {
                candidates.sort();
                Err(StrataError::AmbiguousCommit { prefix, candidates })
            }
        }
    }

    fn record_hashes(&self) -> Result<Vec<CommitHash>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.commits_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(hash) = name.strip_suffix(".json") {
                if utils::is_valid_hash(hash) {
                    hashes.push(hash.to_string());
                }
            }
        }
        Ok(hashes)
    }

    fn record_path(&self, hash: &str) -> PathBuf {
        self.commits_dir.join(format!("{}.json", hash))
    }
}

enum Cursor {
    Start,
    At(CommitHash),
    Done,
}

/// Lazy iterator over the history, head first
///
/// Yields [`StrataError::CorruptState`] and stops if a parent link is dangling
/// or revisits a commit.
pub struct Log<'a> {
    history: &'a History,
    cursor: Cursor,
    seen: HashSet<CommitHash>,
}

impl Iterator for Log<'_> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Start => match self.history.head_hash() {
                Ok(Some(hash)) => hash,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            },
            Cursor::At(hash) => hash,
            Cursor::Done => return None,
        };

        if !self.seen.insert(hash.clone()) {
            return Some(Err(StrataError::corrupt(format!(
                "history revisits commit {}",
                hash
            ))));
        }

        match self.history.get(&hash) {
            Ok(commit) => {
                if let Some(parent) = &commit.parent {
                    self.cursor = Cursor::At(parent.clone());
                }
                Some(Ok(commit))
            }
            Err(StrataError::CommitNotFound(hash)) => Some(Err(StrataError::corrupt(format!(
                "history references missing commit {}",
                hash
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}
