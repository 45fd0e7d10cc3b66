//! Repository context
//!
//! [`Repository`] ties the components together: it owns the paths of the
//! object store, the staging index and the commit history of one repository,
//! and exposes every user-level operation (`add`, `remove`, `unstage`,
//! `commit`, `status`, `restore`, `revert`, `log`).
//!
//! There is no global state. Every operation runs against the repository value
//! it is called on, so independent repositories (for example in separate
//! temporary directories) never interact.
//!
//! ## Locking and atomicity
//!
//! Mutating operations hold the repository lock for their whole duration and
//! fail with [`StrataError::ConcurrentModification`] if another operation holds
//! it. Every state file is replaced through temp-file-and-rename, and all
//! inputs are validated before the first state file is touched, so a failing
//! operation leaves the persisted state as it found it.
//!
//! ## Example
//!
//! ```rust
//! use strata::{FileStatus, Repository};
//! use std::fs;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::TempDir::new()?;
//! let repo = Repository::init(dir.path())?;
//!
//! fs::write(dir.path().join("a.txt"), "hello")?;
//! repo.add(&["a.txt"])?;
//! assert_eq!(repo.status()?.get("a.txt"), Some(FileStatus::StagedNew));
//!
//! let first = repo.commit("first")?;
//! assert_eq!(repo.log().count(), 1);
//!
//! fs::write(dir.path().join("a.txt"), "hello world")?;
//! repo.restore(&["a.txt"])?;
//! assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "hello");
//! # let _ = first;
//! # Ok(())
//! # }
//! ```

use crate::commit::{self, Commit};
use crate::error::{Result, StrataError};
use crate::history::{History, Log};
use crate::index::StagingIndex;
use crate::lock::RepoLock;
use crate::object_store::ObjectStore;
use crate::pathspec::{self, Pathspec};
use crate::status;
use crate::types::{
    BlobHash, RepositoryConfig, RepositoryMetadata, RestoreResult, RevertResult,
    StagingEntry, StatusReport, Tree, TreeDiff,
};
use crate::utils;
use crate::worktree::{WorkTree, STATE_DIR};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, trace, warn};

/// On-disk format version written by this build
pub const FORMAT_VERSION: u32 = 1;

const CONFIG_FILE: &str = "config.json";
const INDEX_FILE: &str = "index.json";
const OBJECTS_DIR: &str = "objects";

/// Permission bits for files whose mode is not recorded
const DEFAULT_MODE: u32 = 0o644;

/// Handle to one repository
#[derive(Debug)]
pub struct Repository {
    /// Working-tree root
    root: PathBuf,
    /// `.strata` directory
    state_dir: PathBuf,
    /// Contents of `config.json`
    metadata: RepositoryMetadata,
    store: ObjectStore,
    history: History,
    worktree: WorkTree,
}

/// One working-tree write planned by `restore`
struct RestoreStep {
    path: String,
    hash: BlobHash,
    mode: Option<u32>,
    from_stage: bool,
}

impl Repository {
    /// Create a repository with default configuration in `root`
    ///
    /// Equivalent to `RepositoryBuilder::new().init(root)`.
    ///
    /// # Errors
    ///
    /// - [`StrataError::PathNotFound`] if `root` is not a directory
    /// - [`StrataError::AlreadyInitialized`] if `root` already has a repository
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self> {
        RepositoryBuilder::new().init(root)
    }

    /// Open the repository whose root is exactly `root`
    ///
    /// # Errors
    ///
    /// - [`StrataError::RepositoryNotInitialized`] if `root` has no `.strata`
    /// - [`StrataError::CorruptState`] if the configuration or layout is damaged
    #[instrument(skip_all)]
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let given = root.as_ref();
        let root = given
            .canonicalize()
            .map_err(|_| StrataError::RepositoryNotInitialized(given.to_path_buf()))?;
        let state_dir = root.join(STATE_DIR);
        if !state_dir.is_dir() {
            return Err(StrataError::RepositoryNotInitialized(root));
        }

        let metadata = load_metadata(&state_dir)?;
        let store = ObjectStore::open(state_dir.join(OBJECTS_DIR))?;
        let history = History::open(&state_dir)?;
        let worktree = WorkTree::new(&root, &metadata.config)?;

        debug!("Opened repository at {:?}", root);
        Ok(Self {
            root,
            state_dir,
            metadata,
            store,
            history,
            worktree,
        })
    }

    /// Open the repository containing `start`, searching parent directories
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::RepositoryNotInitialized`] if neither `start`
    /// nor any of its ancestors holds a `.strata` directory.
    pub fn discover<P: AsRef<Path>>(start: P) -> Result<Self> {
        let start = start.as_ref();
        let absolute = start
            .canonicalize()
            .map_err(|_| StrataError::RepositoryNotInitialized(start.to_path_buf()))?;

        for dir in absolute.ancestors() {
            if dir.join(STATE_DIR).is_dir() {
                trace!("Found repository at {:?}", dir);
                return Self::open(dir);
            }
        }
        Err(StrataError::RepositoryNotInitialized(start.to_path_buf()))
    }

    /// Working-tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.strata` state directory
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Repository configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.metadata.config
    }

    /// Metadata written at `init`
    pub fn metadata(&self) -> &RepositoryMetadata {
        &self.metadata
    }

    /// The object store
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// The commit history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The working-tree scanner
    pub fn worktree(&self) -> &WorkTree {
        &self.worktree
    }

    /// Stage files
    ///
    /// Each argument may be a file, a directory (`.` for the whole tree) or a
    /// glob, relative to the repository root. The content of every selected
    /// file is stored in the object store and its entry in the staging index
    /// is inserted or replaced. Files selected through a directory or glob
    /// whose content equals the head commit and that have no staged entry are
    /// skipped; a file named explicitly is always staged.
    ///
    /// Returns the staged paths in order.
    ///
    /// # Errors
    ///
    /// - [`StrataError::PathNotFound`] if a file argument does not exist or a
    ///   glob matches nothing
    /// - [`StrataError::FileTooLarge`] if a file exceeds `max_file_size`
    /// - [`StrataError::InvalidPattern`] for malformed globs
    /// - [`StrataError::ConcurrentModification`] if the repository is locked
    #[instrument(skip_all, fields(args = paths.len()))]
    pub fn add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<String>> {
        let _lock = self.lock()?;
        let specs = Pathspec::parse_all(paths, &self.root)?;
        let (head, mut index) = self.load_state()?;
        let head_tree = tree_of(head.as_ref());

        let mut explicit = BTreeSet::new();
        let mut implicit = BTreeSet::new();
        let mut scanned: Option<Vec<String>> = None;

        for spec in &specs {
            if let Some(repo_path) = spec.repo_path() {
                if !repo_path.is_empty() && self.worktree.is_file(repo_path) {
                    explicit.insert(repo_path.to_string());
                    continue;
                }
                if !self.worktree.fs_path(repo_path).is_dir() {
                    return Err(StrataError::PathNotFound(spec.display_path()));
                }
            }

            if scanned.is_none() {
                scanned = Some(self.worktree.scan()?);
            }
            let matched = spec.select(scanned.as_deref().unwrap_or_default());
            if matched.is_empty() && spec.repo_path().is_none() {
                return Err(StrataError::PathNotFound(spec.display_path()));
            }
            implicit.extend(matched);
        }

        let candidates: Vec<(String, bool)> = explicit
            .iter()
            .map(|path| (path.clone(), true))
            .chain(
                implicit
                    .into_iter()
                    .filter(|path| !explicit.contains(path))
                    .map(|path| (path, false)),
            )
            .collect();

        let entries = candidates
            .into_par_iter()
            .map(|(path, explicit)| -> Result<Option<StagingEntry>> {
                let entry = self.read_entry(&path)?;
                let unchanged = !explicit
                    && !index.contains(&path)
                    && head_tree.get(&path) == Some(&entry.hash);
                Ok(if unchanged { None } else { Some(entry) })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut staged: Vec<String> = Vec::new();
        for entry in entries.into_iter().flatten() {
            trace!("Staging {} -> {}", entry.path, utils::short_hash(&entry.hash));
            staged.push(entry.path.clone());
            index.stage(entry);
        }
        staged.sort();

        index.save()?;
        info!("Staged {} paths", staged.len());
        Ok(staged)
    }

    /// Stage the removal of tracked paths
    ///
    /// The next commit drops every selected path from its tree. The working
    /// files are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::NotTracked`] if an argument selects no path of
    /// the head commit's tree.
    #[instrument(skip_all, fields(args = paths.len()))]
    pub fn remove<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<String>> {
        let _lock = self.lock()?;
        let specs = Pathspec::parse_all(paths, &self.root)?;
        let (head, mut index) = self.load_state()?;
        let head_tree = tree_of(head.as_ref());

        let tracked: BTreeSet<String> = head_tree.keys().cloned().collect();
        let selected = pathspec::expand(&specs, &tracked, StrataError::NotTracked)?;

        for path in &selected {
            let hash = head_tree
                .get(path)
                .cloned()
                .ok_or_else(|| StrataError::NotTracked(PathBuf::from(path)))?;
            index.stage(StagingEntry {
                path: path.clone(),
                hash,
                mode: DEFAULT_MODE,
                removed: true,
            });
        }

        index.save()?;
        info!("Staged removal of {} paths", selected.len());
        Ok(selected)
    }

    /// Remove entries from the staging index
    ///
    /// Unstaging a staged removal cancels it. Working files are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::NotStaged`] if an argument selects no staged path.
    #[instrument(skip_all, fields(args = paths.len()))]
    pub fn unstage<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<String>> {
        let _lock = self.lock()?;
        let specs = Pathspec::parse_all(paths, &self.root)?;
        let (_, mut index) = self.load_state()?;

        let staged: BTreeSet<String> = index.entries().map(|entry| entry.path.clone()).collect();
        let selected = pathspec::expand(&specs, &staged, StrataError::NotStaged)?;

        for path in &selected {
            index.unstage(path)?;
        }

        index.save()?;
        info!("Unstaged {} paths", selected.len());
        Ok(selected)
    }

    /// Record the staging index as a new commit
    ///
    /// The new tree is the head tree with every staged entry applied: staged
    /// files override, staged removals drop their path and every other path is
    /// inherited unchanged. The commit record is written, `HEAD` moves to it
    /// and the index is cleared. Moving `HEAD` is the commit point; see
    /// [`crate::index`] for how the index follows it atomically.
    ///
    /// # Errors
    ///
    /// - [`StrataError::NothingToCommit`] if the staging index is empty
    /// - [`StrataError::CorruptState`] if a staged blob is missing from the store
    /// - [`StrataError::ConcurrentModification`] if the repository is locked
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use strata::Repository;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let dir = tempfile::TempDir::new()?;
    /// # let repo = Repository::init(dir.path())?;
    /// std::fs::write(dir.path().join("notes.md"), "draft")?;
    /// repo.add(&["notes.md"])?;
    /// let commit = repo.commit("Add notes")?;
    /// assert!(commit.tree.contains_key("notes.md"));
    /// assert!(repo.staged()?.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub fn commit(&self, message: &str) -> Result<Commit> {
        let _lock = self.lock()?;
        let (head, mut index) = self.load_state()?;

        if index.is_empty() {
            return Err(StrataError::NothingToCommit);
        }

        for (path, hash) in index.snapshot() {
            if !self.store.exists(&hash) {
                return Err(StrataError::corrupt(format!(
                    "staged blob {} for {} is missing from the object store",
                    hash, path
                )));
            }
        }

        let (parent, parent_tree) = match head {
            Some(head) => (Some(head.hash), head.tree),
            None => (None, Tree::new()),
        };
        let tree = index.apply(&parent_tree);
        let commit = Commit::new(parent, tree, message.to_string(), Utc::now())?;

        self.history.append(&commit)?;

        index.clear(Some(commit.hash.clone()));
        if let Err(e) = index.save() {
            // HEAD already moved, so the stale index loads as empty
            warn!("Committed {} but could not rewrite the index: {}", commit.short_hash(), e);
        }

        info!("Created commit {} with {} files", commit.short_hash(), commit.tree.len());
        Ok(commit)
    }

    /// Classify every path of the working tree, staging index and head tree
    #[instrument(skip(self))]
    pub fn status(&self) -> Result<StatusReport> {
        let (head, index) = self.load_state()?;
        let head_tree = tree_of(head.as_ref());
        status::compute_status(&self.worktree, &index, head.map(|c| c.hash), &head_tree)
    }

    /// Overwrite working files from the staging index or the head commit
    ///
    /// For each selected path the staged blob wins; otherwise the head tree's
    /// blob is used. Unsaved edits to restored files are discarded. Nothing is
    /// written unless every argument can be restored.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::NothingToRestore`] if an argument selects no path
    /// that is staged or committed.
    #[instrument(skip_all, fields(args = paths.len()))]
    pub fn restore<P: AsRef<Path>>(&self, paths: &[P]) -> Result<RestoreResult> {
        let _lock = self.lock()?;
        let specs = Pathspec::parse_all(paths, &self.root)?;
        let (head, index) = self.load_state()?;
        let head_tree = tree_of(head.as_ref());

        let mut tracked: BTreeSet<String> = head_tree.keys().cloned().collect();
        tracked.extend(index.entries().map(|entry| entry.path.clone()));
        let selected = pathspec::expand(&specs, &tracked, StrataError::NothingToRestore)?;

        let mut plan = Vec::with_capacity(selected.len());
        for path in selected {
            let step = match index.get(&path) {
                Some(entry) if !entry.removed => RestoreStep {
                    hash: entry.hash.clone(),
                    mode: Some(entry.mode),
                    from_stage: true,
                    path,
                },
                _ => match head_tree.get(&path) {
                    Some(hash) => RestoreStep {
                        hash: hash.clone(),
                        mode: None,
                        from_stage: false,
                        path,
                    },
                    None => return Err(StrataError::NothingToRestore(PathBuf::from(path))),
                },
            };
            plan.push(step);
        }

        let blobs = plan
            .par_iter()
            .map(|step| self.store.get(&step.hash))
            .collect::<Result<Vec<_>>>()?;

        let mut result = RestoreResult::default();
        for (step, content) in plan.into_iter().zip(blobs) {
            self.write_working_file(&step.path, &content, step.mode)?;
            result.bytes_written += content.len() as u64;
            if step.from_stage {
                result.from_stage.push(step.path);
            } else {
                result.from_head.push(step.path);
            }
        }

        info!(
            "Restored {} files ({})",
            result.files_restored(),
            utils::format_bytes(result.bytes_written)
        );
        Ok(result)
    }

    /// Create a new commit whose tree is exactly the tree of `target`
    ///
    /// `target` is a full commit hash or a unique prefix. The new commit's
    /// parent is the current head and its message is `Revert to <hash>`. It
    /// is appended the same way as [`Repository::commit`].
    ///
    /// Working files covered by the target tree are overwritten to match it.
    /// Files tracked only by the previous head are left in place and listed in
    /// [`RevertResult::left_in_place`]. Pending staged entries are kept and
    /// stay staged on top of the new head.
    ///
    /// # Errors
    ///
    /// - [`StrataError::CommitNotFound`] if `target` matches no commit
    /// - [`StrataError::AmbiguousCommit`] if a prefix matches several commits
    /// - [`StrataError::ConcurrentModification`] if the repository is locked
    #[instrument(skip(self))]
    pub fn revert(&self, target: &str) -> Result<RevertResult> {
        let _lock = self.lock()?;
        let target_hash = self.history.resolve(target)?;
        let target_commit = self.history.get(&target_hash)?;
        let (head, mut index) = self.load_state()?;
        let head_tree = tree_of(head.as_ref());

        // Everything is read before the first write
        let outdated = target_commit
            .tree
            .par_iter()
            .map(|(path, hash)| -> Result<Option<(String, BlobHash)>> {
                let current = self.worktree.hash(path)?;
                Ok((current.as_ref() != Some(hash)).then(|| (path.clone(), hash.clone())))
            })
            .collect::<Result<Vec<_>>>()?;
        let outdated: Vec<(String, BlobHash)> = outdated.into_iter().flatten().collect();
        let blobs = outdated
            .par_iter()
            .map(|(_, hash)| self.store.get(hash))
            .collect::<Result<Vec<_>>>()?;

        let commit = Commit::new(
            head.map(|c| c.hash),
            target_commit.tree.clone(),
            format!("Revert to {}", target_hash),
            Utc::now(),
        )?;

        self.history.append_with(&commit, |commit| {
            if index.is_empty() {
                Ok(())
            } else {
                index.save_carried(&commit.hash)
            }
        })?;

        index.rebase(commit.hash.clone());
        if let Err(e) = index.save() {
            warn!("Reverted to {} but could not rewrite the index: {}", commit.short_hash(), e);
        }

        let mut files_written = 0;
        for ((path, _), content) in outdated.iter().zip(blobs) {
            self.write_working_file(path, &content, None)?;
            files_written += 1;
        }

        let left_in_place: Vec<String> = head_tree
            .keys()
            .filter(|path| !target_commit.tree.contains_key(*path) && self.worktree.is_file(path))
            .cloned()
            .collect();

        info!(
            "Reverted to {} as {} ({} files written)",
            utils::short_hash(&target_hash),
            commit.short_hash(),
            files_written
        );
        Ok(RevertResult {
            commit: commit.hash,
            target: target_hash,
            files_written,
            left_in_place,
        })
    }

    /// Commits from head to root, most recent first
    pub fn log(&self) -> Log<'_> {
        self.history.log()
    }

    /// Most recent commit, `None` before the first commit
    pub fn head(&self) -> Result<Option<Commit>> {
        self.history.head()
    }

    /// Look up a commit by full hash or unique prefix
    pub fn get_commit(&self, rev: &str) -> Result<Commit> {
        let hash = self.history.resolve(rev)?;
        self.history.get(&hash)
    }

    /// Path-level changes a commit introduced over its parent
    pub fn changes(&self, commit: &Commit) -> Result<TreeDiff> {
        let parent = match &commit.parent {
            Some(parent) => Some(self.history.get(parent)?),
            None => None,
        };
        Ok(commit::diff_trees(parent.as_ref().map(|p| &p.tree), &commit.tree))
    }

    /// Current staging entries in path order
    pub fn staged(&self) -> Result<Vec<StagingEntry>> {
        let (_, index) = self.load_state()?;
        Ok(index.entries().cloned().collect())
    }

    fn lock(&self) -> Result<RepoLock> {
        RepoLock::acquire(&self.state_dir)
    }

    /// Head commit and the staging index validated against it
    fn load_state(&self) -> Result<(Option<Commit>, StagingIndex)> {
        let head = self.history.head()?;
        let index = StagingIndex::load(self.state_dir.join(INDEX_FILE), head.as_ref())?;
        Ok((head, index))
    }

    fn read_entry(&self, repo_path: &str) -> Result<StagingEntry> {
        let fs_path = self.worktree.fs_path(repo_path);
        let metadata = fs::metadata(&fs_path)?;

        let limit = self.metadata.config.max_file_size;
        if limit > 0 && metadata.len() > limit {
            return Err(StrataError::FileTooLarge {
                path: PathBuf::from(repo_path),
                size: metadata.len(),
                limit,
            });
        }

        let hash = self.store.put_file(&fs_path)?;
        Ok(StagingEntry {
            path: repo_path.to_string(),
            hash,
            mode: utils::file_mode(&metadata),
            removed: false,
        })
    }

    fn write_working_file(&self, repo_path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        let fs_path = self.worktree.fs_path(repo_path);
        let mode = match mode {
            Some(mode) => mode,
            None => fs::metadata(&fs_path)
                .map(|m| utils::file_mode(&m))
                .unwrap_or(DEFAULT_MODE),
        };

        utils::atomic_write(&fs_path, content)?;
        utils::set_permissions(&fs_path, mode)?;
        trace!("Wrote {} ({} bytes)", repo_path, content.len());
        Ok(())
    }
}

/// Builder for creating a repository with custom configuration
///
/// # Examples
///
/// ```rust
/// use strata::RepositoryBuilder;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::TempDir::new()?;
/// let repo = RepositoryBuilder::new()
///     .ignore_patterns(vec!["*.log".to_string(), "target/".to_string()])
///     .max_file_size(10 * 1024 * 1024)
///     .init(dir.path())?;
/// assert_eq!(repo.config().max_file_size, 10 * 1024 * 1024);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositoryBuilder {
    config: RepositoryConfig,
}

impl RepositoryBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ignore patterns
    ///
    /// Patterns use gitignore syntax and apply on top of `.strataignore`
    /// files. The `.strata` directory is always ignored.
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.ignore_patterns = patterns;
        self
    }

    /// Add a single ignore pattern
    pub fn ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.ignore_patterns.push(pattern.into());
        self
    }

    /// Set the maximum size of a file that may be staged (0 = no limit)
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    /// Set whether the working-tree scan follows symbolic links
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.config.follow_symlinks = follow;
        self
    }

    /// Create the repository in `root`
    ///
    /// Lays out `.strata/` with its configuration, an empty object store, an
    /// empty history and an empty staging index. If any step fails the partial
    /// `.strata` directory is removed again.
    ///
    /// # Errors
    ///
    /// - [`StrataError::PathNotFound`] if `root` is not a directory
    /// - [`StrataError::AlreadyInitialized`] if `root` already has a repository
    /// - [`StrataError::InvalidPattern`] if an ignore pattern is malformed
    #[instrument(skip_all)]
    pub fn init<P: AsRef<Path>>(self, root: P) -> Result<Repository> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StrataError::PathNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        let state_dir = root.join(STATE_DIR);
        let worktree = WorkTree::new(&root, &self.config)?;

        match fs::create_dir(&state_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StrataError::AlreadyInitialized(root));
            }
            Err(e) => return Err(e.into()),
        }

        let metadata = RepositoryMetadata {
            format_version: FORMAT_VERSION,
            strata_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            config: self.config,
        };

        let (store, history) = match create_layout(&state_dir, &metadata) {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&state_dir) {
                    warn!("Failed to remove partial repository {:?}: {}", state_dir, cleanup);
                }
                return Err(e);
            }
        };

        info!("Initialized repository at {:?}", root);
        Ok(Repository {
            root,
            state_dir,
            metadata,
            store,
            history,
            worktree,
        })
    }
}

fn tree_of(head: Option<&Commit>) -> Tree {
    head.map(|commit| commit.tree.clone()).unwrap_or_default()
}

fn create_layout(state_dir: &Path, metadata: &RepositoryMetadata) -> Result<(ObjectStore, History)> {
    let _lock = RepoLock::acquire(state_dir)?;

    let json = serde_json::to_vec_pretty(metadata)?;
    utils::atomic_write(&state_dir.join(CONFIG_FILE), &json)?;

    let store = ObjectStore::init(state_dir.join(OBJECTS_DIR))?;
    let history = History::init(state_dir)?;
    StagingIndex::new(state_dir.join(INDEX_FILE), None).save()?;

    Ok((store, history))
}

fn load_metadata(state_dir: &Path) -> Result<RepositoryMetadata> {
    let path = state_dir.join(CONFIG_FILE);
    let content = match fs::read(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StrataError::corrupt(format!("configuration {:?} is missing", path)));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata: RepositoryMetadata = serde_json::from_slice(&content)
        .map_err(|e| StrataError::corrupt(format!("configuration {:?}: {}", path, e)))?;

    if metadata.format_version > FORMAT_VERSION {
        return Err(StrataError::corrupt(format!(
            "repository format version {} is newer than supported version {}",
            metadata.format_version, FORMAT_VERSION
        )));
    }
    Ok(metadata)
}
