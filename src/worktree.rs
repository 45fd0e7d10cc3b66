//! Working-tree scanning
//!
//! Enumerates the files of the working tree as repository paths, honouring
//! `.strataignore` files (gitignore syntax, `!` negation included, in any
//! directory) and the ignore patterns stored in the repository configuration.
//! The `.strata` state directory is never part of the working tree.
//!
//! The walk runs on the `ignore` crate's parallel walker; results are sorted
//! before they are returned so callers always see a deterministic order.

use crate::error::{Result, StrataError};
use crate::types::{BlobHash, RepositoryConfig};
use crate::utils;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{WalkBuilder, WalkState};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind::NotFound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Name of the repository state directory
pub const STATE_DIR: &str = ".strata";

/// Per-directory ignore file name
pub const IGNORE_FILE: &str = ".strataignore";

/// Scanner over the working tree of a repository
#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
    configured: Arc<Gitignore>,
    follow_symlinks: bool,
}

impl WorkTree {
    /// Create a scanner for `root` with the configured ignore patterns
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidPattern`] if a configured pattern is not
    /// valid gitignore syntax.
    pub fn new(root: &Path, config: &RepositoryConfig) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in &config.ignore_patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| StrataError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        }
        let configured = builder
            .build()
            .map_err(|e| StrataError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
            configured: Arc::new(configured),
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Root directory of the working tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All non-ignored files, as sorted repository paths
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Walk`] if a directory cannot be read or a
    /// followed symlink loops. Entries that vanish during the walk are skipped.
    pub fn scan(&self) -> Result<Vec<String>> {
        let found = Arc::new(Mutex::new(Vec::<String>::new()));
        let failures = Arc::new(Mutex::new(Vec::<ignore::Error>::new()));
        let configured = Arc::clone(&self.configured);
        let state_dir = self.root.join(STATE_DIR);

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .follow_links(self.follow_symlinks)
            .hidden(false)
            .parents(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .add_custom_ignore_filename(IGNORE_FILE)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                entry.path() != state_dir
                    && !configured
                        .matched_path_or_any_parents(entry.path(), is_dir)
                        .is_ignore()
            });

        builder.build_parallel().run(|| {
            let found = Arc::clone(&found);
            let failures = Arc::clone(&failures);
            let root = self.root.clone();

            Box::new(move |entry_result| {
                let entry = match entry_result {
                    Ok(entry) => entry,
                    Err(e) if e.io_error().is_some_and(|io| io.kind() == NotFound) => {
                        trace!("Entry vanished during walk: {}", e);
                        return WalkState::Continue;
                    }
                    Err(e) => {
                        failures.lock().push(e);
                        return WalkState::Quit;
                    }
                };

                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    if entry.path_is_symlink() {
                        trace!("Skipping symlink {:?}", entry.path());
                    }
                    return WalkState::Continue;
                }

                let relative = match entry.path().strip_prefix(&root) {
                    Ok(relative) => relative,
                    Err(_) => return WalkState::Continue,
                };
                match utils::to_repo_path(relative) {
                    Ok(repo_path) if !repo_path.is_empty() => found.lock().push(repo_path),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping {:?}: {}", entry.path(), e),
                }

                WalkState::Continue
            })
        });

        if let Some(e) = failures.lock().drain(..).next() {
            return Err(e.into());
        }

        let mut paths = std::mem::take(&mut *found.lock());
        paths.sort();
        debug!("Scanned {} working-tree files", paths.len());
        Ok(paths)
    }

    /// Filesystem path of a repository path
    pub fn fs_path(&self, repo_path: &str) -> PathBuf {
        utils::to_fs_path(&self.root, repo_path)
    }

    /// Whether the repository path names a regular file in the working tree
    pub fn is_file(&self, repo_path: &str) -> bool {
        let path = self.fs_path(repo_path);
        let metadata = if self.follow_symlinks {
            fs::metadata(&path)
        } else {
            fs::symlink_metadata(&path)
        };
        metadata.map(|m| m.is_file()).unwrap_or(false)
    }

    /// Content hash of a working-tree file, `None` if it does not exist
    pub fn hash(&self, repo_path: &str) -> Result<Option<BlobHash>> {
        if !self.is_file(repo_path) {
            return Ok(None);
        }
        match utils::hash_file_content(&self.fs_path(repo_path)) {
            Ok(hash) => Ok(Some(hash)),
            Err(StrataError::Io(e)) if e.kind() == NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
