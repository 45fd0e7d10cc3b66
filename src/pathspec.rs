//! Path arguments
//!
//! Operations that take paths (`add`, `remove`, `unstage`, `restore`) accept
//! three kinds of argument, all relative to the repository root:
//!
//! - a file path, matching exactly that path
//! - a directory path (`.` or an empty path for the root), matching every
//!   path beneath it
//! - a glob such as `*.txt` or `src/**/mod.rs`, matched against whole
//!   repository paths; `*` also crosses directory separators
//!
//! An argument with glob characters that names an existing file or directory
//! is taken literally, so `a[1].txt` can be staged by name.
//!
//! A [`Pathspec`] only matches; which candidates it is matched against (the
//! working tree, the staging index, the head tree) is up to the operation.

use crate::error::{Result, StrataError};
use crate::utils;
use globset::{Glob, GlobMatcher};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One parsed path argument
#[derive(Debug, Clone)]
pub enum Pathspec {
    /// A file or directory
    Path {
        /// Normalised repository path, empty for the root
        repo_path: String,
        /// The argument as given
        arg: PathBuf,
    },
    /// A glob pattern
    Glob {
        /// Compiled matcher
        matcher: GlobMatcher,
        /// The pattern as given
        pattern: String,
    },
}

impl Pathspec {
    /// Parse a path argument
    ///
    /// Absolute paths must lie inside `root`. Arguments containing any of
    /// `*?[{` are treated as globs unless they name an existing path. A glob
    /// also selects the path spelled exactly like the pattern.
    ///
    /// # Errors
    ///
    /// - [`StrataError::PathNotFound`] for paths outside the repository
    /// - [`StrataError::InvalidPattern`] for malformed globs
    pub fn parse(arg: &Path, root: &Path) -> Result<Self> {
        let text = arg.to_string_lossy();
        if is_glob(&text) && fs::symlink_metadata(root.join(arg)).is_err() {
            let pattern = text.trim_start_matches("./").to_string();
            let matcher = Glob::new(&pattern)
                .map_err(|e| StrataError::InvalidPattern(format!("{}: {}", pattern, e)))?
                .compile_matcher();
            return Ok(Pathspec::Glob { matcher, pattern });
        }

        let relative = if arg.is_absolute() {
            utils::make_relative(arg, root, root)?
        } else {
            arg.to_path_buf()
        };
        let repo_path = utils::to_repo_path(&relative)?;

        Ok(Pathspec::Path {
            repo_path,
            arg: arg.to_path_buf(),
        })
    }

    /// Parse every argument
    pub fn parse_all<P: AsRef<Path>>(args: &[P], root: &Path) -> Result<Vec<Self>> {
        args.iter().map(|arg| Self::parse(arg.as_ref(), root)).collect()
    }

    /// Whether the repository path is selected by this argument
    pub fn matches(&self, repo_path: &str) -> bool {
        match self {
            Pathspec::Path { repo_path: dir, .. } => utils::is_within(repo_path, dir),
            Pathspec::Glob { matcher, pattern } => {
                matcher.is_match(repo_path) || repo_path == pattern
            }
        }
    }

    /// Repository path of a plain path argument
    pub fn repo_path(&self) -> Option<&str> {
        match self {
            Pathspec::Path { repo_path, .. } => Some(repo_path),
            Pathspec::Glob { .. } => None,
        }
    }

    /// The argument as the caller wrote it, for error messages
    pub fn display_path(&self) -> PathBuf {
        match self {
            Pathspec::Path { arg, .. } => arg.clone(),
            Pathspec::Glob { pattern, .. } => PathBuf::from(pattern),
        }
    }

    /// Select the candidates matched by this argument
    pub fn select<'a, I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        candidates
            .into_iter()
            .filter(|candidate| self.matches(candidate))
            .cloned()
            .collect()
    }
}

/// Expand arguments against a candidate set
///
/// Every argument must select at least one candidate; the first one that
/// selects nothing is reported through `missing`. The result is sorted and
/// free of duplicates.
pub fn expand<F>(specs: &[Pathspec], candidates: &BTreeSet<String>, missing: F) -> Result<Vec<String>>
where
    F: Fn(PathBuf) -> StrataError,
{
    let mut selected = BTreeSet::new();
    for spec in specs {
        let matched = spec.select(candidates);
        if matched.is_empty() {
            return Err(missing(spec.display_path()));
        }
        selected.extend(matched);
    }
    Ok(selected.into_iter().collect())
}

fn is_glob(text: &str) -> bool {
    text.contains(['*', '?', '[', '{'])
}
