//! Error types for the strata library
//!
//! Every repository operation returns [`Result<T>`]. Expected conditions such as
//! a missing path or an unknown commit are ordinary variants of [`StrataError`];
//! only genuine I/O failures surface as [`StrataError::Io`].
//!
//! Each variant maps to a stable process exit code through
//! [`StrataError::exit_code`], which the command-line front end uses verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the strata library
pub type Result<T> = std::result::Result<T, StrataError>;

/// Main error type for all strata operations
#[derive(Debug, Error)]
pub enum StrataError {
    /// No `.strata` directory was found for the requested root
    #[error("Not a strata repository (or any parent): {0:?}")]
    RepositoryNotInitialized(PathBuf),

    /// `init` was called on a root that already has a repository
    #[error("Repository already initialized at {0:?}")]
    AlreadyInitialized(PathBuf),

    /// The path does not exist in the working tree
    #[error("Path not found: {0:?}")]
    PathNotFound(PathBuf),

    /// The path has no entry in the staging index
    #[error("Path is not staged: {0:?}")]
    NotStaged(PathBuf),

    /// The path is neither staged nor present in the head commit
    #[error("Nothing to restore for {0:?}")]
    NothingToRestore(PathBuf),

    /// The path is not part of the head commit's tree
    #[error("Path is not tracked: {0:?}")]
    NotTracked(PathBuf),

    /// No commit carries this hash (or hash prefix)
    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    /// A hash prefix matched more than one commit
    #[error("Commit prefix {prefix} is ambiguous ({} candidates)", .candidates.len())]
    AmbiguousCommit {
        /// The prefix given by the caller
        prefix: String,
        /// Every full hash that starts with the prefix
        candidates: Vec<String>,
    },

    /// Commit was requested with an empty staging index
    #[error("Nothing to commit: the staging index is empty")]
    NothingToCommit,

    /// No object with this digest exists in the object store
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// A persisted state file failed validation
    #[error("Corrupt repository state: {0}")]
    CorruptState(String),

    /// Another operation holds the repository lock
    #[error("Repository is locked by another operation: {0:?}")]
    ConcurrentModification(PathBuf),

    /// A glob path argument could not be parsed
    #[error("Invalid path pattern: {0}")]
    InvalidPattern(String),

    /// File exceeds the configured size limit
    #[error("File too large: {path:?} ({size} bytes exceeds limit of {limit} bytes)")]
    FileTooLarge {
        /// Path to the file
        path: PathBuf,
        /// Actual file size
        size: u64,
        /// Configured size limit
        limit: u64,
    },

    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The working-tree walk could not read part of the tree
    #[error("Working tree scan failed: {0}")]
    Walk(#[from] ignore::Error),

    /// Errors during JSON serialization of non-state data
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors during bincode encoding
    #[error("Bincode error: {0}")]
    Bincode(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bincode::error::EncodeError> for StrataError {
    fn from(err: bincode::error::EncodeError) -> Self {
        StrataError::Bincode(err.to_string())
    }
}

impl From<tempfile::PersistError> for StrataError {
    fn from(err: tempfile::PersistError) -> Self {
        StrataError::Io(err.error)
    }
}

impl StrataError {
    /// Create a corrupt-state error with a custom message
    pub fn corrupt(msg: impl Into<String>) -> Self {
        StrataError::CorruptState(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        StrataError::Internal(msg.into())
    }

    /// Stable process exit code for this error kind
    ///
    /// `0` is reserved for success and `1` for failures that are not one of the
    /// documented kinds (I/O, serialization, internal).
    pub fn exit_code(&self) -> i32 {
        match self {
            StrataError::RepositoryNotInitialized(_) => 2,
            StrataError::PathNotFound(_) => 3,
            StrataError::NotStaged(_) => 4,
            StrataError::NothingToRestore(_) => 5,
            StrataError::CommitNotFound(_) => 6,
            StrataError::CorruptState(_) => 7,
            StrataError::ConcurrentModification(_) => 8,
            StrataError::AlreadyInitialized(_) => 9,
            StrataError::NothingToCommit => 10,
            StrataError::NotTracked(_) => 11,
            StrataError::AmbiguousCommit { .. } => 12,
            StrataError::InvalidPattern(_) => 13,
            StrataError::FileTooLarge { .. } => 14,
            StrataError::ObjectNotFound(_) => 15,
            StrataError::Io(_)
            | StrataError::Walk(_)
            | StrataError::Json(_)
            | StrataError::Bincode(_)
            | StrataError::Internal(_) => 1,
        }
    }

    /// Check if this error indicates corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, StrataError::CorruptState(_))
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            StrataError::RepositoryNotInitialized(_) => {
                format!("{}. Run 'strata init' first.", self)
            }
            StrataError::NotStaged(path) => {
                format!("{:?} is not staged. Use 'strata status' to see staged paths.", path)
            }
            StrataError::CommitNotFound(hash) => {
                format!("Commit '{}' not found. Use 'strata log' to see available commits.", hash)
            }
            StrataError::ConcurrentModification(lock) => {
                format!(
                    "Another strata operation is in progress (lock file {:?}). \
                     Retry once it has finished.",
                    lock
                )
            }
            StrataError::NothingToCommit => {
                "Nothing to commit. Use 'strata add <path>' to stage changes.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
