//! # Strata - a small local version-control core
//!
//! Strata snapshots file content under content-derived identifiers, keeps an
//! editable staging area, records an immutable linear commit history and can
//! restore or revert files to earlier states.
//!
//! ## Overview
//!
//! - **Object store**: blobs keyed by the SHA-256 digest of their bytes;
//!   identical content is stored once
//! - **Staging index**: the draft of the next commit, persisted between runs
//! - **Commit history**: an append-only chain of commits, each holding the full
//!   `path -> blob` tree, a parent link, a message and a timestamp
//! - **Status engine**: classifies every path by comparing the working tree,
//!   the staging index and the head commit
//! - **Restore and revert**: overwrite working files from stored blobs, or
//!   record a new commit that replays an earlier tree
//!
//! History is strictly linear. There are no branches and no merges.
//!
//! ## Quick Start
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
//! let first = repo.commit("first")?;
//!
//! fs::write(dir.path().join("a.txt"), "hello world")?;
//! repo.add(&["a.txt"])?;
//! repo.commit("second")?;
//!
//! // A new commit whose tree equals the first one
//! let revert = repo.revert(&first.hash)?;
//! assert_eq!(repo.head()?.unwrap().tree, first.tree);
//! assert_eq!(fs::read_to_string(dir.path().join("a.txt"))?, "hello");
//! assert_eq!(repo.status()?.get("a.txt"), Some(FileStatus::Unmodified));
//! # let _ = revert;
//! # Ok(())
//! # }
//! ```
//!
//! ## Repository Layout
//!
//! ```text
//! <root>/
//! ├── .strataignore          # optional ignore rules, gitignore syntax
//! └── .strata/
//!     ├── config.json        # format version and configuration
//!     ├── HEAD               # head commit hash, empty before the first commit
//!     ├── index.json         # staging index
//!     ├── LOCK               # advisory lock held by mutating operations
//!     ├── objects/ab/cdef…   # blobs
//!     └── commits/<hash>.json
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] with [`StrataError`]. Expected
//! conditions (a missing path, an unknown commit, an empty staging index) are
//! ordinary variants; each maps to a stable exit code through
//! [`StrataError::exit_code`].
//!
//! ## Module Organization
//!
//! - [`repository`]: the [`Repository`] context and [`RepositoryBuilder`]
//! - [`object_store`]: content-addressable blob storage
//! - [`index`]: the staging index
//! - [`commit`] and [`history`]: commit records and the linear chain
//! - [`status`]: the status classifier
//! - [`worktree`] and [`pathspec`]: working-tree scanning and path arguments
//! - [`lock`]: the repository lock
//! - [`types`], [`error`], [`utils`]: shared types and helpers

pub mod commit;
pub mod error;
pub mod history;
pub mod index;
pub mod lock;
pub mod object_store;
pub mod pathspec;
pub mod repository;
pub mod status;
pub mod types;
pub mod utils;
pub mod worktree;

// Re-export main types for convenience
pub use commit::Commit;
pub use error::{Result, StrataError};
pub use history::{History, Log};
pub use index::StagingIndex;
pub use object_store::{ObjectStore, ObjectStoreStats};
pub use repository::{Repository, RepositoryBuilder};
pub use types::*;
