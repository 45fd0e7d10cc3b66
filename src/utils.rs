//! Utility functions for strata
//!
//! Hashing helpers, crash-safe file replacement, permission handling and
//! conversion between filesystem paths and the `/`-separated repository paths
//! used as keys in the staging index and commit trees.

use crate::error::{Result, StrataError};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Hash a file's content using SHA-256
///
/// Reads the file through an 8KB buffer so large files are never held in
/// memory at once. Returns the lowercase hex digest.
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary data using SHA-256
///
/// The digest depends only on the bytes, never on where they came from.
///
/// ```rust
/// use strata::utils::hash_data;
///
/// let hash = hash_data(b"hello");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_data(b"hello"));
/// ```
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check that a string is a well-formed lowercase hex SHA-256 digest
pub fn is_valid_hash(hash: &str) -> bool {
    hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Atomically replace a file's content
///
/// Writes to a temporary file in the destination directory, syncs it, then
/// renames it over `path`. A crash at any point leaves either the old or the
/// new content, never a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    trace!("Atomically wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Get Unix permission bits of a file
#[cfg(unix)]
pub fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Get permissions from metadata (non-Unix implementation)
#[cfg(not(unix))]
pub fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Set Unix permissions
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Set permissions (non-Unix implementation)
///
/// Only the owner-write bit can be expressed, as the read-only flag.
#[cfg(not(unix))]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Convert a path relative to the repository root into a repository path
///
/// Repository paths use `/` separators, contain no `.` or `..` components and
/// never start with a separator. Paths that escape the root are rejected.
pub fn to_repo_path(relative: &Path) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| StrataError::internal(format!("Non UTF-8 path: {:?}", relative)))?;
                parts.push(part.to_string());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(StrataError::PathNotFound(relative.to_path_buf()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StrataError::PathNotFound(relative.to_path_buf()));
            }
        }
    }

    Ok(parts.join("/"))
}

/// Resolve a repository path against the repository root
pub fn to_fs_path(root: &Path, repo_path: &str) -> PathBuf {
    repo_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Make a user-supplied path relative to the repository root
///
/// Relative arguments are interpreted against `cwd`. The result is lexical; the
/// path does not need to exist.
pub fn make_relative(path: &Path, root: &Path, cwd: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let absolute = normalize_lexically(&absolute);
    let root = normalize_lexically(root);

    absolute
        .strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| StrataError::PathNotFound(path.to_path_buf()))
}

/// Remove `.` and resolve `..` components without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Whether `repo_path` equals `dir` or lies beneath it
///
/// An empty `dir` denotes the repository root and contains everything.
pub fn is_within(repo_path: &str, dir: &str) -> bool {
    dir.is_empty()
        || repo_path == dir
        || (repo_path.starts_with(dir) && repo_path.as_bytes().get(dir.len()) == Some(&b'/'))
}

/// Shorten a hash for display
pub fn short_hash(hash: &str) -> &str {
    &hash[..8.min(hash.len())]
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
