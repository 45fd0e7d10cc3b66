//! End-to-end workflows for strata
//!
//! Drives a repository through init, staging, commits, restore and revert the
//! way a user would, checking the working tree and history after each step.

use ::strata::*;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Test harness owning a temporary repository
pub struct StrataTestHarness {
    pub temp_dir: TempDir,
    pub repo: Repository,
}

impl StrataTestHarness {
    /// Create an empty repository in a fresh directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        Self { temp_dir, repo }
    }

    /// Write a file relative to the repository root, creating parents
    pub fn write(&self, path: &str, content: &str) {
        let full = self.repo.root().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.repo.root().join(path)).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.repo.root().join(path).exists()
    }

    /// Stage and commit the given paths in one step
    pub fn commit_paths(&self, paths: &[&str], message: &str) -> Commit {
        self.repo.add(paths).unwrap();
        self.repo.commit(message).unwrap()
    }

    pub fn status_of(&self, path: &str) -> Option<FileStatus> {
        self.repo.status().unwrap().get(path)
    }

    pub fn log_len(&self) -> usize {
        self.repo.log().count()
    }

    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    /// Content of every tracked file as it stands in the working tree
    pub fn tracked_contents(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let head = self.repo.head()?.context("no commits yet")?;
        head.tree
            .keys()
            .map(|path| -> anyhow::Result<(String, String)> {
                let content = fs::read_to_string(self.root().join(path))
                    .with_context(|| format!("reading {}", path))?;
                Ok((path.clone(), content))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_commit() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "hello");

        h.repo.add(&["a.txt"]).unwrap();
        assert_eq!(h.status_of("a.txt"), Some(FileStatus::StagedNew));

        let first = h.repo.commit("first").unwrap();
        assert_eq!(h.log_len(), 1);
        assert!(first.is_root());
        assert_eq!(h.status_of("a.txt"), Some(FileStatus::Unmodified));
    }

    #[test]
    fn test_restore_unstaged_edit() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "hello");
        h.commit_paths(&["a.txt"], "first");

        h.write("a.txt", "hello world");
        assert_eq!(h.status_of("a.txt"), Some(FileStatus::ModifiedSinceCommit));

        let result = h.repo.restore(&["a.txt"]).unwrap();
        assert_eq!(result.from_head, vec!["a.txt"]);
        assert_eq!(h.read("a.txt"), "hello");
        assert_eq!(h.status_of("a.txt"), Some(FileStatus::Unmodified));
    }

    #[test]
    fn test_revert_replays_first_tree() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "hello");
        let first = h.commit_paths(&["a.txt"], "first");

        h.write("a.txt", "hello world");
        let second = h.commit_paths(&["a.txt"], "second");
        assert_eq!(h.log_len(), 2);
        assert_eq!(second.parent.as_deref(), Some(first.hash.as_str()));

        let result = h.repo.revert(&first.hash).unwrap();
        let head = h.repo.head().unwrap().unwrap();

        assert_eq!(h.log_len(), 3);
        assert_eq!(head.hash, result.commit);
        assert_eq!(head.parent.as_deref(), Some(second.hash.as_str()));
        assert_eq!(head.tree["a.txt"], utils::hash_data(b"hello"));
        assert_eq!(head.message, format!("Revert to {}", first.hash));
        assert_eq!(h.read("a.txt"), "hello");
    }

    #[test]
    fn test_unstage_returns_file_to_untracked() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "hello");
        h.commit_paths(&["a.txt"], "first");

        h.write("b.txt", "bee");
        h.repo.add(&["b.txt"]).unwrap();
        assert_eq!(h.status_of("b.txt"), Some(FileStatus::StagedNew));

        h.repo.unstage(&["b.txt"]).unwrap();
        assert!(h.repo.staged().unwrap().is_empty());
        assert_eq!(h.status_of("b.txt"), Some(FileStatus::Untracked));
    }

    #[test]
    fn test_commit_inherits_unstaged_paths() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "a");
        h.write("b.txt", "b");
        let first = h.commit_paths(&["a.txt", "b.txt"], "first");

        h.write("b.txt", "b2");
        let second = h.commit_paths(&["b.txt"], "second");

        assert_eq!(second.tree["a.txt"], first.tree["a.txt"]);
        assert_ne!(second.tree["b.txt"], first.tree["b.txt"]);

        let diff = h.repo.changes(&second).unwrap();
        assert_eq!(diff.modified, vec!["b.txt"]);
        assert!(diff.added.is_empty() && diff.removed.is_empty());
    }

    #[test]
    fn test_directory_and_glob_arguments() {
        let h = StrataTestHarness::new();
        h.write("src/main.rs", "fn main() {}");
        h.write("src/lib.rs", "pub fn lib() {}");
        h.write("src/nested/mod.rs", "mod nested;");
        h.write("notes.md", "notes");
        h.write("todo.md", "todo");

        let staged = h.repo.add(&["src"]).unwrap();
        assert_eq!(staged, vec!["src/lib.rs", "src/main.rs", "src/nested/mod.rs"]);

        let staged = h.repo.add(&["*.md"]).unwrap();
        assert_eq!(staged, vec!["notes.md", "todo.md"]);

        h.repo.commit("everything").unwrap();
        assert!(h.repo.status().unwrap().is_clean());

        // Restore a whole directory
        h.write("src/main.rs", "broken");
        h.write("src/nested/mod.rs", "broken");
        let result = h.repo.restore(&["src"]).unwrap();
        assert_eq!(result.files_restored(), 3);
        assert_eq!(h.read("src/main.rs"), "fn main() {}");
        assert_eq!(h.read("src/nested/mod.rs"), "mod nested;");
    }

    #[test]
    fn test_remove_then_commit_drops_path() {
        let h = StrataTestHarness::new();
        h.write("keep.txt", "keep");
        h.write("drop.txt", "drop");
        h.commit_paths(&["keep.txt", "drop.txt"], "first");

        h.repo.remove(&["drop.txt"]).unwrap();
        assert_eq!(h.status_of("drop.txt"), Some(FileStatus::StagedDeleted));
        assert!(h.exists("drop.txt"));

        let second = h.repo.commit("drop a file").unwrap();
        assert!(!second.tree.contains_key("drop.txt"));
        assert!(second.tree.contains_key("keep.txt"));
        assert_eq!(h.repo.changes(&second).unwrap().removed, vec!["drop.txt"]);

        // Still on disk, now outside the tree
        assert_eq!(h.status_of("drop.txt"), Some(FileStatus::Untracked));
    }

    #[test]
    fn test_restore_prefers_staged_content() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "committed");
        h.commit_paths(&["a.txt"], "first");

        h.write("a.txt", "staged");
        h.repo.add(&["a.txt"]).unwrap();
        h.write("a.txt", "scribbled");
        assert_eq!(h.status_of("a.txt"), Some(FileStatus::ModifiedSinceStage));

        let result = h.repo.restore(&["a.txt"]).unwrap();
        assert_eq!(result.from_stage, vec!["a.txt"]);
        assert_eq!(h.read("a.txt"), "staged");
        assert_eq!(h.status_of("a.txt"), Some(FileStatus::StagedModified));
    }

    #[test]
    fn test_restore_recreates_deleted_file() {
        let h = StrataTestHarness::new();
        h.write("deep/dir/file.txt", "content");
        h.commit_paths(&["deep"], "first");

        fs::remove_dir_all(h.root().join("deep")).unwrap();
        assert_eq!(h.status_of("deep/dir/file.txt"), Some(FileStatus::Deleted));

        h.repo.restore(&["deep/dir/file.txt"]).unwrap();
        assert_eq!(h.read("deep/dir/file.txt"), "content");
    }

    #[test]
    fn test_revert_leaves_newer_files_in_place() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "a");
        let first = h.commit_paths(&["a.txt"], "first");

        h.write("b.txt", "b");
        h.commit_paths(&["b.txt"], "second");

        let result = h.repo.revert(&first.hash[..10]).unwrap();
        assert_eq!(result.target, first.hash);
        assert_eq!(result.left_in_place, vec!["b.txt"]);
        assert!(h.exists("b.txt"));
        assert_eq!(h.status_of("b.txt"), Some(FileStatus::Untracked));
        assert_eq!(h.repo.head().unwrap().unwrap().tree, first.tree);
    }

    #[test]
    fn test_revert_keeps_pending_stage() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "v1");
        let first = h.commit_paths(&["a.txt"], "first");
        h.write("a.txt", "v2");
        h.commit_paths(&["a.txt"], "second");

        h.write("new.txt", "pending");
        h.repo.add(&["new.txt"]).unwrap();

        h.repo.revert(&first.hash).unwrap();
        let staged = h.repo.staged().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].path, "new.txt");

        let after = h.repo.commit("after revert").unwrap();
        assert_eq!(after.tree["a.txt"], first.tree["a.txt"]);
        assert!(after.tree.contains_key("new.txt"));
    }

    #[test]
    fn test_ignore_file_is_honoured() {
        let h = StrataTestHarness::new();
        h.write(".strataignore", "*.log\nbuild/\n!keep.log\n");
        h.write("app.log", "noise");
        h.write("keep.log", "signal");
        h.write("build/out.bin", "binary");
        h.write("main.rs", "fn main() {}");

        let report = h.repo.status().unwrap();
        let untracked = report.by_status(FileStatus::Untracked);
        assert_eq!(untracked, vec![".strataignore", "keep.log", "main.rs"]);

        let staged = h.repo.add(&["."]).unwrap();
        assert_eq!(staged, vec![".strataignore", "keep.log", "main.rs"]);
    }

    #[test]
    fn test_configured_ignore_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let repo = RepositoryBuilder::new()
            .ignore_pattern("target/")
            .init(temp_dir.path())
            .unwrap();

        fs::create_dir_all(temp_dir.path().join("target")).unwrap();
        fs::write(temp_dir.path().join("target/app"), "bin").unwrap();
        fs::write(temp_dir.path().join("lib.rs"), "lib").unwrap();

        let report = repo.status().unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.get("lib.rs"), Some(FileStatus::Untracked));

        // Persisted for later opens
        let reopened = Repository::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.config().ignore_patterns, vec!["target/"]);
    }

    #[test]
    fn test_discover_from_subdirectory() {
        let h = StrataTestHarness::new();
        h.write("a/b/c.txt", "c");

        let found = Repository::discover(h.root().join("a/b")).unwrap();
        assert_eq!(found.root(), h.root());
    }

    #[test]
    fn test_get_commit_by_prefix() {
        let h = StrataTestHarness::new();
        h.write("a.txt", "a");
        let first = h.commit_paths(&["a.txt"], "first");

        let found = h.repo.get_commit(&first.hash[..6]).unwrap();
        assert_eq!(found, first);
        assert!(matches!(
            h.repo.get_commit("ffffffff"),
            Err(StrataError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_log_is_newest_first_and_restartable() {
        let h = StrataTestHarness::new();
        let mut hashes = Vec::new();
        for i in 0..5 {
            h.write("counter.txt", &i.to_string());
            hashes.push(h.commit_paths(&["counter.txt"], &format!("commit {}", i)).hash);
        }
        hashes.reverse();

        let logged: Vec<String> = h.repo.log().map(|c| c.unwrap().hash).collect();
        assert_eq!(logged, hashes);

        let again: Vec<String> = h.repo.log().take(2).map(|c| c.unwrap().hash).collect();
        assert_eq!(again, hashes[..2]);
    }

    #[test]
    fn test_deduplicated_content_across_paths() {
        let h = StrataTestHarness::new();
        h.write("one.txt", "same bytes");
        h.write("two.txt", "same bytes");
        h.write("dir/three.txt", "same bytes");

        let commit = h.commit_paths(&["."], "dupes");
        assert_eq!(commit.tree["one.txt"], commit.tree["two.txt"]);
        assert_eq!(h.repo.store().stats().unwrap().object_count, 1);
    }

    #[test]
    fn test_revert_round_trip_restores_every_file() -> anyhow::Result<()> {
        let h = StrataTestHarness::new();
        h.write("a.txt", "a1");
        h.write("src/b.rs", "b1");
        h.repo.add(&["."])?;
        let first = h.repo.commit("first")?;
        let before = h.tracked_contents()?;

        h.write("a.txt", "a2");
        fs::remove_file(h.root().join("src/b.rs"))?;
        h.repo.add(&["a.txt"])?;
        h.repo.remove(&["src/b.rs"])?;
        h.repo.commit("second")?;
        anyhow::ensure!(!h.exists("src/b.rs"), "removed file still on disk");

        h.repo.revert(&first.hash)?;
        assert_eq!(h.tracked_contents()?, before);
        assert!(h.repo.status()?.is_clean());
        Ok(())
    }

    #[test]
    fn test_bracketed_file_name_is_literal() -> anyhow::Result<()> {
        let h = StrataTestHarness::new();
        h.write("a[1].txt", "bracket");
        h.write("a1.txt", "plain");

        let staged = h.repo.add(&["a[1].txt"])?;
        assert_eq!(staged, vec!["a[1].txt"]);
        assert_eq!(h.status_of("a1.txt"), Some(FileStatus::Untracked));

        let commit = h.repo.commit("brackets")?;
        assert_eq!(commit.tree.keys().collect::<Vec<_>>(), vec!["a[1].txt"]);

        fs::remove_file(h.root().join("a[1].txt"))?;
        h.repo.restore(&["a[1].txt"])?;
        assert_eq!(h.read("a[1].txt"), "bracket");
        Ok(())
    }
}
