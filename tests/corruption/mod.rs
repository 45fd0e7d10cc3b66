//! Resilience tests for strata
//!
//! Damages persisted state in the ways a crash, a bad disk or a stray editor
//! could, and checks that every read reports `CorruptState` instead of
//! returning wrong data. Also covers lock contention between operations.

use ::strata::lock::RepoLock;
use ::strata::*;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use tracing::info;

/// A repository with two commits over `a.txt` and `b.txt`
pub struct DamagedRepo {
    pub temp_dir: TempDir,
    pub repo: Repository,
    pub first: Commit,
    pub second: Commit,
}

impl DamagedRepo {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();

        fs::write(temp_dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(temp_dir.path().join("b.txt"), "beta").unwrap();
        repo.add(&["a.txt", "b.txt"]).unwrap();
        let first = repo.commit("first").unwrap();

        fs::write(temp_dir.path().join("a.txt"), "alpha 2").unwrap();
        repo.add(&["a.txt"]).unwrap();
        let second = repo.commit("second").unwrap();

        Self {
            temp_dir,
            repo,
            first,
            second,
        }
    }

    pub fn state_path(&self, name: &str) -> PathBuf {
        self.repo.state_dir().join(name)
    }

    pub fn object_path(&self, hash: &str) -> PathBuf {
        self.repo.store().root().join(&hash[..2]).join(&hash[2..])
    }

    pub fn commit_path(&self, hash: &str) -> PathBuf {
        self.state_path("commits").join(format!("{}.json", hash))
    }

    pub fn reopen(&self) -> Result<Repository> {
        Repository::open(self.temp_dir.path())
    }
}

fn assert_corrupt<T: std::fmt::Debug>(result: Result<T>) {
    match result {
        Err(e) => assert!(e.is_corruption(), "expected CorruptState, got {:?}", e),
        Ok(value) => panic!("expected CorruptState, got Ok({:?})", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tampered_object_is_detected() {
        let fixture = DamagedRepo::new();
        let hash = fixture.first.tree["b.txt"].clone();
        fs::write(fixture.object_path(&hash), "not beta").unwrap();

        assert_corrupt(fixture.repo.store().get(&hash));

        // Restore refuses before touching the working tree
        fs::write(fixture.temp_dir.path().join("b.txt"), "edited").unwrap();
        assert_corrupt(fixture.repo.restore(&["b.txt"]));
        assert_eq!(
            fs::read_to_string(fixture.temp_dir.path().join("b.txt")).unwrap(),
            "edited"
        );
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let fixture = DamagedRepo::new();
        let hash = fixture.first.tree["a.txt"].clone();
        fs::remove_file(fixture.object_path(&hash)).unwrap();

        assert!(matches!(
            fixture.repo.store().get(&hash),
            Err(StrataError::ObjectNotFound(_))
        ));

        let before = fixture.repo.log().count();
        assert!(fixture.repo.revert(&fixture.first.hash).is_err());
        assert_eq!(fixture.repo.log().count(), before);
    }

    #[test]
    fn test_tampered_commit_record_is_detected() {
        let fixture = DamagedRepo::new();
        let path = fixture.commit_path(&fixture.first.hash);
        let edited = fs::read_to_string(&path).unwrap().replace("first", "forged");
        fs::write(&path, edited).unwrap();

        assert_corrupt(fixture.repo.history().get(&fixture.first.hash));

        let results: Vec<Result<Commit>> = fixture.repo.log().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_corruption());
    }

    #[test]
    fn test_dangling_parent_ends_log_with_error() {
        let fixture = DamagedRepo::new();
        fs::remove_file(fixture.commit_path(&fixture.first.hash)).unwrap();

        let results: Vec<Result<Commit>> = fixture.repo.log().collect();
        assert_eq!(results[0].as_ref().unwrap().hash, fixture.second.hash);
        assert!(results[1].as_ref().unwrap_err().is_corruption());
    }

    #[test]
    fn test_malformed_head_is_detected() {
        let fixture = DamagedRepo::new();
        fs::write(fixture.state_path("HEAD"), "not a hash").unwrap();

        assert_corrupt(fixture.repo.head());
        assert_corrupt(fixture.repo.status());
    }

    #[test]
    fn test_head_pointing_at_missing_commit() {
        let fixture = DamagedRepo::new();
        fs::remove_file(fixture.commit_path(&fixture.second.hash)).unwrap();

        assert_corrupt(fixture.repo.head());
    }

    #[test]
    fn test_malformed_index_is_detected() {
        let fixture = DamagedRepo::new();
        fs::write(fixture.state_path("index.json"), "{ not json").unwrap();

        assert_corrupt(fixture.repo.status());
        assert_corrupt(fixture.repo.staged());
        assert_corrupt(fixture.repo.commit("x"));
    }

    #[test]
    fn test_index_with_bad_entry_is_detected() {
        let fixture = DamagedRepo::new();
        let index = serde_json::json!({
            "version": 1,
            "base": fixture.second.hash,
            "carried_to": null,
            "entries": [
                { "path": "../escape.txt", "hash": fixture.first.tree["a.txt"], "mode": 420, "removed": false }
            ]
        });
        fs::write(fixture.state_path("index.json"), index.to_string()).unwrap();

        assert_corrupt(fixture.repo.staged());
    }

    #[test]
    fn test_index_from_older_history_is_detected() {
        let fixture = DamagedRepo::new();
        let index = serde_json::json!({
            "version": 1,
            "base": null,
            "carried_to": null,
            "entries": []
        });
        fs::write(fixture.state_path("index.json"), index.to_string()).unwrap();

        assert_corrupt(fixture.repo.staged());
        assert_corrupt(fixture.repo.status());

        fs::remove_file(fixture.state_path("index.json")).unwrap();
        assert_corrupt(fixture.repo.staged());
    }

    #[test]
    fn test_damaged_config_blocks_open() {
        let fixture = DamagedRepo::new();
        fs::write(fixture.state_path("config.json"), "[]").unwrap();
        assert_corrupt(fixture.reopen());

        fs::remove_file(fixture.state_path("config.json")).unwrap();
        assert_corrupt(fixture.reopen());
    }

    #[test]
    fn test_newer_format_version_is_rejected() {
        let fixture = DamagedRepo::new();
        let path = fixture.state_path("config.json");
        let mut config: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        config["format_version"] = serde_json::json!(99);
        fs::write(&path, config.to_string()).unwrap();

        assert_corrupt(fixture.reopen());
    }

    #[test]
    fn test_held_lock_blocks_every_mutation() {
        let fixture = DamagedRepo::new();
        let _guard = RepoLock::acquire(fixture.repo.state_dir()).unwrap();

        let locked = |result: Result<()>| {
            assert!(matches!(result, Err(StrataError::ConcurrentModification(_))));
        };
        locked(fixture.repo.add(&["a.txt"]).map(drop));
        locked(fixture.repo.remove(&["a.txt"]).map(drop));
        locked(fixture.repo.unstage(&["a.txt"]).map(drop));
        locked(fixture.repo.commit("blocked").map(drop));
        locked(fixture.repo.restore(&["a.txt"]).map(drop));
        locked(fixture.repo.revert(&fixture.first.hash).map(drop));

        // Reads do not take the lock
        assert!(fixture.repo.status().is_ok());
        assert_eq!(fixture.repo.log().count(), 2);
    }

    #[test]
    fn test_lock_released_after_failed_operation() {
        let fixture = DamagedRepo::new();
        assert!(fixture.repo.commit("nothing staged").is_err());
        assert!(!RepoLock::is_locked(fixture.repo.state_dir()));
    }

    #[test]
    fn test_concurrent_commits_stay_linear() {
        let fixture = DamagedRepo::new();
        let root = fixture.temp_dir.path().to_path_buf();
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let root = root.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let repo = Repository::open(&root).unwrap();
                    let name = format!("worker{}.txt", i);
                    fs::write(root.join(&name), format!("worker {}", i)).unwrap();
                    barrier.wait();

                    let mut committed = 0;
                    for attempt in 0..50 {
                        let outcome = repo.add(&[name.as_str()]).and_then(|_| repo.commit(&name));
                        match outcome {
                            Ok(_) => {
                                committed += 1;
                                break;
                            }
                            Err(StrataError::ConcurrentModification(_))
                            | Err(StrataError::NothingToCommit) => {
                                info!("worker {} retrying (attempt {})", i, attempt);
                                thread::sleep(std::time::Duration::from_millis(5));
                            }
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                    committed
                })
            })
            .collect();

        let committed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(committed >= 1);

        // Whatever interleaving happened, the chain is intact and linear
        let log: Vec<Commit> = fixture.repo.log().map(|c| c.unwrap()).collect();
        for pair in log.windows(2) {
            assert_eq!(pair[0].parent.as_deref(), Some(pair[1].hash.as_str()));
        }
        assert!(log.last().unwrap().is_root());
        assert!(!RepoLock::is_locked(fixture.repo.state_dir()));
    }
}
