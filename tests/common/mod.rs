//! Helpers for building throw-away repositories with exact authors and timestamps.
//!
//! Each integration test file compiles as its own crate, so not every helper
//! is used everywhere.

#![allow(dead_code)]

use git2::{Commit, Oid, Repository, Signature, Time};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DAY: i64 = 24 * 60 * 60;

/// 2020-01-01T00:00:00Z
pub const EPOCH: i64 = 1_577_836_800;

pub enum Change<'a> {
    Write(&'a str, &'a [u8]),
    /// Path given as raw bytes, which need not be UTF-8
    WriteRaw(&'a [u8], &'a [u8]),
    Remove(&'a str),
    Rename(&'a str, &'a str),
}

pub struct TestRepo {
    dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init repository");
        TestRepo { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Apply `changes` to the work tree and commit them on HEAD.
    pub fn commit(&self, author: &str, when: i64, message: &str, changes: &[Change]) -> Oid {
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        self.commit_with_parents(Some("HEAD"), author, when, message, changes, &parents)
    }

    /// Commit without touching HEAD, on top of `parent`.
    pub fn side_commit(&self, parent: Oid, author: &str, when: i64, message: &str) -> Oid {
        let parent = self.repo.find_commit(parent).unwrap();
        let tree = parent.tree().unwrap();
        let sig = signature(author, when);
        self.repo.commit(None, &sig, &sig, message, &tree, &[&parent]).unwrap()
    }

    /// Merge commit on HEAD whose second parent is `other`.
    pub fn merge(&self, other: Oid, author: &str, when: i64) -> Oid {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        let other = self.repo.find_commit(other).unwrap();
        self.commit_with_parents(Some("HEAD"), author, when, "merge", &[], &[&head, &other])
    }

    /// Delete a loose object from the object database, as a damaged clone would lack it.
    pub fn remove_object(&self, oid: Oid) {
        let hex = oid.to_string();
        let path = self.repo.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        fs::remove_file(path).expect("object is stored loose");
    }

    fn commit_with_parents(
        &self,
        update_ref: Option<&str>,
        author: &str,
        when: i64,
        message: &str,
        changes: &[Change],
        parents: &[&Commit],
    ) -> Oid {
        let mut index = self.repo.index().unwrap();
        for change in changes {
            match *change {
                Change::Write(path, content) => {
                    let full = self.path().join(path);
                    fs::create_dir_all(full.parent().unwrap()).unwrap();
                    fs::write(&full, content).unwrap();
                    index.add_path(Path::new(path)).unwrap();
                }
                Change::WriteRaw(path, content) => {
                    let path = raw_path(path);
                    let full = self.path().join(&path);
                    fs::create_dir_all(full.parent().unwrap()).unwrap();
                    fs::write(&full, content).unwrap();
                    index.add_path(&path).unwrap();
                }
                Change::Remove(path) => {
                    fs::remove_file(self.path().join(path)).unwrap();
                    index.remove_path(Path::new(path)).unwrap();
                }
                Change::Rename(from, to) => {
                    let target = self.path().join(to);
                    fs::create_dir_all(target.parent().unwrap()).unwrap();
                    fs::rename(self.path().join(from), &target).unwrap();
                    index.remove_path(Path::new(from)).unwrap();
                    index.add_path(Path::new(to)).unwrap();
                }
            }
        }
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = signature(author, when);
        self.repo.commit(update_ref, &sig, &sig, message, &tree, parents).unwrap()
    }
}

#[cfg(unix)]
fn raw_path(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn raw_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8(bytes.to_vec()).expect("non-UTF-8 paths need a unix file system"))
}

fn signature(author: &str, when: i64) -> Signature<'static> {
    Signature::new(author, &format!("{}@example.com", author.to_lowercase()), &Time::new(when, 0)).unwrap()
}

/// `n` distinct text lines.
pub fn lines(prefix: &str, n: usize) -> Vec<u8> {
    (0..n).map(|i| format!("{prefix} line {i}\n")).collect::<String>().into_bytes()
}

pub struct Scenario {
    pub repo: TestRepo,
    pub commits: Vec<Oid>,
}

/// Five linear commits:
/// 1. alice adds `src/core/engine.rs`
/// 2. bob extends it
/// 3. carol renames it to `src/engine/core.rs`
/// 4. alice adds a binary asset only
/// 5. bob fixes the renamed file and adds `docs/guide.md`
pub fn rename_and_binary_history() -> Scenario {
    let repo = TestRepo::new();
    let v1 = lines("engine", 4);
    let mut v2 = v1.clone();
    v2.extend(lines("extra", 2));
    let mut v3 = v2.clone();
    v3.extend(lines("fix", 1));
    let logo: &[u8] = &[0x89, b'P', b'N', b'G', 0, 0, 0, 13, 0, 1, 2, 3, 0, 0];
    let guide = lines("guide", 3);

    let commits = vec![
        repo.commit("alice", EPOCH, "initial engine", &[Change::Write("src/core/engine.rs", &v1)]),
        repo.commit("bob", EPOCH + DAY, "extend engine", &[Change::Write("src/core/engine.rs", &v2)]),
        repo.commit(
            "carol",
            EPOCH + 3 * DAY,
            "move engine",
            &[Change::Rename("src/core/engine.rs", "src/engine/core.rs")],
        ),
        repo.commit("alice", EPOCH + 4 * DAY, "add logo", &[Change::Write("assets/logo.bin", logo)]),
        repo.commit(
            "bob",
            EPOCH + 400 * DAY,
            "fix engine crash",
            &[Change::Write("src/engine/core.rs", &v3), Change::Write("docs/guide.md", &guide)],
        ),
    ];
    Scenario { repo, commits }
}
