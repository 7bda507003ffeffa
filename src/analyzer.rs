// src/analyzer.rs

use crate::error::{Error, Result};
use crate::model::{path_key, CommitDiff, CommitInfo, DeltaStatus, FileDelta};
use git2::{Delta, Diff, DiffFindOptions, DiffOptions, FileMode, ObjectType, Oid, Patch, Repository, Tree};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Diff `commit` against its chronological predecessor (the empty tree for the first commit).
///
/// A delta whose patch cannot be produced is kept but marked unreadable, so one
/// missing blob only drops that file from the commit's measures.
pub fn diff_commits(repo: &Repository, parent: Option<&CommitInfo>, commit: &CommitInfo) -> Result<CommitDiff> {
    let parent_tree = match parent {
        Some(p) => Some(repo.find_tree(p.tree)?),
        None => None,
    };
    let current_tree = repo.find_tree(commit.tree)?;

    let mut diff = tree_diff(repo, parent_tree.as_ref(), &current_tree)?;
    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    if let Err(err) = diff.find_similar(Some(&mut find_opts)) {
        warn!(commit = %commit.id, %err, "rename detection failed; diffing without it");
        diff = tree_diff(repo, parent_tree.as_ref(), &current_tree)?;
    }

    let mut deltas = Vec::with_capacity(diff.deltas().len());
    for (idx, delta) in diff.deltas().enumerate() {
        let status = match delta.status() {
            Delta::Added | Delta::Copied => DeltaStatus::Added,
            Delta::Deleted => DeltaStatus::Deleted,
            Delta::Renamed => DeltaStatus::Renamed,
            Delta::Modified | Delta::Typechange => DeltaStatus::Modified,
            _ => continue,
        };
        // Gitlinks point at commits in other repositories
        if delta.old_file().mode() == FileMode::Commit || delta.new_file().mode() == FileMode::Commit {
            continue;
        }

        let old_file = delta.old_file();
        let new_file = delta.new_file();
        let mut file = FileDelta {
            status,
            old_path: old_file.path_bytes().map(path_key),
            new_path: new_file.path_bytes().map(path_key),
            old_blob: Some(old_file.id()).filter(|id| !id.is_zero()),
            new_blob: Some(new_file.id()).filter(|id| !id.is_zero()),
            insertions: 0,
            deletions: 0,
            binary: delta.flags().is_binary(),
            unreadable: false,
        };

        match line_stats(&diff, idx) {
            Ok(Some((insertions, deletions, binary))) => {
                file.insertions = insertions;
                file.deletions = deletions;
                file.binary = binary;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(commit = %commit.id, path = file.path(), %err, "skipping unreadable file change");
                file.unreadable = true;
            }
        }
        deltas.push(file);
    }

    Ok(CommitDiff { deltas })
}

fn tree_diff<'r>(repo: &'r Repository, old: Option<&Tree>, new: &Tree) -> Result<Diff<'r>> {
    let mut diff_opts = DiffOptions::new();
    diff_opts.ignore_filemode(true);
    diff_opts.ignore_submodules(true);
    Ok(repo.diff_tree_to_tree(old, Some(new), Some(&mut diff_opts))?)
}

/// `(insertions, deletions, binary)` of one delta, or `None` when it has no patch.
fn line_stats(diff: &Diff, idx: usize) -> Result<Option<(usize, usize, bool)>> {
    let Some(patch) = Patch::from_diff(diff, idx)? else {
        return Ok(None);
    };
    let binary = patch.delta().flags().is_binary();
    let (_, insertions, deletions) = patch.line_stats()?;
    Ok(Some((insertions, deletions, binary)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobLines {
    Text(usize),
    Binary,
    /// Missing or corrupt; contributes nothing
    Unreadable,
}

/// Text-file count and total line count of one tree snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub files: usize,
    pub lines: usize,
}

/// Reads blobs and trees for one repository handle, memoizing line counts by blob id.
///
/// Binary blobs are skipped. Blobs that cannot be read are skipped too, but are
/// logged and counted once each, so the caller can tell them apart from empty content.
pub struct TreeScanner<'r> {
    repo: &'r Repository,
    lines: HashMap<Oid, BlobLines>,
    unreadable: HashSet<Oid>,
}

impl<'r> TreeScanner<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        TreeScanner { repo, lines: HashMap::new(), unreadable: HashSet::new() }
    }

    pub fn blob_lines(&mut self, oid: Oid) -> BlobLines {
        if let Some(&cached) = self.lines.get(&oid) {
            return cached;
        }
        let counted = match self.repo.find_blob(oid) {
            Ok(blob) if blob.is_binary() => BlobLines::Binary,
            Ok(blob) => BlobLines::Text(count_lines(blob.content())),
            Err(source) => {
                let err = Error::BlobRead { oid, source };
                warn!(%err, "skipping unreadable blob");
                self.unreadable.insert(oid);
                BlobLines::Unreadable
            }
        };
        self.lines.insert(oid, counted);
        counted
    }

    /// Line count of a text blob; `None` for binary or unreadable blobs.
    pub fn text_lines(&mut self, oid: Oid) -> Option<usize> {
        match self.blob_lines(oid) {
            BlobLines::Text(n) => Some(n),
            BlobLines::Binary | BlobLines::Unreadable => None,
        }
    }

    /// Count text files and their lines across a whole tree snapshot.
    ///
    /// Iterative walk; a subtree id reachable through several paths is visited once.
    pub fn scan_tree(&mut self, root: Oid) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let mut visited = HashSet::from([root]);
        let mut pending = vec![root];

        while let Some(tree_id) = pending.pop() {
            let tree = self.repo.find_tree(tree_id)?;
            for entry in tree.iter() {
                match entry.kind() {
                    Some(ObjectType::Tree) => {
                        if visited.insert(entry.id()) {
                            pending.push(entry.id());
                        }
                    }
                    Some(ObjectType::Blob) => {
                        if let Some(n) = self.text_lines(entry.id()) {
                            stats.files += 1;
                            stats.lines += n;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(stats)
    }

    /// Distinct blobs that could not be read so far.
    pub fn unreadable(&self) -> usize {
        self.unreadable.len()
    }

    pub fn into_unreadable(self) -> HashSet<Oid> {
        self.unreadable
    }
}

fn count_lines(content: &[u8]) -> usize {
    let newlines = content.iter().filter(|&&b| b == b'\n').count();
    match content.last() {
        Some(b'\n') | None => newlines,
        Some(_) => newlines + 1,
    }
}
