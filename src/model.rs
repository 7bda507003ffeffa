// src/model.rs

use git2::Oid;
use std::fmt::Write;

/// Commit metadata needed by the extractors, detached from any repository handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: Oid,
    pub author: String,
    /// Seconds since the epoch
    pub timestamp: i64,
    pub message: String,
    pub tree: Oid,
}

impl CommitInfo {
    pub fn from_commit(commit: &git2::Commit) -> Self {
        CommitInfo {
            id: commit.id(),
            author: commit.author().name().unwrap_or("Unknown").to_string(),
            timestamp: commit.time().seconds(),
            message: commit.message().unwrap_or("").to_string(),
            tree: commit.tree_id(),
        }
    }

    pub fn hash(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// One path's change between two tree snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDelta {
    pub status: DeltaStatus,
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    /// Blob id in the predecessor tree, absent for added files
    pub old_blob: Option<Oid>,
    pub new_blob: Option<Oid>,
    pub insertions: usize,
    pub deletions: usize,
    pub binary: bool,
    /// The patch could not be produced because a blob is missing or corrupt
    pub unreadable: bool,
}

impl FileDelta {
    /// The path this change is attributed to: the old path for deletions, the new path otherwise.
    pub fn path(&self) -> &str {
        let path = match self.status {
            DeltaStatus::Deleted => self.old_path.as_deref().or(self.new_path.as_deref()),
            _ => self.new_path.as_deref().or(self.old_path.as_deref()),
        };
        path.unwrap_or("")
    }

    pub fn changed_lines(&self) -> usize {
        self.insertions + self.deletions
    }
}

/// All deltas between a commit and its chronological predecessor
#[derive(Debug, Clone, Default)]
pub struct CommitDiff {
    pub deltas: Vec<FileDelta>,
}

impl CommitDiff {
    /// Deltas that count towards features: readable and not binary.
    pub fn text_deltas(&self) -> impl Iterator<Item = &FileDelta> {
        self.deltas.iter().filter(|d| !d.binary && !d.unreadable)
    }

    /// Blob ids of deltas whose patch could not be read.
    pub fn unreadable_blobs(&self) -> impl Iterator<Item = Oid> + '_ {
        self.deltas
            .iter()
            .filter(|d| d.unreadable)
            .flat_map(|d| d.old_blob.into_iter().chain(d.new_blob))
    }
}

/// Text form of a repository path that is unique per byte string.
///
/// Valid UTF-8 is kept as is except for `\`, which is doubled; every byte
/// that is not part of valid UTF-8 becomes `\xNN`.
pub fn path_key(bytes: &[u8]) -> String {
    let mut key = String::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        let (valid, invalid) = match std::str::from_utf8(rest) {
            Ok(valid) => (valid, 0),
            Err(err) => {
                let valid = std::str::from_utf8(&rest[..err.valid_up_to()]).unwrap_or_default();
                (valid, err.error_len().unwrap_or(rest.len() - err.valid_up_to()))
            }
        };
        for c in valid.chars() {
            if c == '\\' {
                key.push_str("\\\\");
            } else {
                key.push(c);
            }
        }
        let end = valid.len() + invalid;
        for byte in &rest[valid.len()..end] {
            let _ = write!(key, "\\x{byte:02x}");
        }
        rest = &rest[end..];
    }
    key
}

/// One fixed-width feature tuple, tagged with its absolute timeline index
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub index: usize,
    pub commit: Oid,
    pub values: Vec<f64>,
}

/// Rows in timeline order plus the column names for `values`
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub columns: Vec<&'static str>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let at = self.columns.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|r| r.values[at]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let at = self.columns.iter().position(|c| *c == name)?;
        self.rows.get(row).map(|r| r.values[at])
    }
}
