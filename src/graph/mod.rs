// src/graph/mod.rs

//! Per-author and per-file cumulative state, built sequentially over the whole timeline.
//!
//! Every record is an append-only chain of per-commit entries. An entry for
//! commit `C` only ever points back at commits that precede `C` on the
//! timeline, so reading a record at `C` never sees later history.

mod builder;
mod store;

pub use builder::{build_graph, GraphUpdate};
pub use store::{GraphStore, Manifest, GRAPH_VERSION};

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Persisted, independently addressable chain of entries for one entity.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Subdirectory of the graph root holding this record kind
    const KIND: &'static str;

    fn new(key: &str) -> Self;
    fn key(&self) -> &str;

    /// Rebuild lookups after loading, dropping entries at or past timeline index
    /// `processed`. Returns how many entries were dropped.
    fn restore(&mut self, processed: usize) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorEntry {
    pub commit: String,
    /// Timeline index of `commit`
    pub seq: usize,
    /// The author's previous commit
    pub previous: Option<String>,
    pub timestamp: i64,
    /// Commits by this author up to and including this one
    pub exp: u64,
    /// Text files touched by this commit
    pub files: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub name: String,
    pub entries: Vec<AuthorEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl AuthorRecord {
    pub fn last(&self) -> Option<&AuthorEntry> {
        self.entries.last()
    }

    pub fn position(&self, commit: &str) -> Option<usize> {
        self.index.get(commit).copied()
    }

    pub fn entry(&self, commit: &str) -> Option<&AuthorEntry> {
        self.position(commit).map(|at| &self.entries[at])
    }

    pub fn append(&mut self, entry: AuthorEntry) -> Result<()> {
        if self.index.contains_key(&entry.commit) {
            return Err(Error::consistency(format!(
                "author `{}` already has an entry for commit {}",
                self.name, entry.commit
            )));
        }
        let last = self.last().map(|e| e.commit.as_str());
        if entry.previous.as_deref() != last {
            return Err(Error::consistency(format!(
                "entry for commit {} of author `{}` does not extend the chain ending at {:?}",
                entry.commit, self.name, last
            )));
        }
        self.index.insert(entry.commit.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }
}

impl Record for AuthorRecord {
    const KIND: &'static str = "authors";

    fn new(key: &str) -> Self {
        AuthorRecord { name: key.to_string(), ..Default::default() }
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn restore(&mut self, processed: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.seq < processed);
        self.index = self.entries.iter().enumerate().map(|(at, e)| (e.commit.clone(), at)).collect();
        before - self.entries.len()
    }
}

/// The most recent earlier commit that touched a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousTouch {
    pub commit: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub commit: String,
    /// Timeline index of `commit`
    pub seq: usize,
    pub timestamp: i64,
    pub previous: Option<PreviousTouch>,
    /// Every author who touched the file up to and including this commit
    pub authors: BTreeSet<String>,
    /// Path the file had before a rename in this commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub entries: Vec<FileEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FileRecord {
    pub fn last(&self) -> Option<&FileEntry> {
        self.entries.last()
    }

    pub fn entry(&self, commit: &str) -> Option<&FileEntry> {
        self.index.get(commit).map(|&at| &self.entries[at])
    }

    pub fn append(&mut self, entry: FileEntry) -> Result<()> {
        if self.index.contains_key(&entry.commit) {
            return Err(Error::consistency(format!(
                "file `{}` already has an entry for commit {}",
                self.path, entry.commit
            )));
        }
        if let Some(last) = self.last() {
            if !last.authors.is_subset(&entry.authors) {
                return Err(Error::consistency(format!(
                    "entry for commit {} of file `{}` drops authors recorded at {}",
                    entry.commit, self.path, last.commit
                )));
            }
            // A rename continues the old path's chain instead of this one
            let previous = entry.previous.as_ref().map(|p| p.commit.as_str());
            if entry.renamed_from.is_none() && previous != Some(last.commit.as_str()) {
                return Err(Error::consistency(format!(
                    "entry for commit {} of file `{}` does not extend the chain ending at {}",
                    entry.commit, self.path, last.commit
                )));
            }
        }
        self.index.insert(entry.commit.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }
}

impl Record for FileRecord {
    const KIND: &'static str = "files";

    fn new(key: &str) -> Self {
        FileRecord { path: key.to_string(), ..Default::default() }
    }

    fn key(&self) -> &str {
        &self.path
    }

    fn restore(&mut self, processed: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.seq < processed);
        self.index = self.entries.iter().enumerate().map(|(at, e)| (e.commit.clone(), at)).collect();
        before - self.entries.len()
    }
}
