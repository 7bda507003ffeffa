// src/features/history.rs

use crate::error::{Error, Result};
use crate::graph::GraphStore;
use crate::model::{CommitDiff, CommitInfo};
use std::collections::HashSet;

pub const COLUMNS: [&str; 3] = ["number_of_authors", "age", "number_unique_changes"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoryFeatures {
    /// Distinct authors across the histories of every touched file
    pub number_of_authors: f64,
    /// Mean seconds since each touched file was last changed
    pub age: f64,
    /// Distinct previous commits among the touched files
    pub number_unique_changes: f64,
}

impl HistoryFeatures {
    pub const GENESIS: HistoryFeatures = HistoryFeatures { number_of_authors: 1.0, age: 0.0, number_unique_changes: 0.0 };

    pub fn to_values(&self) -> Vec<f64> {
        vec![self.number_of_authors, self.age, self.number_unique_changes]
    }
}

pub fn extract(commit: &CommitInfo, diff: &CommitDiff, graph: &GraphStore) -> Result<HistoryFeatures> {
    let hash = commit.hash();
    let mut authors = HashSet::new();
    let mut ages = Vec::new();
    let mut previous_commits = HashSet::new();

    for delta in diff.text_deltas() {
        let path = delta.path();
        let record = graph.file(path)?;
        let entry = record.as_ref().and_then(|r| r.entry(&hash)).ok_or_else(|| {
            Error::consistency(format!("history graph has no entry for file `{path}` at commit {hash}"))
        })?;

        authors.extend(entry.authors.iter().cloned());
        if let Some(previous) = &entry.previous {
            previous_commits.insert(previous.commit.clone());
            ages.push((commit.timestamp - previous.timestamp) as f64);
        }
    }

    let age = if ages.is_empty() { 0.0 } else { ages.iter().sum::<f64>() / ages.len() as f64 };
    Ok(HistoryFeatures {
        number_of_authors: authors.len() as f64,
        age,
        number_unique_changes: previous_commits.len() as f64,
    })
}
