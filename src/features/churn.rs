// src/features/churn.rs

use super::CommitContext;
use crate::analyzer::TreeStats;
use crate::error::Result;

pub const COLUMNS: [&str; 4] = [
    "lines_of_code_added",
    "lines_of_code_deleted",
    "files_churned",
    "line_of_code_old",
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChurnFeatures {
    /// Inserted lines relative to the lines in the commit's tree
    pub lines_added: f64,
    /// Deleted lines relative to the lines in the commit's tree
    pub lines_deleted: f64,
    /// Touched files relative to the files in the commit's tree
    pub files_churned: f64,
    /// Largest predecessor version among the touched files, in lines
    pub line_of_code_old: f64,
}

impl ChurnFeatures {
    pub const GENESIS: ChurnFeatures = ChurnFeatures {
        lines_added: 0.0,
        lines_deleted: 0.0,
        files_churned: 1.0,
        line_of_code_old: 0.0,
    };

    pub fn to_values(&self) -> Vec<f64> {
        vec![self.lines_added, self.lines_deleted, self.files_churned, self.line_of_code_old]
    }
}

/// Raw counts for one commit, before normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChurnCounts {
    pub insertions: usize,
    pub deletions: usize,
    pub files_touched: usize,
    pub max_old_lines: usize,
}

impl ChurnCounts {
    pub fn relative_to(&self, tree: TreeStats) -> ChurnFeatures {
        ChurnFeatures {
            lines_added: relative(self.insertions, tree.lines),
            lines_deleted: relative(self.deletions, tree.lines),
            files_churned: relative(self.files_touched, tree.files),
            line_of_code_old: self.max_old_lines as f64,
        }
    }
}

/// `numerator / denominator`, or the raw numerator when the denominator is zero.
pub fn relative(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        numerator as f64
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn extract(ctx: &mut CommitContext) -> Result<ChurnFeatures> {
    let tree = ctx.scanner.scan_tree(ctx.commit.tree)?;

    let mut counts = ChurnCounts::default();
    for delta in ctx.diff.text_deltas() {
        counts.insertions += delta.insertions;
        counts.deletions += delta.deletions;
        counts.files_touched += 1;

        if let Some(old_lines) = delta.old_blob.and_then(|oid| ctx.scanner.text_lines(oid)) {
            counts.max_old_lines = counts.max_old_lines.max(old_lines);
        }
    }

    Ok(counts.relative_to(tree))
}
