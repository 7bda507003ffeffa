// src/features/diffusion.rs

use crate::model::CommitDiff;
use std::collections::HashSet;

pub const COLUMNS: [&str; 3] = ["modified_subsystems", "modified_modules", "entropy"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiffusionFeatures {
    /// Distinct directory nodes, at any depth, containing a changed file
    pub subsystems: f64,
    /// Distinct top-level directories containing a changed file
    pub modules: f64,
    /// Shannon entropy (bits) of the per-file changed-line distribution
    pub entropy: f64,
}

impl DiffusionFeatures {
    pub fn to_values(&self) -> Vec<f64> {
        vec![self.subsystems, self.modules, self.entropy]
    }
}

pub fn extract(diff: &CommitDiff) -> DiffusionFeatures {
    let mut subsystems = HashSet::new();
    let mut modules = HashSet::new();
    let mut changes = Vec::new();

    for delta in diff.text_deltas() {
        let path = delta.path();
        changes.push(delta.changed_lines());

        subsystems.extend(directory_prefixes(path));
        if let Some((top, _)) = path.split_once('/') {
            modules.insert(top);
        }
    }

    DiffusionFeatures {
        subsystems: subsystems.len() as f64,
        modules: modules.len() as f64,
        entropy: entropy(&changes),
    }
}

/// `a/b/c.rs` yields `a` and `a/b`.
fn directory_prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(at, _)| &path[..at])
}

/// Base-2 Shannon entropy of `changes` as a distribution, with `0 * log2(0) = 0`.
pub fn entropy(changes: &[usize]) -> f64 {
    let total: usize = changes.iter().sum();
    if total == 0 {
        return 0.0;
    }
    changes
        .iter()
        .filter(|&&x| x > 0)
        .map(|&x| {
            let p = x as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}
