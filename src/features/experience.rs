// src/features/experience.rs

use crate::error::{Error, Result};
use crate::graph::{AuthorEntry, GraphStore};
use crate::model::CommitInfo;
use chrono::Duration;

pub const COLUMNS: [&str; 2] = ["experience", "rexp"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExperienceFeatures {
    /// Commits by this author so far, this one included
    pub experience: f64,
    /// Files touched by the author, each commit weighted by `1 / (age in years + 1)`
    pub rexp: f64,
}

impl ExperienceFeatures {
    pub const GENESIS: ExperienceFeatures = ExperienceFeatures { experience: 1.0, rexp: 0.0 };

    pub fn to_values(&self) -> Vec<f64> {
        vec![self.experience, self.rexp]
    }
}

pub fn extract(commit: &CommitInfo, graph: &GraphStore) -> Result<ExperienceFeatures> {
    let hash = commit.hash();
    let missing = || {
        Error::consistency(format!(
            "history graph has no experience entry for author `{}` at commit {}",
            commit.author, hash
        ))
    };
    let record = graph.author(&commit.author)?.ok_or_else(missing)?;
    let at = record.position(&hash).ok_or_else(missing)?;

    Ok(ExperienceFeatures {
        experience: record.entries[at].exp as f64,
        rexp: recency_weighted(&record.entries[..=at]),
    })
}

/// Σ files / (years + 1) over `history`, with ages measured from its last entry.
pub fn recency_weighted(history: &[AuthorEntry]) -> f64 {
    let Some(now) = history.last() else {
        return 0.0;
    };
    history
        .iter()
        .map(|past| past.files as f64 / (whole_years_between(past.timestamp, now.timestamp) + 1) as f64)
        .sum()
}

/// Elapsed whole years (365-day) between two timestamps, in either order.
pub fn whole_years_between(earlier: i64, later: i64) -> u64 {
    let days = Duration::seconds(later - earlier).num_days().unsigned_abs();
    days / 365
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 60 * 60;

    fn entry(timestamp: i64, files: u64) -> AuthorEntry {
        AuthorEntry { commit: String::new(), seq: 0, previous: None, timestamp, exp: 0, files }
    }

    #[test]
    fn years_are_floored() {
        assert_eq!(whole_years_between(0, 364 * DAY), 0);
        assert_eq!(whole_years_between(0, 365 * DAY), 1);
        assert_eq!(whole_years_between(0, 800 * DAY), 2);
        assert_eq!(whole_years_between(800 * DAY, 0), 2);
    }

    #[test]
    fn older_work_counts_less() {
        let history = [entry(0, 6), entry(400 * DAY, 3), entry(800 * DAY, 2)];
        // 6 / 3 + 3 / 2 + 2 / 1
        assert!((recency_weighted(&history) - 5.5).abs() < 1e-12);
        assert_eq!(recency_weighted(&[]), 0.0);
    }
}
