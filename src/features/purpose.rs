// src/features/purpose.rs

use crate::model::CommitInfo;

pub const COLUMNS: [&str; 1] = ["purpose"];

const FIX_PATTERNS: [&str; 4] = ["bug", "fix", "defect", "patch"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PurposeFeatures {
    /// 1.0 when the message reads like a fix
    pub purpose: f64,
}

impl PurposeFeatures {
    pub fn to_values(&self) -> Vec<f64> {
        vec![self.purpose]
    }
}

pub fn is_fix(message: &str) -> bool {
    FIX_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

pub fn extract(commit: &CommitInfo) -> PurposeFeatures {
    PurposeFeatures { purpose: if is_fix(&commit.message) { 1.0 } else { 0.0 } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_fix_vocabulary_anywhere() {
        assert!(is_fix("fix off-by-one in parser"));
        assert!(is_fix("hotfixes for release"));
        assert!(is_fix("apply upstream patch"));
        assert!(is_fix("track defect 42"));
        assert!(!is_fix("Add streaming support"));
        // Case-sensitive, like the pattern list
        assert!(!is_fix("Bug in FIX"));
    }
}
