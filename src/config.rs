// src/config.rs

use crate::error::{Error, Result};
use crate::features::FeatureKind;
use std::path::{Path, PathBuf};

/// Settings for one extraction run
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Repository path
    pub repo: PathBuf,

    /// Branch, tag or any revspec naming the head commit
    pub branch: String,

    /// Number of parallel workers
    pub workers: usize,

    /// Feature families, in output column order
    pub families: Vec<FeatureKind>,

    /// Where the history graph is persisted; in memory when absent
    pub graph_dir: Option<PathBuf>,

    /// Discard the stored graph and build it again from the first commit
    pub rebuild_graph: bool,

    /// Draw progress bars
    pub progress: bool,
}

impl ExtractConfig {
    pub fn new(repo: impl AsRef<Path>) -> Self {
        ExtractConfig {
            repo: repo.as_ref().to_path_buf(),
            branch: "HEAD".to_string(),
            workers: num_cpus::get(),
            families: FeatureKind::ALL.to_vec(),
            graph_dir: None,
            rebuild_graph: false,
            progress: true,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_families(mut self, families: Vec<FeatureKind>) -> Self {
        self.families = families;
        self
    }

    pub fn with_graph_dir(mut self, graph_dir: Option<PathBuf>) -> Self {
        self.graph_dir = graph_dir;
        self
    }

    pub fn with_rebuild_graph(mut self, rebuild: bool) -> Self {
        self.rebuild_graph = rebuild;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn needs_graph(&self) -> bool {
        self.families.iter().any(|f| f.needs_graph())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Configuration("at least one worker is required".into()));
        }
        if self.families.is_empty() {
            return Err(Error::Configuration("no feature families selected".into()));
        }
        for (i, family) in self.families.iter().enumerate() {
            if self.families[..i].contains(family) {
                return Err(Error::Configuration(format!("feature family {family:?} selected twice")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_family() {
        let config = ExtractConfig::new("/repo");
        assert_eq!(config.branch, "HEAD");
        assert!(config.workers >= 1);
        assert_eq!(config.families, FeatureKind::ALL.to_vec());
        assert!(config.needs_graph());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unusable_settings() {
        let zero = ExtractConfig::new("/repo").with_workers(0);
        assert!(matches!(zero.validate(), Err(Error::Configuration(_))));

        let none = ExtractConfig::new("/repo").with_families(vec![]);
        assert!(matches!(none.validate(), Err(Error::Configuration(_))));

        let twice = ExtractConfig::new("/repo").with_families(vec![FeatureKind::Churn, FeatureKind::Churn]);
        assert!(matches!(twice.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn diff_only_families_skip_the_graph() {
        let config = ExtractConfig::new("/repo")
            .with_branch("refs/heads/main")
            .with_families(vec![FeatureKind::Churn, FeatureKind::Diffusion]);
        assert!(!config.needs_graph());
        assert_eq!(config.branch, "refs/heads/main");
    }
}
