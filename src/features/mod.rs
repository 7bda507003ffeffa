// src/features/mod.rs

//! Per-commit feature families.
//!
//! Each family maps `(commit, predecessor, repository state, graph)` to a
//! fixed-width tuple. Churn, diffusion and purpose only look at the commit
//! and its diff; experience and history read the prebuilt history graph.

pub mod churn;
pub mod diffusion;
pub mod experience;
pub mod history;
pub mod purpose;

use crate::analyzer::TreeScanner;
use crate::error::{Error, Result};
use crate::graph::GraphStore;
use crate::model::{CommitDiff, CommitInfo};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Relative inserted/deleted lines and touched files
    Churn,
    /// Spread of the change over directories, plus change entropy
    Diffusion,
    /// Author commit count and recency-weighted experience
    Experience,
    /// Authors, age and converging change chains of touched files
    History,
    /// Whether the message describes a fix
    Purpose,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 5] = [
        FeatureKind::Churn,
        FeatureKind::Diffusion,
        FeatureKind::Experience,
        FeatureKind::History,
        FeatureKind::Purpose,
    ];

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            FeatureKind::Churn => &churn::COLUMNS,
            FeatureKind::Diffusion => &diffusion::COLUMNS,
            FeatureKind::Experience => &experience::COLUMNS,
            FeatureKind::History => &history::COLUMNS,
            FeatureKind::Purpose => &purpose::COLUMNS,
        }
    }

    pub fn needs_graph(self) -> bool {
        matches!(self, FeatureKind::Experience | FeatureKind::History)
    }

    /// Values for the first commit of the timeline, which has no predecessor.
    pub fn genesis(self, commit: &CommitInfo) -> Vec<f64> {
        match self {
            FeatureKind::Churn => churn::ChurnFeatures::GENESIS.to_values(),
            FeatureKind::Diffusion => diffusion::DiffusionFeatures::default().to_values(),
            FeatureKind::Experience => experience::ExperienceFeatures::GENESIS.to_values(),
            FeatureKind::History => history::HistoryFeatures::GENESIS.to_values(),
            FeatureKind::Purpose => purpose::extract(commit).to_values(),
        }
    }
}

/// Everything an extractor may look at for one commit
pub struct CommitContext<'a, 'r> {
    pub commit: &'a CommitInfo,
    pub diff: &'a CommitDiff,
    pub graph: Option<&'a GraphStore>,
    pub scanner: &'a mut TreeScanner<'r>,
}

impl CommitContext<'_, '_> {
    fn graph(&self) -> Result<&GraphStore> {
        self.graph
            .ok_or_else(|| Error::Configuration("experience and history features need a history graph".into()))
    }
}

pub fn columns(kinds: &[FeatureKind]) -> Vec<&'static str> {
    kinds.iter().flat_map(|k| k.columns().iter().copied()).collect()
}

pub fn genesis_values(kinds: &[FeatureKind], commit: &CommitInfo) -> Vec<f64> {
    kinds.iter().flat_map(|k| k.genesis(commit)).collect()
}

pub fn extract(kind: FeatureKind, ctx: &mut CommitContext) -> Result<Vec<f64>> {
    let values = match kind {
        FeatureKind::Churn => churn::extract(ctx)?.to_values(),
        FeatureKind::Diffusion => diffusion::extract(ctx.diff).to_values(),
        FeatureKind::Experience => experience::extract(ctx.commit, ctx.graph()?)?.to_values(),
        FeatureKind::History => history::extract(ctx.commit, ctx.diff, ctx.graph()?)?.to_values(),
        FeatureKind::Purpose => purpose::extract(ctx.commit).to_values(),
    };
    Ok(values)
}

/// Concatenated values of every enabled family, in `kinds` order.
pub fn extract_row(kinds: &[FeatureKind], ctx: &mut CommitContext) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(columns(kinds).len());
    for &kind in kinds {
        values.extend(extract(kind, ctx)?);
    }
    Ok(values)
}
