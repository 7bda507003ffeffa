// src/cli.rs

use clap::{Args as ClapArgs, Parser, Subcommand};
use commit_features::{ExtractConfig, FeatureKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute one feature row per commit and write the table as CSV
    Extract {
        #[command(flatten)]
        source: Source,

        /// Number of parallel workers (defaults to the number of CPUs)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Feature families to compute, in column order
        #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = FeatureKind::ALL)]
        features: Vec<FeatureKind>,

        /// Discard the stored history graph and build it from scratch
        #[arg(long)]
        rebuild_graph: bool,

        /// CSV file to write; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build or extend the persisted history graph only
    Graph {
        #[command(flatten)]
        source: Source,

        /// Discard the stored history graph and build it from scratch
        #[arg(long)]
        rebuild: bool,
    },
}

#[derive(ClapArgs, Debug)]
pub struct Source {
    /// Path to the git repository to analyze
    #[arg(short, long)]
    pub repo: PathBuf,

    /// Branch or revision whose first-parent history is analyzed
    #[arg(short, long, default_value = "HEAD")]
    pub branch: String,

    /// Directory holding the persisted history graph
    #[arg(short, long)]
    pub graph_dir: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

impl Source {
    pub fn config(&self) -> ExtractConfig {
        ExtractConfig::new(&self.repo)
            .with_branch(self.branch.clone())
            .with_graph_dir(self.graph_dir.clone())
            .with_progress(!self.quiet)
    }
}
