// src/main.rs

mod cli;

use clap::Parser;
use cli::{Args, Command};
use commit_features::{table, Extractor, Result};
use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let start_time = Instant::now();

    match run(args) {
        Ok(()) => {
            eprintln!("Total time: {:.2?}", start_time.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Extract { source, workers, features, rebuild_graph, output } => {
            let mut config = source.config().with_families(features).with_rebuild_graph(rebuild_graph);
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }

            let report = Extractor::new(config)?.run()?;
            eprintln!(
                "Extracted {} rows x {} features in {:.2?}.",
                report.table.len(),
                report.table.columns.len(),
                report.elapsed
            );
            if report.unreadable_blobs > 0 {
                eprintln!("Skipped {} unreadable blobs.", report.unreadable_blobs);
            }

            match output {
                Some(path) => table::write_csv(&report.table, BufWriter::new(File::create(path)?))?,
                None => table::write_csv(&report.table, io::stdout().lock())?,
            }
        }
        Command::Graph { source, rebuild } => {
            let config = source.config().with_rebuild_graph(rebuild);
            let update = Extractor::new(config)?.update_graph()?;
            eprintln!(
                "History graph covers {} commits ({} new).",
                update.processed, update.appended
            );
        }
    }
    Ok(())
}
