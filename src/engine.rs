// src/engine.rs

use crate::aggregate::{self, ResultSlots, WorkerOutput};
use crate::analyzer::{diff_commits, TreeScanner};
use crate::config::ExtractConfig;
use crate::error::{Error, Result};
use crate::features::{self, CommitContext, FeatureKind};
use crate::graph::{build_graph, GraphStore, GraphUpdate};
use crate::model::{FeatureRow, FeatureTable};
use crate::partition::partition;
use crate::timeline::CommitTimeline;
use git2::Repository;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of a complete, index-verified extraction
#[derive(Debug)]
pub struct ExtractionReport {
    pub table: FeatureTable,
    /// Distinct blobs skipped because they could not be read (not binary, not empty)
    pub unreadable_blobs: usize,
    pub graph: Option<GraphUpdate>,
    pub elapsed: Duration,
}

/// Fork-join feature extraction over a commit timeline.
///
/// The timeline is split into one contiguous range per worker. Each worker
/// opens its own repository handle, computes a row per commit and publishes
/// its rows once, into its own slot. Rows are put back in timeline order by
/// the index each one carries.
pub struct Extractor {
    config: ExtractConfig,
    cancel: Arc<AtomicBool>,
    /// Commit index at which a worker panics
    #[cfg(test)]
    fault_at: Option<usize>,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Result<Self> {
        config.validate()?;
        Ok(Extractor {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            #[cfg(test)]
            fault_at: None,
        })
    }

    /// Setting the flag stops every worker at its next commit boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Load the timeline, bring the history graph up to date when needed, and extract.
    pub fn run(&self) -> Result<ExtractionReport> {
        let start = Instant::now();
        let repo = Repository::open(&self.config.repo)?;
        let timeline = CommitTimeline::load(&repo, &self.config.branch)?;
        info!(
            repo = %self.config.repo.display(),
            commits = timeline.len(),
            workers = self.config.workers,
            "extracting commit features"
        );

        let (graph, update) = if self.config.needs_graph() {
            let (store, update) = self.prepare_graph(&repo, &timeline)?;
            (Some(store), Some(update))
        } else {
            (None, None)
        };

        let mut report = self.extract(&timeline, graph.as_ref())?;
        report.graph = update;
        report.elapsed = start.elapsed();
        info!(rows = report.table.len(), elapsed = ?report.elapsed, "extraction finished");
        Ok(report)
    }

    /// Only build or extend the persisted history graph.
    pub fn update_graph(&self) -> Result<GraphUpdate> {
        let repo = Repository::open(&self.config.repo)?;
        let timeline = CommitTimeline::load(&repo, &self.config.branch)?;
        self.prepare_graph(&repo, &timeline).map(|(_, update)| update)
    }

    fn prepare_graph(&self, repo: &Repository, timeline: &CommitTimeline) -> Result<(GraphStore, GraphUpdate)> {
        let mut store = match &self.config.graph_dir {
            Some(dir) => GraphStore::open(dir)?,
            None => GraphStore::in_memory(),
        };
        if self.config.rebuild_graph {
            store.reset()?;
        }
        let bar = self.progress_bar(0);
        let update = build_graph(repo, timeline, &self.config.branch, &mut store, &bar)?;
        Ok((store, update))
    }

    /// Extract every enabled family for `timeline`, reading `graph` for the graph-backed ones.
    pub fn extract(&self, timeline: &CommitTimeline, graph: Option<&GraphStore>) -> Result<ExtractionReport> {
        let start = Instant::now();
        let families = self.config.families.as_slice();
        if self.config.needs_graph() {
            graph
                .ok_or_else(|| Error::Configuration("experience and history features need a history graph".into()))?
                .ensure_covers(timeline)?;
        }

        let columns = features::columns(families);
        let Some(first) = timeline.get(0) else {
            return Ok(ExtractionReport {
                table: FeatureTable { columns, rows: Vec::new() },
                unreadable_blobs: 0,
                graph: None,
                elapsed: start.elapsed(),
            });
        };

        let ranges = partition(timeline.len(), self.config.workers);
        let slots = ResultSlots::new(ranges.len());
        let multi = if self.config.progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("feature-worker-{i}"))
            .build()
            .map_err(|e| Error::Configuration(format!("cannot start worker pool: {e}")))?;

        pool.scope(|scope| {
            for (id, range) in ranges.iter().cloned().enumerate() {
                let worker = FeatureWorker {
                    id,
                    bar: multi.add(self.progress_bar(range.len() as u64)),
                    range,
                    repo_path: &self.config.repo,
                    timeline,
                    families,
                    graph,
                    cancel: &self.cancel,
                    #[cfg(test)]
                    fault_at: self.fault_at,
                };
                let slots = &slots;
                scope.spawn(move |_| match catch_unwind(AssertUnwindSafe(|| worker.run())) {
                    Ok(outcome) => slots.publish(id, outcome),
                    Err(_) => warn!(worker = id, "worker panicked; its slot stays empty"),
                });
            }
        });

        let genesis = FeatureRow {
            index: 0,
            commit: first.id,
            values: features::genesis_values(families, first),
        };
        let merged = aggregate::merge(timeline, &ranges, slots.into_inner(), genesis)?;
        if merged.unreadable_blobs > 0 {
            warn!(count = merged.unreadable_blobs, "some blobs could not be read and were skipped");
        }

        Ok(ExtractionReport {
            table: FeatureTable { columns, rows: merged.rows },
            unreadable_blobs: merged.unreadable_blobs,
            graph: None,
            elapsed: start.elapsed(),
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{msg:>24} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len).with_style(style)
    }
}

struct FeatureWorker<'a> {
    id: usize,
    range: Range<usize>,
    repo_path: &'a Path,
    timeline: &'a CommitTimeline,
    families: &'a [FeatureKind],
    graph: Option<&'a GraphStore>,
    cancel: &'a AtomicBool,
    bar: ProgressBar,
    #[cfg(test)]
    fault_at: Option<usize>,
}

impl FeatureWorker<'_> {
    fn run(self) -> Result<WorkerOutput> {
        // Index 0 has no predecessor; its row is the aggregator's genesis row
        let first = self.range.start.max(1);
        if first >= self.range.end {
            self.bar.finish_and_clear();
            return Ok(WorkerOutput::default());
        }
        self.bar.set_message(format!("worker {}", self.id));

        let repo = Repository::open(self.repo_path)?;
        let mut scanner = TreeScanner::new(&repo);
        let mut rows = Vec::with_capacity(self.range.end - first);

        for index in first..self.range.end {
            if self.cancel.load(Ordering::Relaxed) {
                self.bar.abandon_with_message(format!("worker {} cancelled", self.id));
                return Err(Error::Cancelled { index });
            }
            #[cfg(test)]
            if self.fault_at == Some(index) {
                panic!("worker {} failed at commit index {index}", self.id);
            }
            let commit = &self.timeline[index];
            let diff = diff_commits(&repo, Some(&self.timeline[index - 1]), commit)?;
            // Record blobs the diff could not read, once each
            for oid in diff.unreadable_blobs() {
                scanner.blob_lines(oid);
            }

            let mut ctx = CommitContext {
                commit,
                diff: &diff,
                graph: self.graph,
                scanner: &mut scanner,
            };
            let values = features::extract_row(self.families, &mut ctx)?;
            rows.push(FeatureRow { index, commit: commit.id, values });
            self.bar.inc(1);
        }

        self.bar.finish_with_message(format!("worker {} done", self.id));
        debug!(worker = self.id, start = first, end = self.range.end, "worker finished range");
        Ok(WorkerOutput { rows, unreadable_blobs: scanner.into_unreadable() })
    }
}
