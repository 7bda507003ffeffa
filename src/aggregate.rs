// src/aggregate.rs

use crate::error::{Error, Result, UnresolvedRange};
use crate::model::FeatureRow;
use crate::timeline::CommitTimeline;
use git2::Oid;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;
use tracing::warn;

/// What one worker hands back for its whole range
#[derive(Debug, Clone, Default)]
pub struct WorkerOutput {
    pub rows: Vec<FeatureRow>,
    pub unreadable_blobs: HashSet<Oid>,
}

pub type SlotContent = std::result::Result<WorkerOutput, String>;

/// One write-once cell per worker, read only after every worker has joined.
pub struct ResultSlots {
    slots: Vec<OnceLock<SlotContent>>,
}

impl ResultSlots {
    pub fn new(workers: usize) -> Self {
        ResultSlots { slots: (0..workers).map(|_| OnceLock::new()).collect() }
    }

    /// Publish a worker's outcome. Later publications for the same worker are dropped.
    pub fn publish(&self, worker: usize, outcome: Result<WorkerOutput>) {
        let Some(slot) = self.slots.get(worker) else {
            warn!(worker, "no result slot for worker");
            return;
        };
        if slot.set(outcome.map_err(|err| err.to_string())).is_err() {
            warn!(worker, "result slot already written; keeping the first publication");
        }
    }

    pub fn into_inner(self) -> Vec<Option<SlotContent>> {
        self.slots.into_iter().map(OnceLock::into_inner).collect()
    }
}

/// Rows placed by absolute timeline index
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub rows: Vec<FeatureRow>,
    pub unreadable_blobs: usize,
}

/// Reassemble worker outputs and the genesis row into timeline order.
///
/// Rows are placed by the index they were tagged with, never by slot order.
/// Any index left without a row is reported with the owning worker's range,
/// so a crashed or short worker can never silently shift the table.
pub fn merge(
    timeline: &CommitTimeline,
    ranges: &[Range<usize>],
    slots: Vec<Option<SlotContent>>,
    genesis: FeatureRow,
) -> Result<Merged> {
    if slots.len() != ranges.len() {
        return Err(Error::consistency(format!(
            "{} result slots for {} partitions",
            slots.len(),
            ranges.len()
        )));
    }
    if timeline.is_empty() {
        return Ok(Merged::default());
    }

    let mut placed: Vec<Option<FeatureRow>> = vec![None; timeline.len()];
    place(&mut placed, timeline, 0..1, genesis)?;

    let mut merged = Merged::default();
    let mut unreadable = HashSet::new();
    let mut failures: Vec<Option<String>> = vec![None; ranges.len()];
    for (worker, slot) in slots.into_iter().enumerate() {
        match slot {
            None => failures[worker] = Some("worker terminated without publishing its result slot".into()),
            Some(Err(reason)) => failures[worker] = Some(reason),
            Some(Ok(output)) => {
                unreadable.extend(output.unreadable_blobs);
                for row in output.rows {
                    place(&mut placed, timeline, ranges[worker].clone(), row)?;
                }
            }
        }
    }

    let mut unresolved = Vec::new();
    for (worker, range) in ranges.iter().enumerate() {
        let reason = failures[worker]
            .clone()
            .unwrap_or_else(|| "short result slot: fewer rows than commits in range".into());
        for gap in gaps(&placed, range.clone()) {
            unresolved.push(UnresolvedRange { worker, range: gap, reason: reason.clone() });
        }
    }
    if !unresolved.is_empty() {
        return Err(Error::PartitionFailure { unresolved });
    }

    merged.rows = placed.into_iter().flatten().collect();
    merged.unreadable_blobs = unreadable.len();
    Ok(merged)
}

fn place(
    placed: &mut [Option<FeatureRow>],
    timeline: &CommitTimeline,
    allowed: Range<usize>,
    row: FeatureRow,
) -> Result<()> {
    if !allowed.contains(&row.index) {
        return Err(Error::consistency(format!(
            "row for commit {} carries index {} outside its partition {:?}",
            row.commit, row.index, allowed
        )));
    }
    let expected = timeline[row.index].id;
    if row.commit != expected {
        return Err(Error::consistency(format!(
            "row {} is for commit {}, but the timeline has {} there",
            row.index, row.commit, expected
        )));
    }
    let cell = &mut placed[row.index];
    if cell.is_some() {
        return Err(Error::consistency(format!("two rows for timeline index {}", row.index)));
    }
    *cell = Some(row);
    Ok(())
}

/// Maximal runs of unfilled indices inside `range`.
fn gaps(placed: &[Option<FeatureRow>], range: Range<usize>) -> Vec<Range<usize>> {
    let mut gaps = Vec::new();
    let mut open: Option<usize> = None;
    for index in range.clone() {
        match (placed[index].is_none(), open) {
            (true, None) => open = Some(index),
            (false, Some(start)) => {
                gaps.push(start..index);
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        gaps.push(start..range.end);
    }
    gaps
}
