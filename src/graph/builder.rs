// src/graph/builder.rs

use super::{AuthorEntry, FileEntry, GraphStore, Manifest, PreviousTouch};
use crate::analyzer::diff_commits;
use crate::error::{Error, Result};
use crate::model::{CommitDiff, CommitInfo, DeltaStatus};
use crate::timeline::CommitTimeline;
use git2::Repository;
use indicatif::ProgressBar;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphUpdate {
    /// Commits folded in by this run
    pub appended: usize,
    /// Commits covered by the graph afterwards
    pub processed: usize,
}

/// Extend the graph so it covers the whole `timeline`, resuming where the stored graph stopped.
///
/// Each entity's entry for a commit depends on its entry for the previous
/// commit, so this walks the timeline strictly in order on one thread.
pub fn build_graph(
    repo: &Repository,
    timeline: &CommitTimeline,
    branch: &str,
    store: &mut GraphStore,
    bar: &ProgressBar,
) -> Result<GraphUpdate> {
    let start = resume_point(store.manifest(), timeline)?;
    bar.set_length((timeline.len() - start) as u64);
    bar.set_message("Building history graph");

    for index in start..timeline.len() {
        let commit = &timeline[index];
        let parent = index.checked_sub(1).map(|p| &timeline[p]);
        let diff = diff_commits(repo, parent, commit)?;

        record_author(store, index, commit, &diff)?;
        record_files(store, index, commit, &diff)?;
        store.advance(branch, index + 1, commit.hash());
        bar.inc(1);
    }
    store.flush()?;
    bar.finish_with_message("History graph complete");

    let update = GraphUpdate { appended: timeline.len() - start, processed: timeline.len() };
    info!(appended = update.appended, processed = update.processed, "history graph up to date");
    Ok(update)
}

/// Index of the first timeline commit the stored graph has not seen yet.
fn resume_point(manifest: &Manifest, timeline: &CommitTimeline) -> Result<usize> {
    if manifest.processed == 0 {
        return Ok(0);
    }
    let last_seen = timeline.get(manifest.processed - 1).map(|c| c.hash());
    if manifest.processed > timeline.len() || last_seen != manifest.head {
        return Err(Error::consistency(format!(
            "stored history graph ends at {:?} after {} commits, which is not on this timeline; rebuild it",
            manifest.head, manifest.processed
        )));
    }
    Ok(manifest.processed)
}

fn record_author(store: &mut GraphStore, seq: usize, commit: &CommitInfo, diff: &CommitDiff) -> Result<()> {
    let last = store.author(&commit.author)?.and_then(|record| record.last().cloned());
    let entry = AuthorEntry {
        commit: commit.hash(),
        seq,
        exp: last.as_ref().map_or(1, |e| e.exp + 1),
        previous: last.map(|e| e.commit),
        timestamp: commit.timestamp,
        files: diff.text_deltas().count() as u64,
    };
    store.append_author(&commit.author, entry)
}

fn record_files(store: &mut GraphStore, seq: usize, commit: &CommitInfo, diff: &CommitDiff) -> Result<()> {
    let hash = commit.hash();

    // Resolve every base before appending, so no entry can point at this same commit
    let mut pending = Vec::new();
    for delta in diff.text_deltas() {
        let path = delta.path().to_string();
        let own = store.file(&path)?.and_then(|record| record.last().cloned());
        let renamed_from = match delta.status {
            DeltaStatus::Renamed => delta.old_path.clone().filter(|old| *old != path),
            _ => None,
        };
        let inherited = match &renamed_from {
            Some(old) => store.file(old)?.and_then(|record| record.last().cloned()),
            None => None,
        };

        let mut authors: BTreeSet<String> = BTreeSet::from([commit.author.clone()]);
        for base in own.iter().chain(inherited.iter()) {
            authors.extend(base.authors.iter().cloned());
        }
        let previous = inherited.or(own).map(|base| PreviousTouch {
            commit: base.commit,
            timestamp: base.timestamp,
        });

        pending.push((
            path,
            FileEntry { commit: hash.clone(), seq, timestamp: commit.timestamp, previous, authors, renamed_from },
        ));
    }

    for (path, entry) in pending {
        store.append_file(&path, entry)?;
    }
    Ok(())
}
