// src/timeline.rs

use crate::error::{Error, Result};
use crate::model::CommitInfo;
use git2::{Oid, Repository, Sort};
use std::ops::Index;
use tracing::debug;

/// Oldest-first, first-parent-only sequence of commits reachable from a branch head.
///
/// Every consecutive pair `(timeline[i - 1], timeline[i])` is a (predecessor, commit)
/// pair, so the diff for index `i` is always taken against index `i - 1`.
#[derive(Debug, Clone, Default)]
pub struct CommitTimeline {
    commits: Vec<CommitInfo>,
}

impl CommitTimeline {
    pub fn load(repo: &Repository, reference: &str) -> Result<Self> {
        let head = resolve_head(repo, reference)?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push(head)?;
        revwalk.simplify_first_parent()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            commits.push(CommitInfo::from_commit(&commit));
        }
        debug!(reference, head = %head, commits = commits.len(), "loaded commit timeline");

        Ok(CommitTimeline { commits })
    }

    pub fn from_commits(commits: Vec<CommitInfo>) -> Self {
        CommitTimeline { commits }
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CommitInfo> {
        self.commits.get(index)
    }

    pub fn head(&self) -> Option<&CommitInfo> {
        self.commits.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommitInfo> {
        self.commits.iter()
    }
}

impl Index<usize> for CommitTimeline {
    type Output = CommitInfo;

    fn index(&self, index: usize) -> &CommitInfo {
        &self.commits[index]
    }
}

fn resolve_head(repo: &Repository, reference: &str) -> Result<Oid> {
    let unresolved = |source| Error::UnresolvedReference {
        reference: reference.to_string(),
        source,
    };
    let object = repo.revparse_single(reference).map_err(unresolved)?;
    let commit = object.peel_to_commit().map_err(unresolved)?;
    Ok(commit.id())
}
