// src/error.rs

use std::fmt;
use std::ops::Range;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A slice of the timeline that no worker delivered rows for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRange {
    pub worker: usize,
    pub range: Range<usize>,
    pub reason: String,
}

impl fmt::Display for UnresolvedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} left commits [{}, {}) unresolved: {}",
            self.worker, self.range.start, self.range.end, self.reason
        )
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("repository error: {0}")]
    Repository(#[from] git2::Error),

    #[error("cannot resolve reference `{reference}`: {source}")]
    UnresolvedReference {
        reference: String,
        #[source]
        source: git2::Error,
    },

    #[error("partition failure: {}", join_ranges(.unresolved))]
    PartitionFailure { unresolved: Vec<UnresolvedRange> },

    #[error("data consistency error: {0}")]
    DataConsistency(String),

    #[error("extraction cancelled before commit index {index}")]
    Cancelled { index: usize },

    #[error("cannot read blob {oid}: {source}")]
    BlobRead {
        oid: git2::Oid,
        #[source]
        source: git2::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

fn join_ranges(unresolved: &[UnresolvedRange]) -> String {
    unresolved
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        Error::DataConsistency(message.into())
    }
}
