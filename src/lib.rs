// src/lib.rs

//! Per-commit feature tables for defect prediction.
//!
//! A branch's first-parent history is split into contiguous ranges that are
//! processed in parallel, one repository handle per worker, and merged back
//! into timeline order by the absolute index every row carries. Features that
//! depend on unbounded history (author experience, file history) read a graph
//! built beforehand in a single sequential pass.

pub mod aggregate;
pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod graph;
pub mod model;
pub mod partition;
pub mod table;
pub mod timeline;

pub use config::ExtractConfig;
pub use engine::{ExtractionReport, Extractor};
pub use error::{Error, Result, UnresolvedRange};
pub use features::FeatureKind;
pub use graph::{GraphStore, GraphUpdate};
pub use model::{CommitInfo, FeatureRow, FeatureTable};
pub use timeline::CommitTimeline;
