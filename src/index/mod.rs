//! Incremental indexing
//!
//! Change detection decides which documents need work; the indexer
//! re-chunks, re-embeds, and rewrites a document's index state in a
//! single transaction so a failed re-index never corrupts the previous
//! good state.

mod change_detector;
mod indexer;

pub use change_detector::{
    compute_content_hash, ChangeDetector, ChangeSet, ChangeSummary, DocumentBrief,
};
pub use indexer::{BatchIndexReport, IncrementalIndexer, IndexOutcome, ProgressCallback};
