//! Index command implementation

use crate::config::Config;
use crate::embed::EmbeddingService;
use crate::error::Result;
use crate::index::{BatchIndexReport, ChangeDetector, IncrementalIndexer, IndexOutcome};
use crate::progress;
use crate::store::Store;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Report from an index run
#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub batch: BatchIndexReport,
    /// Index records removed because their document is gone
    pub pruned: usize,
}

/// Index documents that changed since the last run. `force` re-indexes
/// everything in scope regardless of content hashes; `doc_id` restricts
/// the run to one document.
pub async fn cmd_index(
    config: &Config,
    store: &Store,
    namespace: Option<&str>,
    doc_id: Option<&str>,
    force: bool,
) -> Result<IndexReport> {
    let detector = ChangeDetector::new(store.clone());
    let embeddings = Arc::new(EmbeddingService::from_config(&config.embedding)?);
    let indexer = IncrementalIndexer::new(store.clone(), embeddings, config.chunk.clone());

    let doc_ids: Vec<String> = if let Some(doc_id) = doc_id {
        vec![doc_id.to_string()]
    } else if force {
        store
            .list_documents(namespace)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect()
    } else {
        let changes = detector.detect_changes_by_hash(namespace).await?;
        changes
            .new
            .into_iter()
            .chain(changes.modified)
            .map(|d| d.id)
            .collect()
    };

    let deleted = if doc_id.is_some() {
        Vec::new()
    } else {
        detector.detect_deleted_documents(namespace).await?
    };
    for stale_id in &deleted {
        indexer.delete_document_index(stale_id).await?;
    }
    if !deleted.is_empty() {
        info!("Pruned {} stale index records", deleted.len());
    }

    if doc_ids.is_empty() {
        info!("Nothing to index");
        return Ok(IndexReport {
            batch: BatchIndexReport {
                total: 0,
                success: 0,
                failed: 0,
                skipped: 0,
                details: Vec::new(),
            },
            pruned: deleted.len(),
        });
    }

    let bar = progress::indexing_bar(doc_ids.len() as u64);
    let callback = |_current: usize, _total: usize, doc_id: &str, _outcome: &IndexOutcome| {
        bar.set_message(doc_id.to_string());
        bar.inc(1);
    };
    let batch = indexer.index_batch(&doc_ids, force, Some(&callback)).await;
    bar.finish_and_clear();

    info!(
        "Index run complete: {} indexed, {} skipped, {} failed",
        batch.success, batch.skipped, batch.failed
    );

    Ok(IndexReport {
        batch,
        pruned: deleted.len(),
    })
}

/// Print an index report to console
pub fn print_index_report(report: &IndexReport) {
    println!("\n✓ Index run complete");
    println!("  Documents indexed: {}", report.batch.success);
    println!("  Skipped (unchanged): {}", report.batch.skipped);
    println!("  Failed: {}", report.batch.failed);
    println!("  Stale records pruned: {}", report.pruned);

    for detail in &report.batch.details {
        if let Some(error) = &detail.error {
            println!("  ✗ {}: {}", detail.doc_id, error);
        }
    }
}
