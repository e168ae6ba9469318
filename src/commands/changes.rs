//! Changes command implementation

use crate::error::Result;
use crate::index::{ChangeDetector, ChangeSummary};
use crate::store::{ChangeEntry, Store};

/// Summarize pending changes without indexing anything
pub async fn cmd_changes(store: &Store, namespace: Option<&str>) -> Result<ChangeSummary> {
    let detector = ChangeDetector::new(store.clone());
    detector.get_change_summary(namespace).await
}

/// Fetch a document's change history, newest first
pub async fn cmd_history(store: &Store, doc_id: &str, limit: usize) -> Result<Vec<ChangeEntry>> {
    store.list_change_history(doc_id, limit).await
}

/// Print a change summary to console
pub fn print_changes(summary: &ChangeSummary) {
    println!("\nPending changes:");
    println!("  New documents: {}", summary.new);
    for doc in &summary.new_documents {
        println!("    + {} [{}]", doc.filename, doc.id);
    }
    println!("  Modified documents: {}", summary.modified);
    for doc in &summary.modified_documents {
        println!("    ~ {} [{}]", doc.filename, doc.id);
    }
    println!("  Unchanged documents: {}", summary.unchanged);
    println!("  Deleted (stale index records): {}", summary.deleted);
    for id in &summary.deleted_ids {
        println!("    - {}", id);
    }

    if summary.new + summary.modified + summary.deleted == 0 {
        println!("\nIndex is up to date.");
    } else {
        println!("\nRun 'archivist index' to apply.");
    }
}

/// Print change history entries to console
pub fn print_history(entries: &[ChangeEntry]) {
    if entries.is_empty() {
        println!("No change history for this document.");
        return;
    }
    for entry in entries {
        let chunks = match (entry.old_chunk_count, entry.new_chunk_count) {
            (Some(old), Some(new)) => format!(" chunks {} -> {}", old, new),
            (None, Some(new)) => format!(" chunks {}", new),
            _ => String::new(),
        };
        println!("{}  {}{}", entry.changed_at, entry.change_type, chunks);
    }
}
