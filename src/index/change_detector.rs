use crate::error::Result;
use crate::store::{Document, Store};
use chrono::DateTime;
use md5::{Digest, Md5};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// MD5 hex digest of document content. Empty content hashes to the
/// empty string so never-indexed and empty documents stay distinguishable
/// from any real digest.
pub fn compute_content_hash(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Documents partitioned by comparing content hashes against index records
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub new: Vec<Document>,
    pub modified: Vec<Document>,
    pub unchanged: Vec<String>,
}

/// Id plus filename, enough for a pending-change listing
#[derive(Debug, Clone, Serialize)]
pub struct DocumentBrief {
    pub id: String,
    pub filename: String,
}

impl From<&Document> for DocumentBrief {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
        }
    }
}

/// Aggregate change counts plus the documents behind them
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSummary {
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub new_documents: Vec<DocumentBrief>,
    pub modified_documents: Vec<DocumentBrief>,
    pub unchanged_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
}

/// Detects which documents need (re)indexing.
pub struct ChangeDetector {
    store: Store,
}

impl ChangeDetector {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Cheap pre-filter: documents updated after their last indexing, plus
    /// documents that were never indexed. Timestamp comparison can
    /// overreport (touch without edit), never underreport; the hash pass
    /// settles it.
    pub async fn detect_changes_by_timestamp(
        &self,
        namespace: Option<&str>,
        since: Option<&str>,
    ) -> Result<Vec<Document>> {
        let documents = self.store.list_documents(namespace).await?;
        let mut candidates = Vec::new();
        for doc in documents {
            if let Some(since) = since {
                if !timestamp_after(&doc.updated_at, since) {
                    continue;
                }
            }
            match self.store.get_index_record(&doc.id).await? {
                None => candidates.push(doc),
                Some(record) => {
                    if timestamp_after(&doc.updated_at, &record.indexed_at) {
                        candidates.push(doc);
                    }
                }
            }
        }
        Ok(candidates)
    }

    /// Partition documents into new / modified / unchanged by content
    /// hash, with the timestamp pre-filter short-circuiting unchanged
    /// documents without hashing them.
    pub async fn detect_changes_by_hash(&self, namespace: Option<&str>) -> Result<ChangeSet> {
        let documents = self.store.list_documents(namespace).await?;
        let mut set = ChangeSet::default();

        for doc in documents {
            let Some(record) = self.store.get_index_record(&doc.id).await? else {
                set.new.push(doc);
                continue;
            };
            if !timestamp_after(&doc.updated_at, &record.indexed_at) {
                set.unchanged.push(doc.id);
                continue;
            }
            if compute_content_hash(&doc.content) == record.content_hash {
                set.unchanged.push(doc.id);
            } else {
                set.modified.push(doc);
            }
        }

        debug!(
            new = set.new.len(),
            modified = set.modified.len(),
            unchanged = set.unchanged.len(),
            "Change detection complete"
        );
        Ok(set)
    }

    /// Index records whose document no longer exists.
    pub async fn detect_deleted_documents(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        let existing: HashSet<String> = self
            .store
            .list_documents(namespace)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        Ok(self
            .store
            .list_index_records(namespace)
            .await?
            .into_iter()
            .filter(|r| !existing.contains(&r.doc_id))
            .map(|r| r.doc_id)
            .collect())
    }

    pub async fn get_change_summary(&self, namespace: Option<&str>) -> Result<ChangeSummary> {
        let changes = self.detect_changes_by_hash(namespace).await?;
        let deleted_ids = self.detect_deleted_documents(namespace).await?;
        let new_documents: Vec<DocumentBrief> =
            changes.new.iter().map(DocumentBrief::from).collect();
        let modified_documents: Vec<DocumentBrief> =
            changes.modified.iter().map(DocumentBrief::from).collect();
        Ok(ChangeSummary {
            new: new_documents.len(),
            modified: modified_documents.len(),
            unchanged: changes.unchanged.len(),
            deleted: deleted_ids.len(),
            new_documents,
            modified_documents,
            unchanged_ids: changes.unchanged,
            deleted_ids,
        })
    }

    /// A document can be skipped iff its content hash equals the recorded
    /// one. Timestamps alone never justify skipping.
    pub async fn should_skip_document(&self, doc: &Document) -> Result<bool> {
        match self.store.get_index_record(&doc.id).await? {
            Some(record) => Ok(compute_content_hash(&doc.content) == record.content_hash),
            None => Ok(false),
        }
    }
}

fn timestamp_after(left: &str, right: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(left),
        DateTime::parse_from_rfc3339(right),
    ) {
        (Ok(l), Ok(r)) => l > r,
        // Unparseable timestamps cannot prove anything is up to date
        _ => true,
    }
}
