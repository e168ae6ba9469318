use super::compute_content_hash;
use crate::chunk::split_text;
use crate::config::ChunkConfig;
use crate::embed::EmbeddingService;
use crate::error::{Error, Result};
use crate::store::{ChangeEntry, Store};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-document indexing outcome
#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub doc_id: String,
    /// "success", "skipped", or "failed"
    pub status: String,
    /// "created", "updated", or "skipped"
    pub action: String,
    pub chunks_added: usize,
    pub chunks_removed: usize,
    pub error: Option<String>,
}

impl IndexOutcome {
    fn skipped(doc_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            status: "skipped".to_string(),
            action: "skipped".to_string(),
            chunks_added: 0,
            chunks_removed: 0,
            error: None,
        }
    }

    fn failed(doc_id: &str, error: &Error) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            status: "failed".to_string(),
            action: "skipped".to_string(),
            chunks_added: 0,
            chunks_removed: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Batch indexing report
#[derive(Debug, Clone, Serialize)]
pub struct BatchIndexReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub details: Vec<IndexOutcome>,
}

/// Callback invoked after each document in a batch:
/// (current, total, doc_id, outcome)
pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize, &str, &IndexOutcome) + Send + Sync);

/// Re-chunks, re-embeds, and rewrites one document's index state.
///
/// All row changes for a document happen in one transaction: the old
/// chunks are only gone once the new ones, the index record, and the
/// change history entry are all in.
pub struct IncrementalIndexer {
    store: Store,
    embeddings: Arc<EmbeddingService>,
    chunk_cfg: ChunkConfig,
}

impl IncrementalIndexer {
    pub fn new(store: Store, embeddings: Arc<EmbeddingService>, chunk_cfg: ChunkConfig) -> Self {
        Self {
            store,
            embeddings,
            chunk_cfg,
        }
    }

    /// Index one document, skipping it when the content hash matches the
    /// index record (unless `force`).
    pub async fn index_document(&self, doc_id: &str, force: bool) -> Result<IndexOutcome> {
        let doc = self
            .store
            .get_document(doc_id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(doc_id.to_string()))?;

        let new_hash = compute_content_hash(&doc.content);
        let record = self.store.get_index_record(doc_id).await?;
        if let Some(record) = &record {
            if !force && record.content_hash == new_hash {
                debug!(doc_id = %doc_id, "Content unchanged, skipping");
                return Ok(IndexOutcome::skipped(doc_id));
            }
        }

        let chunks = split_text(&doc.content, &new_hash, &self.chunk_cfg);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        // Embeddings are fetched before the transaction so a backend
        // failure leaves the previous index state untouched
        let vectors = self.embeddings.embed_batch(&texts).await?;

        let now = Utc::now().to_rfc3339();
        let action = if record.is_some() { "updated" } else { "created" };
        let mut tx = self.store.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, doc_id, namespace, chunk_index, content, embedding_json, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(doc_id)
            .bind(&doc.namespace)
            .bind(chunk.index as i32)
            .bind(&chunk.text)
            .bind(serde_json::to_string(vector)?)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO index_records (doc_id, namespace, content_hash, chunk_count,
                 vector_count, index_version, file_size, file_modified_at, indexed_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
             ON CONFLICT(doc_id) DO UPDATE SET
                 namespace = excluded.namespace,
                 content_hash = excluded.content_hash,
                 chunk_count = excluded.chunk_count,
                 vector_count = excluded.vector_count,
                 index_version = index_records.index_version + 1,
                 file_size = excluded.file_size,
                 file_modified_at = excluded.file_modified_at,
                 indexed_at = excluded.indexed_at",
        )
        .bind(doc_id)
        .bind(&doc.namespace)
        .bind(&new_hash)
        .bind(chunks.len() as i32)
        .bind(vectors.len() as i32)
        .bind(doc.file_size)
        .bind(&doc.file_modified_at)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let mut entry = ChangeEntry::new(doc_id.to_string(), action.to_string());
        entry.old_hash = record.as_ref().map(|r| r.content_hash.clone());
        entry.new_hash = Some(new_hash);
        entry.old_chunk_count = record.as_ref().map(|r| r.chunk_count);
        entry.new_chunk_count = Some(chunks.len() as i32);
        sqlx::query(
            "INSERT INTO change_history (id, doc_id, change_type, old_hash, new_hash,
                 old_chunk_count, new_chunk_count, changed_at, details)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.doc_id)
        .bind(&entry.change_type)
        .bind(&entry.old_hash)
        .bind(&entry.new_hash)
        .bind(entry.old_chunk_count)
        .bind(entry.new_chunk_count)
        .bind(&now)
        .bind(&entry.details)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            doc_id = %doc_id,
            action,
            chunks = chunks.len(),
            "Document indexed"
        );

        Ok(IndexOutcome {
            doc_id: doc_id.to_string(),
            status: "success".to_string(),
            action: action.to_string(),
            chunks_added: chunks.len(),
            chunks_removed: removed,
            error: None,
        })
    }

    /// Remove a document's chunks and index record, logging the deletion.
    /// A missing index record reports `not_found` rather than an error.
    pub async fn delete_document_index(&self, doc_id: &str) -> Result<IndexOutcome> {
        let Some(record) = self.store.get_index_record(doc_id).await? else {
            return Ok(IndexOutcome {
                doc_id: doc_id.to_string(),
                status: "not_found".to_string(),
                action: "skipped".to_string(),
                chunks_added: 0,
                chunks_removed: 0,
                error: None,
            });
        };

        let now = Utc::now().to_rfc3339();
        let mut tx = self.store.pool().begin().await?;
        let removed = sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;
        sqlx::query("DELETE FROM index_records WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;

        let entry = ChangeEntry::new(doc_id.to_string(), "deleted".to_string());
        sqlx::query(
            "INSERT INTO change_history (id, doc_id, change_type, old_hash, new_hash,
                 old_chunk_count, new_chunk_count, changed_at, details)
             VALUES (?, ?, ?, ?, NULL, ?, NULL, ?, NULL)",
        )
        .bind(&entry.id)
        .bind(&entry.doc_id)
        .bind(&entry.change_type)
        .bind(&record.content_hash)
        .bind(record.chunk_count)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(doc_id = %doc_id, chunks = removed, "Document index removed");
        Ok(IndexOutcome {
            doc_id: doc_id.to_string(),
            status: "success".to_string(),
            action: "deleted".to_string(),
            chunks_added: 0,
            chunks_removed: removed,
            error: None,
        })
    }

    /// Index documents sequentially; one failure never aborts the batch.
    pub async fn index_batch(
        &self,
        doc_ids: &[String],
        force: bool,
        progress: Option<ProgressCallback<'_>>,
    ) -> BatchIndexReport {
        let total = doc_ids.len();
        let mut report = BatchIndexReport {
            total,
            success: 0,
            failed: 0,
            skipped: 0,
            details: Vec::with_capacity(total),
        };

        for (i, doc_id) in doc_ids.iter().enumerate() {
            let outcome = match self.index_document(doc_id, force).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(doc_id = %doc_id, error = %e, "Indexing failed");
                    IndexOutcome::failed(doc_id, &e)
                }
            };
            match outcome.status.as_str() {
                "success" => report.success += 1,
                "skipped" => report.skipped += 1,
                _ => report.failed += 1,
            }
            if let Some(callback) = progress {
                callback(i + 1, total, doc_id, &outcome);
            }
            report.details.push(outcome);
        }

        report
    }
}
