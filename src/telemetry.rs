//! Query telemetry
//!
//! Every chat search records one `query_log` row with timing and outcome.
//! Logging is best-effort by contract: the orchestrator swallows sink
//! failures so telemetry can never break retrieval.

use crate::error::Result;
use crate::store::Store;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// One logged query
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryLogEntry {
    pub query: String,
    pub namespace: Option<String>,
    /// "single_domain" or "cross_domain"
    pub retrieval_mode: Option<String>,
    /// Which degradation level produced the results
    pub retrieval_method: Option<String>,
    pub classification_ms: Option<i64>,
    pub retrieval_ms: Option<i64>,
    pub rewrite_ms: Option<i64>,
    pub total_ms: Option<i64>,
    pub result_count: i64,
    pub session_id: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait QueryLogSink: Send + Sync {
    async fn log_query(&self, entry: &QueryLogEntry) -> Result<()>;
}

/// Sink writing entries to the `query_log` table
pub struct StoreLogSink {
    store: Store,
}

impl StoreLogSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QueryLogSink for StoreLogSink {
    async fn log_query(&self, entry: &QueryLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO query_log (
                id, query, namespace, retrieval_mode, retrieval_method,
                classification_ms, retrieval_ms, rewrite_ms, total_ms,
                result_count, session_id, error, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.query)
        .bind(&entry.namespace)
        .bind(&entry.retrieval_mode)
        .bind(&entry.retrieval_method)
        .bind(entry.classification_ms)
        .bind(entry.retrieval_ms)
        .bind(entry.rewrite_ms)
        .bind(entry.total_ms)
        .bind(entry.result_count)
        .bind(&entry.session_id)
        .bind(&entry.error)
        .bind(Utc::now().to_rfc3339())
        .execute(self.store.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_query_inserts_row() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        let sink = StoreLogSink::new(store.clone());

        let entry = QueryLogEntry {
            query: "发票怎么开".to_string(),
            namespace: Some("billing".to_string()),
            retrieval_mode: Some("single_domain".to_string()),
            retrieval_method: Some("hybrid".to_string()),
            classification_ms: Some(12),
            retrieval_ms: Some(80),
            rewrite_ms: None,
            total_ms: Some(95),
            result_count: 5,
            session_id: Some("session-1".to_string()),
            error: None,
        };
        sink.log_query(&entry).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM query_log")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
