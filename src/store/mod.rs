//! Persistent storage using SQLite
//!
//! Single source of truth for domains, routing rules, documents, chunks,
//! index records, and change history. All in-memory caches elsewhere in the
//! crate are read-through projections of this store.

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Reserved fallback namespace; always present, never deletable.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A knowledge domain (classification target + retrieval namespace)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct KnowledgeDomain {
    pub namespace: String,
    pub display_name: String,
    pub description: Option<String>,
    pub keywords_json: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub priority: i32,
    pub parent_namespace: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl KnowledgeDomain {
    pub fn new(
        namespace: impl Into<String>,
        display_name: impl Into<String>,
        keywords: Vec<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            namespace: namespace.into(),
            display_name: display_name.into(),
            description: None,
            keywords_json: serde_json::to_string(&keywords).ok(),
            icon: None,
            color: None,
            is_active: true,
            priority: 0,
            parent_namespace: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Parsed keyword list; malformed JSON yields an empty list.
    pub fn keywords(&self) -> Vec<String> {
        self.keywords_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default()
    }
}

/// A classification routing rule
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub rule_name: String,
    pub rule_type: String,
    pub pattern: String,
    pub target_namespace: String,
    pub confidence_threshold: f64,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl RoutingRule {
    pub fn new(
        rule_name: impl Into<String>,
        rule_type: impl Into<String>,
        pattern: impl Into<String>,
        target_namespace: impl Into<String>,
        priority: i32,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            rule_name: rule_name.into(),
            rule_type: rule_type.into(),
            pattern: pattern.into(),
            target_namespace: target_namespace.into(),
            confidence_threshold: 0.0,
            priority,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A source document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub namespace: String,
    pub filename: String,
    pub content: String,
    pub domain_confidence: Option<f64>,
    pub file_size: i64,
    pub file_modified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(
        namespace: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        let content = content.into();
        Self {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.into(),
            filename: filename.into(),
            file_size: content.len() as i64,
            content,
            domain_confidence: None,
            file_modified_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A stored chunk row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: String,
    pub doc_id: String,
    pub namespace: String,
    pub chunk_index: i32,
    pub content: String,
    pub embedding_json: Option<String>,
    pub created_at: String,
}

/// A chunk row joined with its document's filename, as retrieval consumes it
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkWithDoc {
    pub id: String,
    pub doc_id: String,
    pub namespace: String,
    pub chunk_index: i32,
    pub content: String,
    pub embedding_json: Option<String>,
    pub filename: String,
}

impl ChunkWithDoc {
    /// Parsed embedding vector; null or unparseable JSON yields None so the
    /// row can be skipped rather than failing the whole search.
    pub fn embedding(&self) -> Option<Vec<f32>> {
        self.embedding_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
    }
}

/// Per-document index bookkeeping record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexRecord {
    pub doc_id: String,
    pub namespace: String,
    pub content_hash: String,
    pub chunk_count: i32,
    pub vector_count: i32,
    pub index_version: i32,
    pub file_size: i64,
    pub file_modified_at: Option<String>,
    pub indexed_at: String,
}

/// Append-only change audit entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub id: String,
    pub doc_id: String,
    pub change_type: String,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
    pub old_chunk_count: Option<i32>,
    pub new_chunk_count: Option<i32>,
    pub changed_at: String,
    pub details: Option<String>,
}

impl ChangeEntry {
    pub fn new(doc_id: String, change_type: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            doc_id,
            change_type,
            old_hash: None,
            new_hash: None,
            old_chunk_count: None,
            new_chunk_count: None,
            changed_at: Utc::now().to_rfc3339(),
            details: None,
        }
    }
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub domain_count: usize,
    pub document_count: usize,
    pub chunk_count: usize,
    pub indexed_document_count: usize,
}

/// Database handle
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at the given path.
    pub async fn new(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };

        if !store.is_initialized().await? {
            store.init_schema().await?;
        }

        Ok(store)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='domains'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    /// Underlying connection pool (used for multi-statement transactions)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Domain Operations =====

    /// Ensure the reserved `default` domain exists
    pub async fn ensure_default_domain(&self) -> Result<()> {
        if self.get_domain(DEFAULT_NAMESPACE).await?.is_none() {
            let domain = KnowledgeDomain::new(
                DEFAULT_NAMESPACE.to_string(),
                "General".to_string(),
                Vec::new(),
            );
            self.insert_domain(&domain).await?;
        }
        Ok(())
    }

    pub async fn insert_domain(&self, domain: &KnowledgeDomain) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domains (namespace, display_name, description, keywords_json, icon, color,
                                 is_active, priority, parent_namespace, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&domain.namespace)
        .bind(&domain.display_name)
        .bind(&domain.description)
        .bind(&domain.keywords_json)
        .bind(&domain.icon)
        .bind(&domain.color)
        .bind(domain.is_active)
        .bind(domain.priority)
        .bind(&domain.parent_namespace)
        .bind(&domain.created_at)
        .bind(&domain.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_domain(&self, namespace: &str) -> Result<Option<KnowledgeDomain>> {
        let domain =
            sqlx::query_as::<_, KnowledgeDomain>("SELECT * FROM domains WHERE namespace = ?")
                .bind(namespace)
                .fetch_optional(&self.pool)
                .await?;
        Ok(domain)
    }

    pub async fn list_domains(&self, active_only: bool) -> Result<Vec<KnowledgeDomain>> {
        let sql = if active_only {
            "SELECT * FROM domains WHERE is_active = 1 ORDER BY priority DESC, namespace"
        } else {
            "SELECT * FROM domains ORDER BY priority DESC, namespace"
        };
        let domains = sqlx::query_as::<_, KnowledgeDomain>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(domains)
    }

    /// Delete a domain. The reserved `default` namespace cannot be removed.
    pub async fn delete_domain(&self, namespace: &str) -> Result<()> {
        if namespace == DEFAULT_NAMESPACE {
            return Err(Error::Config(
                "the 'default' domain is reserved and cannot be deleted".to_string(),
            ));
        }
        let affected = sqlx::query("DELETE FROM domains WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(Error::DomainNotFound(namespace.to_string()));
        }
        Ok(())
    }

    // ===== Routing Rule Operations =====

    pub async fn insert_rule(&self, rule: &RoutingRule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO routing_rules (id, rule_name, rule_type, pattern, target_namespace,
                                       confidence_threshold, priority, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.rule_name)
        .bind(&rule.rule_type)
        .bind(&rule.pattern)
        .bind(&rule.target_namespace)
        .bind(rule.confidence_threshold)
        .bind(rule.priority)
        .bind(rule.is_active)
        .bind(&rule.created_at)
        .bind(&rule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List routing rules, highest priority first
    pub async fn list_rules(&self, active_only: bool) -> Result<Vec<RoutingRule>> {
        let sql = if active_only {
            "SELECT * FROM routing_rules WHERE is_active = 1 ORDER BY priority DESC"
        } else {
            "SELECT * FROM routing_rules ORDER BY priority DESC"
        };
        let rules = sqlx::query_as::<_, RoutingRule>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rules)
    }

    pub async fn delete_rule(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM routing_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Document Operations =====

    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, namespace, filename, content, domain_confidence,
                                   file_size, file_modified_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.namespace)
        .bind(&doc.filename)
        .bind(&doc.content)
        .bind(doc.domain_confidence)
        .bind(doc.file_size)
        .bind(&doc.file_modified_at)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    pub async fn find_document(
        &self,
        namespace: &str,
        filename: &str,
    ) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE namespace = ? AND filename = ?",
        )
        .bind(namespace)
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc)
    }

    /// Replace a document's content. The index record keeps the old hash
    /// until the document is re-indexed.
    pub async fn update_document_content(
        &self,
        doc_id: &str,
        content: &str,
        file_modified_at: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET content = ?, file_size = ?, file_modified_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(content)
        .bind(content.len() as i64)
        .bind(file_modified_at)
        .bind(Utc::now().to_rfc3339())
        .bind(doc_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_documents(&self, namespace: Option<&str>) -> Result<Vec<Document>> {
        let docs = match namespace {
            Some(ns) => {
                sqlx::query_as::<_, Document>(
                    "SELECT * FROM documents WHERE namespace = ? ORDER BY filename",
                )
                .bind(ns)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY filename")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(docs)
    }

    /// Delete a document together with its chunks and index record
    pub async fn delete_document(&self, doc_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_records WHERE doc_id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(doc_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ===== Chunk Operations =====

    /// Load chunk rows (joined with document filenames) matching the given
    /// optional predicates. Retrieval scans these with their embeddings.
    pub async fn list_chunks_filtered(
        &self,
        namespace: Option<&str>,
        document_ids: Option<&[String]>,
        filename_filter: Option<&str>,
    ) -> Result<Vec<ChunkWithDoc>> {
        let mut sql = String::from(
            "SELECT c.id, c.doc_id, c.namespace, c.chunk_index, c.content, c.embedding_json, d.filename \
             FROM chunks c JOIN documents d ON c.doc_id = d.id WHERE 1=1",
        );
        if namespace.is_some() {
            sql.push_str(" AND c.namespace = ?");
        }
        if let Some(ids) = document_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            sql.push_str(&format!(" AND c.doc_id IN ({})", placeholders));
        }
        if filename_filter.is_some() {
            sql.push_str(" AND d.filename LIKE ?");
        }
        sql.push_str(" ORDER BY c.doc_id, c.chunk_index");

        let mut query = sqlx::query_as::<_, ChunkWithDoc>(&sql);
        if let Some(ns) = namespace {
            query = query.bind(ns);
        }
        if let Some(ids) = document_ids {
            for id in ids {
                query = query.bind(id);
            }
        }
        if let Some(filter) = filename_filter {
            query = query.bind(format!("%{}%", filter));
        }

        let chunks = query.fetch_all(&self.pool).await?;
        Ok(chunks)
    }

    pub async fn list_document_chunks(&self, doc_id: &str) -> Result<Vec<ChunkRow>> {
        let chunks = sqlx::query_as::<_, ChunkRow>(
            "SELECT * FROM chunks WHERE doc_id = ? ORDER BY chunk_index",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    pub async fn count_chunks(&self, namespace: Option<&str>) -> Result<usize> {
        let count: i64 = match namespace {
            Some(ns) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE namespace = ?")
                    .bind(ns)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count as usize)
    }

    // ===== Index Record Operations =====

    pub async fn get_index_record(&self, doc_id: &str) -> Result<Option<IndexRecord>> {
        let record =
            sqlx::query_as::<_, IndexRecord>("SELECT * FROM index_records WHERE doc_id = ?")
                .bind(doc_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    pub async fn list_index_records(&self, namespace: Option<&str>) -> Result<Vec<IndexRecord>> {
        let records = match namespace {
            Some(ns) => {
                sqlx::query_as::<_, IndexRecord>(
                    "SELECT * FROM index_records WHERE namespace = ?",
                )
                .bind(ns)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, IndexRecord>("SELECT * FROM index_records")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(records)
    }

    // ===== Change History Operations =====

    pub async fn insert_change_entry(&self, entry: &ChangeEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO change_history (id, doc_id, change_type, old_hash, new_hash,
                                        old_chunk_count, new_chunk_count, changed_at, details)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.doc_id)
        .bind(&entry.change_type)
        .bind(&entry.old_hash)
        .bind(&entry.new_hash)
        .bind(entry.old_chunk_count)
        .bind(entry.new_chunk_count)
        .bind(&entry.changed_at)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_change_history(&self, doc_id: &str, limit: usize) -> Result<Vec<ChangeEntry>> {
        let entries = sqlx::query_as::<_, ChangeEntry>(
            "SELECT * FROM change_history WHERE doc_id = ? ORDER BY changed_at DESC LIMIT ?",
        )
        .bind(doc_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    // ===== Statistics =====

    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let domain_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM domains")
            .fetch_one(&self.pool)
            .await?;
        let document_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let indexed_document_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM index_records")
                .fetch_one(&self.pool)
                .await?;

        Ok(GlobalStats {
            domain_count: domain_count as usize,
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            indexed_document_count: indexed_document_count as usize,
        })
    }
}

struct CachedList<T> {
    fetched_at: Instant,
    items: Vec<T>,
}

/// TTL-cached view of active knowledge domains.
///
/// Read-through projection of the store; per-process staleness up to the TTL
/// is accepted. `invalidate()` forces a refetch on next access.
pub struct DomainCatalog {
    store: Store,
    ttl: Duration,
    cached: Mutex<Option<CachedList<KnowledgeDomain>>>,
}

impl DomainCatalog {
    pub fn new(store: Store, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn active(&self) -> Result<Vec<KnowledgeDomain>> {
        if let Ok(guard) = self.cached.lock() {
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.items.clone());
                }
            }
        }

        let domains = self.store.list_domains(true).await?;
        if let Ok(mut guard) = self.cached.lock() {
            *guard = Some(CachedList {
                fetched_at: Instant::now(),
                items: domains.clone(),
            });
        }
        Ok(domains)
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.lock() {
            *guard = None;
        }
    }
}

/// TTL-cached view of active routing rules, highest priority first.
pub struct RuleCatalog {
    store: Store,
    ttl: Duration,
    cached: Mutex<Option<CachedList<RoutingRule>>>,
}

impl RuleCatalog {
    pub fn new(store: Store, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn active(&self) -> Result<Vec<RoutingRule>> {
        if let Ok(guard) = self.cached.lock() {
            if let Some(cached) = guard.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.items.clone());
                }
            }
        }

        let rules = self.store.list_rules(true).await?;
        if let Ok(mut guard) = self.cached.lock() {
            *guard = Some(CachedList {
                fetched_at: Instant::now(),
                items: rules.clone(),
            });
        }
        Ok(rules)
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.lock() {
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test_store() -> (Store, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(&tmp.path().join("test.db")).await.unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn test_domain_crud() {
        let (store, _tmp) = setup_test_store().await;

        let domain = KnowledgeDomain::new(
            "technical_docs".to_string(),
            "Technical Docs".to_string(),
            vec!["API".to_string(), "SDK".to_string()],
        );
        store.insert_domain(&domain).await.unwrap();

        let loaded = store.get_domain("technical_docs").await.unwrap().unwrap();
        assert_eq!(loaded.display_name, "Technical Docs");
        assert_eq!(loaded.keywords(), vec!["API", "SDK"]);

        let domains = store.list_domains(true).await.unwrap();
        assert_eq!(domains.len(), 1);

        store.delete_domain("technical_docs").await.unwrap();
        assert!(store.get_domain("technical_docs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_domain_is_protected() {
        let (store, _tmp) = setup_test_store().await;
        store.ensure_default_domain().await.unwrap();

        assert!(store.delete_domain(DEFAULT_NAMESPACE).await.is_err());
        assert!(store.get_domain(DEFAULT_NAMESPACE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rules_ordered_by_priority() {
        let (store, _tmp) = setup_test_store().await;

        let low = RoutingRule::new(
            "low".to_string(),
            "keyword".to_string(),
            "foo|bar".to_string(),
            "a".to_string(),
            1,
        );
        let high = RoutingRule::new(
            "high".to_string(),
            "keyword".to_string(),
            "foo".to_string(),
            "b".to_string(),
            10,
        );
        store.insert_rule(&low).await.unwrap();
        store.insert_rule(&high).await.unwrap();

        let rules = store.list_rules(true).await.unwrap();
        assert_eq!(rules[0].rule_name, "high");
        assert_eq!(rules[1].rule_name, "low");
    }

    #[tokio::test]
    async fn test_chunk_filtering() {
        let (store, _tmp) = setup_test_store().await;

        let doc = Document::new(
            "tech".to_string(),
            "guide.md".to_string(),
            "some text".to_string(),
        );
        store.insert_document(&doc).await.unwrap();

        let now = Utc::now().to_rfc3339();
        for (i, text) in ["first chunk", "second chunk"].iter().enumerate() {
            sqlx::query(
                "INSERT INTO chunks (id, doc_id, namespace, chunk_index, content, embedding_json, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format!("chunk-{}", i))
            .bind(&doc.id)
            .bind("tech")
            .bind(i as i32)
            .bind(text)
            .bind(Some("[0.1, 0.2]".to_string()))
            .bind(&now)
            .execute(store.pool())
            .await
            .unwrap();
        }

        let chunks = store
            .list_chunks_filtered(Some("tech"), None, None)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].filename, "guide.md");
        assert_eq!(chunks[0].embedding(), Some(vec![0.1, 0.2]));

        let none = store
            .list_chunks_filtered(Some("other"), None, None)
            .await
            .unwrap();
        assert!(none.is_empty());

        let by_file = store
            .list_chunks_filtered(Some("tech"), None, Some("guide"))
            .await
            .unwrap();
        assert_eq!(by_file.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_document_cascades() {
        let (store, _tmp) = setup_test_store().await;

        let doc = Document::new("ns".to_string(), "a.txt".to_string(), "body".to_string());
        store.insert_document(&doc).await.unwrap();

        sqlx::query(
            "INSERT INTO chunks (id, doc_id, namespace, chunk_index, content, created_at) \
             VALUES ('c1', ?, 'ns', 0, 'body', ?)",
        )
        .bind(&doc.id)
        .bind(Utc::now().to_rfc3339())
        .execute(store.pool())
        .await
        .unwrap();

        store.delete_document(&doc.id).await.unwrap();
        assert!(store.get_document(&doc.id).await.unwrap().is_none());
        assert_eq!(store.count_chunks(Some("ns")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_domain_catalog_invalidation() {
        let (store, _tmp) = setup_test_store().await;
        let catalog = DomainCatalog::new(store.clone(), Duration::from_secs(300));

        assert!(catalog.active().await.unwrap().is_empty());

        let domain = KnowledgeDomain::new("x".to_string(), "X".to_string(), Vec::new());
        store.insert_domain(&domain).await.unwrap();

        // Cached view is stale until invalidated
        assert!(catalog.active().await.unwrap().is_empty());
        catalog.invalidate();
        assert_eq!(catalog.active().await.unwrap().len(), 1);
    }
}
