//! SQLite schema definition

/// SQL schema for the archivist database
pub const SCHEMA_SQL: &str = r#"
-- Knowledge domains: classification targets and retrieval namespaces
CREATE TABLE IF NOT EXISTS domains (
    namespace TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    description TEXT,
    keywords_json TEXT,
    icon TEXT,
    color TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 0,
    parent_namespace TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Routing rules: query short-circuits for classification
CREATE TABLE IF NOT EXISTS routing_rules (
    id TEXT PRIMARY KEY,
    rule_name TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    pattern TEXT NOT NULL,
    target_namespace TEXT NOT NULL,
    confidence_threshold REAL NOT NULL DEFAULT 0.0,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Documents: source texts, partitioned by namespace
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    namespace TEXT NOT NULL,
    filename TEXT NOT NULL,
    content TEXT NOT NULL,
    domain_confidence REAL,
    file_size INTEGER NOT NULL DEFAULT 0,
    file_modified_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Chunks: embedded slices of documents
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL REFERENCES documents(id),
    namespace TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding_json TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(doc_id, chunk_index)
);

-- Index records: one per indexed document, drives change detection
CREATE TABLE IF NOT EXISTS index_records (
    doc_id TEXT PRIMARY KEY REFERENCES documents(id),
    namespace TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    vector_count INTEGER NOT NULL DEFAULT 0,
    index_version INTEGER NOT NULL DEFAULT 1,
    file_size INTEGER NOT NULL DEFAULT 0,
    file_modified_at TEXT,
    indexed_at TEXT NOT NULL
);

-- Change history: append-only audit trail of index mutations
CREATE TABLE IF NOT EXISTS change_history (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL,
    change_type TEXT NOT NULL,
    old_hash TEXT,
    new_hash TEXT,
    old_chunk_count INTEGER,
    new_chunk_count INTEGER,
    changed_at TEXT NOT NULL,
    details TEXT
);

-- Query log: retrieval telemetry
CREATE TABLE IF NOT EXISTS query_log (
    id TEXT PRIMARY KEY,
    query TEXT NOT NULL,
    namespace TEXT,
    retrieval_mode TEXT,
    retrieval_method TEXT,
    classification_ms INTEGER,
    retrieval_ms INTEGER,
    rewrite_ms INTEGER,
    total_ms INTEGER,
    result_count INTEGER NOT NULL DEFAULT 0,
    session_id TEXT,
    error TEXT,
    created_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_documents_namespace ON documents(namespace);
CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
CREATE INDEX IF NOT EXISTS idx_chunks_namespace ON chunks(namespace);
CREATE INDEX IF NOT EXISTS idx_index_records_namespace ON index_records(namespace);
CREATE INDEX IF NOT EXISTS idx_change_history_doc ON change_history(doc_id);
CREATE INDEX IF NOT EXISTS idx_rules_priority ON routing_rules(priority);
"#;
