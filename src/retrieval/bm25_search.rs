use super::ScoredChunk;
use crate::error::Result;
use crate::store::{ChunkWithDoc, Store};
use bm25::{EmbedderBuilder, Scorer, Tokenizer};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Tokenizer for mixed Chinese/English text.
///
/// ASCII alphanumeric runs become lowercased word tokens; CJK runs are
/// broken into overlapping character bigrams. Tokens of a single
/// character are dropped. If nothing survives, falls back to plain
/// whitespace splitting so a query never tokenizes to nothing silently.
#[derive(Debug, Default, Clone)]
pub struct CjkTokenizer;

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

impl CjkTokenizer {
    fn push_ascii_run(run: &mut String, out: &mut Vec<String>) {
        if run.chars().count() > 1 {
            out.push(run.to_lowercase());
        }
        run.clear();
    }

    fn push_cjk_run(run: &mut Vec<char>, out: &mut Vec<String>) {
        for pair in run.windows(2) {
            out.push(pair.iter().collect());
        }
        run.clear();
    }
}

impl Tokenizer for CjkTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut ascii_run = String::new();
        let mut cjk_run: Vec<char> = Vec::new();

        for c in input_text.chars() {
            if c.is_ascii_alphanumeric() {
                Self::push_cjk_run(&mut cjk_run, &mut out);
                ascii_run.push(c);
            } else if is_cjk(c) {
                Self::push_ascii_run(&mut ascii_run, &mut out);
                cjk_run.push(c);
            } else {
                Self::push_ascii_run(&mut ascii_run, &mut out);
                Self::push_cjk_run(&mut cjk_run, &mut out);
            }
        }
        Self::push_ascii_run(&mut ascii_run, &mut out);
        Self::push_cjk_run(&mut cjk_run, &mut out);

        if out.is_empty() {
            return input_text
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .collect();
        }
        out
    }
}

struct CachedIndex {
    embedder: bm25::Embedder<u32, CjkTokenizer>,
    scorer: Scorer<String, u32>,
    chunks: HashMap<String, ChunkWithDoc>,
    built_at: Instant,
}

/// Lexical BM25 retrieval with per-namespace in-memory indexes.
///
/// Indexes are rebuilt from the chunk table when absent or older than the
/// configured TTL; `clear_cache` forces a rebuild after reindexing.
pub struct Bm25Retrieval {
    store: Store,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedIndex>>,
}

impl Bm25Retrieval {
    pub fn new(store: Store, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn search_by_namespace(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_index(namespace).await?;

        let cache = self
            .cache
            .lock()
            .map_err(|_| crate::error::Error::Retrieval("BM25 cache lock poisoned".to_string()))?;
        let Some(index) = cache.get(namespace) else {
            return Ok(Vec::new());
        };
        if index.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = index.embedder.embed(query);
        let mut matches = index.scorer.matches(&query_embedding);
        matches.truncate(top_k);

        Ok(matches
            .into_iter()
            .filter_map(|m| {
                index
                    .chunks
                    .get(&m.id)
                    .map(|chunk| ScoredChunk::from_chunk(chunk, m.score))
            })
            .collect())
    }

    /// Drop the cached index for one namespace, or all of them.
    pub fn clear_cache(&self, namespace: Option<&str>) {
        if let Ok(mut cache) = self.cache.lock() {
            match namespace {
                Some(ns) => {
                    cache.remove(ns);
                }
                None => cache.clear(),
            }
        }
    }

    async fn ensure_index(&self, namespace: &str) -> Result<()> {
        {
            let cache = self.cache.lock().map_err(|_| {
                crate::error::Error::Retrieval("BM25 cache lock poisoned".to_string())
            })?;
            if let Some(index) = cache.get(namespace) {
                if index.built_at.elapsed() < self.ttl {
                    return Ok(());
                }
            }
        }

        let chunks = self
            .store
            .list_chunks_filtered(Some(namespace), None, None)
            .await?;
        let index = Self::build_index(chunks);
        debug!(
            namespace = %namespace,
            chunks = index.chunks.len(),
            "Rebuilt BM25 index"
        );

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| crate::error::Error::Retrieval("BM25 cache lock poisoned".to_string()))?;
        cache.insert(namespace.to_string(), index);
        Ok(())
    }

    fn build_index(chunks: Vec<ChunkWithDoc>) -> CachedIndex {
        let tokenizer = CjkTokenizer;
        let total_tokens: usize = chunks
            .iter()
            .map(|c| tokenizer.tokenize(&c.content).len())
            .sum();
        let avgdl = if chunks.is_empty() {
            1.0
        } else {
            (total_tokens as f32 / chunks.len() as f32).max(1.0)
        };

        let embedder = EmbedderBuilder::<u32, CjkTokenizer>::with_avgdl(avgdl).build();
        let mut scorer = Scorer::<String, u32>::new();
        let mut by_id = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = embedder.embed(&chunk.content);
            scorer.upsert(&chunk.id, embedding);
            by_id.insert(chunk.id.clone(), chunk);
        }

        CachedIndex {
            embedder,
            scorer,
            chunks: by_id,
            built_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_tokenizer_english_words() {
        let tokens = CjkTokenizer.tokenize("Reset the API password");
        assert_eq!(tokens, vec!["reset", "the", "api", "password"]);
    }

    #[test]
    fn test_tokenizer_cjk_bigrams() {
        let tokens = CjkTokenizer.tokenize("密码重置");
        assert_eq!(tokens, vec!["密码", "码重", "重置"]);
    }

    #[test]
    fn test_tokenizer_mixed_and_short_tokens() {
        let tokens = CjkTokenizer.tokenize("A 密码 reset");
        // "A" is a single character and is dropped
        assert_eq!(tokens, vec!["密码", "reset"]);
    }

    #[test]
    fn test_tokenizer_falls_back_to_whitespace() {
        let tokens = CjkTokenizer.tokenize("x y");
        assert_eq!(tokens, vec!["x", "y"]);
    }

    async fn seed_chunk(store: &Store, doc_id: &str, index: i32, content: &str) {
        sqlx::query(
            "INSERT INTO chunks (id, doc_id, namespace, chunk_index, content, embedding_json, created_at)
             VALUES (?, ?, 'default', ?, ?, NULL, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(doc_id)
        .bind(index)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_empty() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        let retrieval = Bm25Retrieval::new(store, Duration::from_secs(300));

        let results = retrieval
            .search_by_namespace("密码重置", "default", 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_lexical_matches() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        store.ensure_default_domain().await.unwrap();

        let doc = Document::new("default", "guide.md", "content");
        store.insert_document(&doc).await.unwrap();
        seed_chunk(&store, &doc.id, 0, "如何重置账户密码").await;
        seed_chunk(&store, &doc.id, 1, "发票抬头如何修改").await;

        let retrieval = Bm25Retrieval::new(store, Duration::from_secs(300));
        let results = retrieval
            .search_by_namespace("密码重置", "default", 5)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn test_clear_cache_picks_up_new_chunks() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(&dir.path().join("test.db")).await.unwrap();
        store.ensure_default_domain().await.unwrap();

        let doc = Document::new("default", "guide.md", "content");
        store.insert_document(&doc).await.unwrap();

        let retrieval = Bm25Retrieval::new(store.clone(), Duration::from_secs(300));
        let before = retrieval
            .search_by_namespace("密码", "default", 5)
            .await
            .unwrap();
        assert!(before.is_empty());

        seed_chunk(&store, &doc.id, 0, "重置密码的步骤").await;
        // Still served from the stale cached index
        let stale = retrieval
            .search_by_namespace("密码", "default", 5)
            .await
            .unwrap();
        assert!(stale.is_empty());

        retrieval.clear_cache(Some("default"));
        let fresh = retrieval
            .search_by_namespace("密码", "default", 5)
            .await
            .unwrap();
        assert_eq!(fresh.len(), 1);
    }
}
