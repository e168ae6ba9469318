//! Default values for configuration

/// Default embedding backend URL
pub fn default_embedding_backend_url() -> String {
    std::env::var("ARCHIVIST_EMBEDDING_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "BAAI/bge-small-zh-v1.5".to_string()
}

/// Default embedding dimension
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding cache capacity (entries)
pub fn default_embedding_cache_size() -> usize {
    1024
}

/// Default LLM backend URL
pub fn default_llm_backend_url() -> String {
    std::env::var("ARCHIVIST_LLM_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// Default LLM model
pub fn default_llm_model() -> String {
    "qwen2.5-7b-instruct".to_string()
}

/// Default LLM temperature for classification and rewriting
pub fn default_llm_temperature() -> f32 {
    0.3
}

/// Default LLM max tokens
pub fn default_llm_max_tokens() -> u32 {
    1024
}

/// Default reranker backend URL
pub fn default_rerank_backend_url() -> String {
    std::env::var("ARCHIVIST_RERANK_BACKEND_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default reranker model (cross-encoder)
pub fn default_rerank_model() -> String {
    "BAAI/bge-reranker-base".to_string()
}

/// Default: reranker disabled
pub fn default_rerank_enabled() -> bool {
    false
}

/// Default reranker batch size
pub fn default_rerank_batch_size() -> usize {
    32
}

/// Default: query rewriting enabled
pub fn default_rewrite_enabled() -> bool {
    true
}

/// Default number of history turns given to the rewriter
pub fn default_rewrite_max_history() -> usize {
    5
}

/// Default classification mode
pub fn default_classify_mode() -> String {
    "hybrid".to_string()
}

/// Confidence at or above which a single-domain search is trusted
pub fn default_route_threshold() -> f32 {
    0.6
}

/// Keyword confidence at or above which the hybrid classifier skips the LLM
pub fn default_keyword_shortcut_threshold() -> f32 {
    0.7
}

/// Keyword confidence below which cross-domain fallback is flagged
pub fn default_keyword_fallback_threshold() -> f32 {
    0.5
}

/// Confidence assigned when classification falls back to the default domain
pub fn default_default_confidence() -> f32 {
    0.3
}

/// Bonus added when keyword and LLM classifiers agree
pub fn default_agreement_bonus() -> f32 {
    0.2
}

/// Confidence assigned to an inherited previous-turn domain
pub fn default_inherited_confidence() -> f32 {
    0.7
}

/// Default number of retrieval results
pub fn default_retrieval_top_k() -> usize {
    5
}

/// Default vector weight in hybrid fusion
pub fn default_retrieval_alpha() -> f32 {
    0.5
}

/// Standard RRF smoothing constant
pub fn default_rrf_k() -> f32 {
    60.0
}

/// Default minimum cosine similarity for vector retrieval
pub fn default_similarity_threshold() -> f32 {
    0.2
}

/// Default: fuse with RRF rather than weighted scores
pub fn default_use_rrf() -> bool {
    true
}

/// Default BM25 index cache TTL in seconds
pub fn default_bm25_cache_ttl_secs() -> u64 {
    300
}

/// Default domain/rule catalog cache TTL in seconds
pub fn default_catalog_ttl_secs() -> u64 {
    300
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    1500
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    300
}
