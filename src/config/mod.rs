//! Configuration management for archivist
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// LLM completion backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Reranker configuration
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Query rewriting configuration
    #[serde(default)]
    pub rewrite: RewriteConfig,

    /// Domain classification configuration
    #[serde(default)]
    pub classify: ClassifyConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend base URL
    #[serde(default = "default_embedding_backend_url")]
    pub backend_url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// LRU cache capacity (entries, keyed by content hash)
    #[serde(default = "default_embedding_cache_size")]
    pub cache_size: usize,
}

/// LLM completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend base URL
    #[serde(default = "default_llm_backend_url")]
    pub backend_url: String,

    /// Model name/identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature for classification and rewriting
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

/// Reranker configuration (cross-encoder over fused candidates)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Enable reranking of fused retrieval candidates
    #[serde(default = "default_rerank_enabled")]
    pub enabled: bool,

    /// Backend base URL
    #[serde(default = "default_rerank_backend_url")]
    pub backend_url: String,

    /// Cross-encoder model name
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Scoring batch size
    #[serde(default = "default_rerank_batch_size")]
    pub batch_size: usize,
}

/// Query rewriting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Rewrite follow-up queries from chat history
    #[serde(default = "default_rewrite_enabled")]
    pub enabled: bool,

    /// Number of recent history turns given to the rewriter
    #[serde(default = "default_rewrite_max_history")]
    pub max_history: usize,
}

/// Domain classification configuration.
///
/// The thresholds here are the primary recall/cost tuning surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Classification mode: "keyword", "llm", or "hybrid"
    #[serde(default = "default_classify_mode")]
    pub mode: String,

    /// Confidence at or above which a single-domain search is used
    #[serde(default = "default_route_threshold")]
    pub route_threshold: f32,

    /// Keyword confidence at or above which hybrid skips the LLM call
    #[serde(default = "default_keyword_shortcut_threshold")]
    pub keyword_shortcut_threshold: f32,

    /// Keyword confidence below which cross-domain fallback is flagged
    #[serde(default = "default_keyword_fallback_threshold")]
    pub keyword_fallback_threshold: f32,

    /// Confidence assigned to the default-domain fallback
    #[serde(default = "default_default_confidence")]
    pub default_confidence: f32,

    /// Bonus applied when keyword and LLM classifiers agree
    #[serde(default = "default_agreement_bonus")]
    pub agreement_bonus: f32,

    /// Confidence assigned when inheriting the previous turn's domain
    #[serde(default = "default_inherited_confidence")]
    pub inherited_confidence: f32,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results
    #[serde(default = "default_retrieval_top_k")]
    pub top_k: usize,

    /// Vector weight in hybrid fusion (0.0 = BM25 only, 1.0 = vector only)
    #[serde(default = "default_retrieval_alpha")]
    pub alpha: f32,

    /// RRF smoothing constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Minimum cosine similarity for vector results
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Fuse with RRF (true) or weighted normalized scores (false)
    #[serde(default = "default_use_rrf")]
    pub use_rrf: bool,

    /// BM25 per-namespace index cache TTL in seconds
    #[serde(default = "default_bm25_cache_ttl_secs")]
    pub bm25_cache_ttl_secs: u64,

    /// Domain/rule catalog cache TTL in seconds
    #[serde(default = "default_catalog_ttl_secs")]
    pub catalog_ttl_secs: u64,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_max_chars")]
    pub max_chars: usize,

    /// Overlap characters between chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for archivist data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend_url: default_embedding_backend_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            cache_size: default_embedding_cache_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend_url: default_llm_backend_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: default_rerank_enabled(),
            backend_url: default_rerank_backend_url(),
            model: default_rerank_model(),
            batch_size: default_rerank_batch_size(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: default_rewrite_enabled(),
            max_history: default_rewrite_max_history(),
        }
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            mode: default_classify_mode(),
            route_threshold: default_route_threshold(),
            keyword_shortcut_threshold: default_keyword_shortcut_threshold(),
            keyword_fallback_threshold: default_keyword_fallback_threshold(),
            default_confidence: default_default_confidence(),
            agreement_bonus: default_agreement_bonus(),
            inherited_confidence: default_inherited_confidence(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_retrieval_top_k(),
            alpha: default_retrieval_alpha(),
            rrf_k: default_rrf_k(),
            similarity_threshold: default_similarity_threshold(),
            use_rrf: default_use_rrf(),
            bm25_cache_ttl_secs: default_bm25_cache_ttl_secs(),
            catalog_ttl_secs: default_catalog_ttl_secs(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_max_chars(),
            overlap_chars: default_chunk_overlap(),
        }
    }
}

impl Config {
    /// Get the default base directory for archivist (~/.archivist)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".archivist")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("archivist.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("archivist.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        fn unit_range(name: &str, value: f32) -> Result<()> {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
            Ok(())
        }

        unit_range("retrieval.alpha", self.retrieval.alpha)?;
        unit_range(
            "retrieval.similarity_threshold",
            self.retrieval.similarity_threshold,
        )?;
        unit_range("classify.route_threshold", self.classify.route_threshold)?;
        unit_range(
            "classify.keyword_shortcut_threshold",
            self.classify.keyword_shortcut_threshold,
        )?;
        unit_range(
            "classify.keyword_fallback_threshold",
            self.classify.keyword_fallback_threshold,
        )?;
        unit_range(
            "classify.default_confidence",
            self.classify.default_confidence,
        )?;
        unit_range(
            "classify.inherited_confidence",
            self.classify.inherited_confidence,
        )?;

        if !matches!(self.classify.mode.as_str(), "keyword" | "llm" | "hybrid") {
            return Err(Error::Config(format!(
                "classify.mode must be one of keyword/llm/hybrid, got '{}'",
                self.classify.mode
            )));
        }

        if self.chunk.overlap_chars >= self.chunk.max_chars {
            return Err(Error::Config(
                "chunk.overlap_chars must be < chunk.max_chars".to_string(),
            ));
        }

        if self.retrieval.rrf_k <= 0.0 {
            return Err(Error::Config(
                "retrieval.rrf_k must be positive".to_string(),
            ));
        }

        if self.embedding.cache_size == 0 {
            return Err(Error::Config(
                "embedding.cache_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.classify.mode, "hybrid");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.retrieval.top_k = 12;
        config.classify.mode = "keyword".to_string();

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.retrieval.top_k, 12);
        assert_eq!(loaded.classify.mode, "keyword");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.chunk.overlap_chars = config.chunk.max_chars;
        assert!(config.validate().is_err());

        config.chunk.overlap_chars = 300;
        assert!(config.validate().is_ok());

        config.retrieval.alpha = 1.5;
        assert!(config.validate().is_err());
        config.retrieval.alpha = 0.5;

        config.classify.mode = "oracle".to_string();
        assert!(config.validate().is_err());
    }
}
