//! Query command implementation
//!
//! One-shot retrieval against a single domain, without the chat
//! pipeline's classification or degradation.

use crate::config::Config;
use crate::embed::EmbeddingService;
use crate::error::{Error, Result};
use crate::rerank::RerankService;
use crate::retrieval::{Bm25Retrieval, HybridRetrieval, ScoredChunk, VectorRetrieval};
use crate::store::{Store, DEFAULT_NAMESPACE};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Domain to search (defaults to "default")
    pub namespace: Option<String>,
    /// Number of results
    pub top_k: Option<usize>,
    /// Vector weight override for hybrid fusion
    pub alpha: Option<f32>,
    /// Retrieval mode: "hybrid" (default), "vector", or "bm25"
    pub mode: Option<String>,
    /// Rerank fused candidates (requires rerank backend)
    pub rerank: bool,
    /// Only search chunks from files whose name contains this substring
    pub filename: Option<String>,
}

/// Query result for CLI display
#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub namespace: String,
    pub mode: String,
    pub results: Vec<ScoredChunk>,
}

/// Execute a one-shot query
pub async fn cmd_query(
    config: &Config,
    store: &Store,
    query: &str,
    options: QueryOptions,
) -> Result<QueryReport> {
    let namespace = options
        .namespace
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    if store.get_domain(&namespace).await?.is_none() {
        return Err(Error::DomainNotFound(namespace));
    }

    let top_k = options.top_k.unwrap_or(config.retrieval.top_k);
    let alpha = options.alpha.unwrap_or(config.retrieval.alpha);
    let mode = options.mode.unwrap_or_else(|| "hybrid".to_string());
    info!(namespace = %namespace, mode = %mode, "Querying: {}", query);

    let embeddings = Arc::new(EmbeddingService::from_config(&config.embedding)?);
    let vector = Arc::new(VectorRetrieval::new(store.clone(), embeddings));
    let bm25 = Arc::new(Bm25Retrieval::new(
        store.clone(),
        Duration::from_secs(config.retrieval.bm25_cache_ttl_secs),
    ));

    let results = match mode.as_str() {
        "vector" => {
            vector
                .search_chunks(
                    query,
                    top_k,
                    config.retrieval.similarity_threshold,
                    Some(&namespace),
                    None,
                    options.filename.as_deref(),
                )
                .await?
        }
        "bm25" => bm25.search_by_namespace(query, &namespace, top_k).await?,
        "hybrid" => {
            let rerank = if options.rerank && config.rerank.enabled {
                Some(Arc::new(RerankService::from_config(&config.rerank)?))
            } else {
                None
            };
            let use_rerank = rerank.is_some();
            let hybrid =
                HybridRetrieval::new(vector, bm25, rerank, config.retrieval.clone());
            hybrid
                .search_by_namespace(
                    query,
                    &namespace,
                    top_k,
                    alpha,
                    config.retrieval.use_rrf,
                    use_rerank,
                )
                .await?
        }
        other => {
            return Err(Error::Config(format!(
                "Unknown retrieval mode '{}': expected hybrid, vector, or bm25",
                other
            )))
        }
    };

    info!("Returning {} results", results.len());
    Ok(QueryReport {
        query: query.to_string(),
        namespace,
        mode,
        results,
    })
}

/// Print query results to console
pub fn print_query_results(report: &QueryReport) {
    println!(
        "\n🔍 Query: {} [{} / {}]\n",
        report.query, report.namespace, report.mode
    );
    println!("Found {} results:\n", report.results.len());

    for (i, r) in report.results.iter().enumerate() {
        println!("{}. [score: {:.3}] {}", i + 1, r.score, r.filename);

        let preview: String = r.content.chars().take(200).collect();
        let suffix = if r.content.chars().count() > 200 { "..." } else { "" };
        println!("   {}{}\n", preview.trim().replace('\n', " "), suffix);
    }
}
