//! Chat search command implementation
//!
//! Wires the full conversational pipeline together from config and
//! runs one request through it.

use crate::chat::{
    Bm25Strategy, ChatOrchestrator, ChatSearchRequest, ChatSearchResponse, HybridStrategy,
    RetrievalStrategy, VectorOnlyStrategy,
};
use crate::classify::{create_classifier, Classifier};
use crate::config::Config;
use crate::embed::EmbeddingService;
use crate::error::Result;
use crate::llm::{create_llm_client, LlmClient};
use crate::rerank::RerankService;
use crate::retrieval::{Bm25Retrieval, CrossDomainRetrieval, HybridRetrieval, VectorRetrieval};
use crate::rewrite::QueryRewriter;
use crate::store::{DomainCatalog, RuleCatalog, Store};
use crate::telemetry::StoreLogSink;
use std::sync::Arc;
use std::time::Duration;

/// Run one chat search request through the full pipeline
pub async fn cmd_chat_search(
    config: &Config,
    store: &Store,
    request: ChatSearchRequest,
) -> Result<ChatSearchResponse> {
    let catalog_ttl = Duration::from_secs(config.retrieval.catalog_ttl_secs);
    let domains = Arc::new(DomainCatalog::new(store.clone(), catalog_ttl));
    let rules = Arc::new(RuleCatalog::new(store.clone(), catalog_ttl));

    let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
    let classifier: Arc<dyn Classifier> = Arc::from(create_classifier(
        &config.classify,
        domains.clone(),
        rules,
        llm.clone(),
    )?);

    let rewriter = config
        .rewrite
        .enabled
        .then(|| Arc::new(QueryRewriter::new(llm, config.rewrite.clone())));

    let embeddings = Arc::new(EmbeddingService::from_config(&config.embedding)?);
    let vector = Arc::new(VectorRetrieval::new(store.clone(), embeddings));
    let bm25 = Arc::new(Bm25Retrieval::new(
        store.clone(),
        Duration::from_secs(config.retrieval.bm25_cache_ttl_secs),
    ));
    let rerank = if config.rerank.enabled {
        Some(Arc::new(RerankService::from_config(&config.rerank)?))
    } else {
        None
    };
    let hybrid = Arc::new(HybridRetrieval::new(
        vector,
        bm25.clone(),
        rerank,
        config.retrieval.clone(),
    ));
    let cross_domain = Arc::new(CrossDomainRetrieval::new(hybrid.clone(), domains));

    let strategies: Vec<Arc<dyn RetrievalStrategy>> = vec![
        Arc::new(HybridStrategy::new(
            hybrid.clone(),
            config.retrieval.alpha,
            config.retrieval.use_rrf,
            config.rerank.enabled,
        )),
        Arc::new(VectorOnlyStrategy::new(hybrid)),
        Arc::new(Bm25Strategy::new(bm25)),
    ];

    let orchestrator = ChatOrchestrator::new(
        classifier,
        rewriter,
        strategies,
        cross_domain,
        Arc::new(StoreLogSink::new(store.clone())),
        config.classify.clone(),
        config.retrieval.clone(),
    );

    Ok(orchestrator.search_for_chat(request).await)
}

/// Print a chat search response to console
pub fn print_chat_response(response: &ChatSearchResponse) {
    if let Some(classification) = response.metadata.get("classification") {
        let namespace = classification
            .get("namespace")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        let confidence = classification
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let method = classification
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        println!(
            "\nDomain: {} (confidence {:.2}, via {})",
            namespace, confidence, method
        );
    }
    if let Some(mode) = response.metadata.get("retrieval_mode").and_then(|v| v.as_str()) {
        println!("Mode: {}", mode);
    }
    if let Some(error) = response.metadata.get("error").and_then(|v| v.as_str()) {
        println!("Note: {}", error);
    }

    println!("\nFound {} sources:\n", response.sources.len());
    for (i, source) in response.sources.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            source.similarity,
            source.filename,
            source.namespace.as_deref().unwrap_or("?")
        );
        let preview: String = source.content.chars().take(200).collect();
        println!("   {}\n", preview.trim().replace('\n', " "));
    }
}
