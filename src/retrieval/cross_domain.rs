use super::{sort_by_score_desc, HybridRetrieval, ScoredChunk};
use crate::classify::ClassificationResult;
use crate::error::Result;
use crate::store::DomainCatalog;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const PRIMARY_DOMAIN_WEIGHT: f32 = 2.0;
const ALTERNATIVE_BASE_WEIGHT: f32 = 0.5;

/// Hybrid search fanned out across namespaces.
///
/// Each namespace is searched concurrently; a failing namespace is
/// excluded rather than failing the whole search. Results are re-scored
/// with a rank-based boost weighted per domain, deduplicated, and merged.
pub struct CrossDomainRetrieval {
    hybrid: Arc<HybridRetrieval>,
    domains: Arc<DomainCatalog>,
}

impl CrossDomainRetrieval {
    pub fn new(hybrid: Arc<HybridRetrieval>, domains: Arc<DomainCatalog>) -> Self {
        Self { hybrid, domains }
    }

    pub async fn search_across_domains(
        &self,
        query: &str,
        namespaces: Option<Vec<String>>,
        top_k: usize,
        domain_weights: Option<HashMap<String, f32>>,
        alpha: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let namespaces = match namespaces {
            Some(list) => list,
            None => self
                .domains
                .active()
                .await?
                .into_iter()
                .map(|d| d.namespace)
                .collect(),
        };
        if namespaces.is_empty() {
            return Ok(Vec::new());
        }
        let weights = domain_weights.unwrap_or_default();

        let searches = namespaces.iter().map(|ns| {
            let hybrid = self.hybrid.clone();
            async move {
                let result = hybrid
                    .search_by_namespace(query, ns, top_k * 2, alpha, true, false)
                    .await;
                (ns.clone(), result)
            }
        });

        let mut per_namespace = Vec::with_capacity(namespaces.len());
        for (namespace, result) in join_all(searches).await {
            match result {
                Ok(chunks) => per_namespace.push((namespace, chunks)),
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "Namespace search failed, excluding");
                }
            }
        }

        let merged = merge_namespace_results(per_namespace, &weights, top_k);
        debug!(
            searched = namespaces.len(),
            returned = merged.len(),
            "Cross-domain search complete"
        );
        Ok(merged)
    }

    /// Weight the classified domain ahead of its alternatives. Unlisted
    /// namespaces keep an implicit weight of 1.0.
    pub fn calculate_domain_weights(classification: &ClassificationResult) -> HashMap<String, f32> {
        let mut weights = HashMap::new();
        weights.insert(classification.namespace.clone(), PRIMARY_DOMAIN_WEIGHT);
        for alternative in &classification.alternatives {
            weights
                .entry(alternative.namespace.clone())
                .or_insert(ALTERNATIVE_BASE_WEIGHT + alternative.confidence);
        }
        weights
    }
}

/// Blend each chunk's own score with a weighted rank boost, then merge
/// namespaces keeping the best-scoring copy of any duplicate chunk.
fn merge_namespace_results(
    per_namespace: Vec<(String, Vec<ScoredChunk>)>,
    weights: &HashMap<String, f32>,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let mut best: HashMap<String, ScoredChunk> = HashMap::new();
    for (namespace, chunks) in per_namespace {
        let weight = weights.get(&namespace).copied().unwrap_or(1.0);
        for (rank, mut chunk) in chunks.into_iter().enumerate() {
            let rank_score = weight / (rank + 1) as f32;
            chunk.score = (chunk.score + rank_score) / 2.0;
            match best.get(&chunk.id) {
                Some(existing) if existing.score >= chunk.score => {}
                _ => {
                    best.insert(chunk.id.clone(), chunk);
                }
            }
        }
    }

    let mut merged: Vec<ScoredChunk> = best.into_values().collect();
    sort_by_score_desc(&mut merged);
    merged.truncate(top_k);
    merged
}
