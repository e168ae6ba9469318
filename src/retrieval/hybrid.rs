use super::{sort_by_score_desc, Bm25Retrieval, ScoredChunk, VectorRetrieval};
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::rerank::RerankService;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reciprocal rank fusion of a vector leg and a BM25 leg.
///
/// Each document scores `alpha / (k + rank_v) + (1 - alpha) / (k + rank_b)`
/// with 1-based ranks; a document absent from a leg contributes nothing
/// for that leg.
pub fn rrf_fuse(
    vector: &[ScoredChunk],
    bm25: &[ScoredChunk],
    alpha: f32,
    k: f32,
) -> Vec<ScoredChunk> {
    let mut fused: HashMap<&str, (f32, &ScoredChunk)> = HashMap::new();
    for (rank, chunk) in vector.iter().enumerate() {
        let contribution = alpha / (k + (rank + 1) as f32);
        fused
            .entry(chunk.id.as_str())
            .and_modify(|(score, _)| *score += contribution)
            .or_insert((contribution, chunk));
    }
    for (rank, chunk) in bm25.iter().enumerate() {
        let contribution = (1.0 - alpha) / (k + (rank + 1) as f32);
        fused
            .entry(chunk.id.as_str())
            .and_modify(|(score, _)| *score += contribution)
            .or_insert((contribution, chunk));
    }

    let mut results: Vec<ScoredChunk> = fused
        .into_values()
        .map(|(score, chunk)| {
            let mut merged = chunk.clone();
            merged.score = score;
            merged
        })
        .collect();
    sort_by_score_desc(&mut results);
    results
}

/// Combine the two legs. An empty leg passes the other through untouched;
/// fusion math only runs when both legs contributed.
fn fuse_legs(
    vector: &[ScoredChunk],
    bm25: &[ScoredChunk],
    alpha: f32,
    use_rrf: bool,
    k: f32,
) -> Vec<ScoredChunk> {
    if vector.is_empty() {
        return bm25.to_vec();
    }
    if bm25.is_empty() {
        return vector.to_vec();
    }
    if use_rrf {
        rrf_fuse(vector, bm25, alpha, k)
    } else {
        weighted_fuse(vector, bm25, alpha)
    }
}

/// Score-weighted fusion: each leg's scores are min-max normalized to
/// [0, 1], then blended as `alpha * vector + (1 - alpha) * bm25`.
pub fn weighted_fuse(vector: &[ScoredChunk], bm25: &[ScoredChunk], alpha: f32) -> Vec<ScoredChunk> {
    fn normalized(chunks: &[ScoredChunk]) -> HashMap<&str, (f32, &ScoredChunk)> {
        let min = chunks.iter().map(|c| c.score).fold(f32::INFINITY, f32::min);
        let max = chunks
            .iter()
            .map(|c| c.score)
            .fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;
        chunks
            .iter()
            .map(|c| {
                let norm = if range > 0.0 { (c.score - min) / range } else { 1.0 };
                (c.id.as_str(), (norm, c))
            })
            .collect()
    }

    let vector_norm = normalized(vector);
    let bm25_norm = normalized(bm25);

    let mut fused: HashMap<&str, (f32, &ScoredChunk)> = HashMap::new();
    for (id, (norm, chunk)) in vector_norm {
        fused.insert(id, (alpha * norm, chunk));
    }
    for (id, (norm, chunk)) in bm25_norm {
        let contribution = (1.0 - alpha) * norm;
        fused
            .entry(id)
            .and_modify(|(score, _)| *score += contribution)
            .or_insert((contribution, chunk));
    }

    let mut results: Vec<ScoredChunk> = fused
        .into_values()
        .map(|(score, chunk)| {
            let mut merged = chunk.clone();
            merged.score = score;
            merged
        })
        .collect();
    sort_by_score_desc(&mut results);
    results
}

/// Hybrid retrieval over one namespace.
///
/// Runs the vector and BM25 legs concurrently, fuses them, and optionally
/// reranks the fused pool. A failing leg degrades to an empty contribution
/// instead of failing the search.
pub struct HybridRetrieval {
    vector: Arc<VectorRetrieval>,
    bm25: Arc<Bm25Retrieval>,
    rerank: Option<Arc<RerankService>>,
    cfg: RetrievalConfig,
}

impl HybridRetrieval {
    pub fn new(
        vector: Arc<VectorRetrieval>,
        bm25: Arc<Bm25Retrieval>,
        rerank: Option<Arc<RerankService>>,
        cfg: RetrievalConfig,
    ) -> Self {
        Self {
            vector,
            bm25,
            rerank,
            cfg,
        }
    }

    pub async fn search_by_namespace(
        &self,
        query: &str,
        namespace: &str,
        top_k: usize,
        alpha: f32,
        use_rrf: bool,
        use_rerank: bool,
    ) -> Result<Vec<ScoredChunk>> {
        let reranking = use_rerank && self.rerank.is_some();
        let pool = top_k * if reranking { 3 } else { 2 };

        let (vector_leg, bm25_leg) = tokio::join!(
            self.vector.search_chunks(
                query,
                pool,
                self.cfg.similarity_threshold,
                Some(namespace),
                None,
                None,
            ),
            self.bm25.search_by_namespace(query, namespace, pool),
        );

        let vector_results = match vector_leg {
            Ok(results) => results,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Vector leg failed, fusing BM25 only");
                Vec::new()
            }
        };
        let bm25_results = match bm25_leg {
            Ok(results) => results,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "BM25 leg failed, fusing vector only");
                Vec::new()
            }
        };
        if vector_results.is_empty() && bm25_results.is_empty() {
            return Ok(Vec::new());
        }

        let mut fused = fuse_legs(
            &vector_results,
            &bm25_results,
            alpha,
            use_rrf,
            self.cfg.rrf_k,
        );
        debug!(
            namespace = %namespace,
            vector = vector_results.len(),
            bm25 = bm25_results.len(),
            fused = fused.len(),
            use_rrf,
            "Hybrid legs fused"
        );

        if reranking {
            if let Some(rerank) = &self.rerank {
                fused.truncate(pool);
                return Ok(rerank.rerank(query, fused, top_k).await);
            }
        }
        fused.truncate(top_k);
        Ok(fused)
    }
}
