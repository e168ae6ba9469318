//! Cross-encoder reranking of retrieval candidates
//!
//! Reranking is always best-effort: any backend failure degrades to the
//! caller's original order so retrieval is never blocked.

mod http_backend;

pub use http_backend::*;

use crate::config::RerankConfig;
use crate::error::Result;
use crate::retrieval::ScoredChunk;
use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

/// One reranked document: index into the submitted list plus its score
#[derive(Debug, Clone)]
pub struct RerankResult {
    pub index: usize,
    pub score: f32,
}

/// Trait for cross-encoder backends
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, documents: Vec<String>) -> Result<Vec<RerankResult>>;
    fn model_name(&self) -> &str;
}

/// Create a reranker backend based on configuration
pub fn create_reranker(config: &RerankConfig) -> Result<Box<dyn Reranker>> {
    let reranker = HttpReranker::new(config)?;
    Ok(Box::new(reranker))
}

/// Best-effort reranking service over a backend.
pub struct RerankService {
    backend: Box<dyn Reranker>,
    batch_size: usize,
}

impl RerankService {
    pub fn new(backend: Box<dyn Reranker>, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &RerankConfig) -> Result<Self> {
        let backend = create_reranker(config)?;
        Ok(Self::new(backend, config.batch_size))
    }

    /// Rerank chunks against a query, returning the top `top_k` by
    /// cross-encoder score. A single chunk short-circuits at score 1.0.
    /// On backend failure the original order is returned, truncated.
    pub async fn rerank(
        &self,
        query: &str,
        chunks: Vec<ScoredChunk>,
        top_k: usize,
    ) -> Vec<ScoredChunk> {
        if chunks.is_empty() {
            return chunks;
        }
        if chunks.len() == 1 {
            let mut only = chunks;
            only[0].score = 1.0;
            return only;
        }

        match self.score_all(query, &chunks).await {
            Ok(mut scored) => {
                scored.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut ordered = Vec::with_capacity(top_k.min(chunks.len()));
                for result in scored {
                    if let Some(chunk) = chunks.get(result.index) {
                        let mut reranked = chunk.clone();
                        reranked.score = result.score;
                        ordered.push(reranked);
                    }
                }
                ordered.truncate(top_k);
                ordered
            }
            Err(e) => {
                warn!(error = %e, "Reranker failed, returning fusion order");
                let mut passthrough = chunks;
                passthrough.truncate(top_k);
                passthrough
            }
        }
    }

    /// Rerank several (query, chunks) lanes independently; a failing lane
    /// degrades on its own without affecting the others.
    pub async fn rerank_batch(
        &self,
        lanes: Vec<(String, Vec<ScoredChunk>)>,
        top_k: usize,
    ) -> Vec<Vec<ScoredChunk>> {
        let futures = lanes
            .into_iter()
            .map(|(query, chunks)| async move { self.rerank(&query, chunks, top_k).await });
        join_all(futures).await
    }

    async fn score_all(&self, query: &str, chunks: &[ScoredChunk]) -> Result<Vec<RerankResult>> {
        let documents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut all = Vec::with_capacity(documents.len());

        for (batch_index, batch) in documents.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let results = self.backend.rerank(query, batch.to_vec()).await?;
            all.extend(results.into_iter().map(|r| RerankResult {
                index: r.index + offset,
                score: r.score,
            }));
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn chunk(id: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            chunk_index: 0,
            content: format!("content of {}", id),
            filename: "file.md".to_string(),
            namespace: "ns".to_string(),
            score,
        }
    }

    struct FixedScores(Vec<f32>);

    #[async_trait]
    impl Reranker for FixedScores {
        async fn rerank(&self, _query: &str, documents: Vec<String>) -> Result<Vec<RerankResult>> {
            Ok((0..documents.len())
                .map(|i| RerankResult {
                    index: i,
                    score: self.0[i],
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Reranker for AlwaysFails {
        async fn rerank(&self, _query: &str, _documents: Vec<String>) -> Result<Vec<RerankResult>> {
            Err(Error::Embedding("model unavailable".to_string()))
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_rerank_orders_by_score_and_truncates() {
        let service = RerankService::new(
            Box::new(FixedScores(vec![0.9, 0.7, 0.8, 0.6, 0.5])),
            32,
        );
        let chunks = vec![
            chunk("a", 0.0),
            chunk("b", 0.0),
            chunk("c", 0.0),
            chunk("d", 0.0),
            chunk("e", 0.0),
        ];

        let reranked = service.rerank("query", chunks, 3).await;

        assert_eq!(reranked.len(), 3);
        let scores: Vec<f32> = reranked.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7]);
        let ids: Vec<&str> = reranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_single_chunk_short_circuits() {
        let service = RerankService::new(Box::new(AlwaysFails), 32);
        let reranked = service.rerank("query", vec![chunk("only", 0.4)], 5).await;

        // No backend call is made for a single candidate
        assert_eq!(reranked.len(), 1);
        assert_eq!(reranked[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_original_order() {
        let service = RerankService::new(Box::new(AlwaysFails), 32);
        let chunks = vec![chunk("a", 0.3), chunk("b", 0.2), chunk("c", 0.1)];

        let reranked = service.rerank("query", chunks, 2).await;

        assert_eq!(reranked.len(), 2);
        assert_eq!(reranked[0].id, "a");
        assert_eq!(reranked[1].id, "b");
    }

    #[tokio::test]
    async fn test_rerank_batch_isolates_failing_lane() {
        let service = RerankService::new(Box::new(FixedScores(vec![0.2, 0.9])), 32);
        let lanes = vec![
            ("q1".to_string(), vec![chunk("a", 0.0), chunk("b", 0.0)]),
            ("q2".to_string(), Vec::new()),
        ];

        let results = service.rerank_batch(lanes, 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0][0].id, "b");
        assert!(results[1].is_empty());
    }
}
