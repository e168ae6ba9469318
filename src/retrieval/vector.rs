use super::{cosine_similarity, sort_by_score_desc, ScoredChunk};
use crate::embed::EmbeddingService;
use crate::error::Result;
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, warn};

/// Embedding-similarity retrieval over stored chunk vectors.
///
/// Scores the full candidate set with batched cosine similarity, takes a
/// pool of `2 * top_k` best candidates, then applies the similarity
/// threshold before the final cut. Thresholding the pool rather than the
/// whole set keeps a weak corpus from returning nothing when a few
/// borderline chunks exist.
pub struct VectorRetrieval {
    store: Store,
    embeddings: Arc<EmbeddingService>,
}

impl VectorRetrieval {
    pub fn new(store: Store, embeddings: Arc<EmbeddingService>) -> Self {
        Self { store, embeddings }
    }

    pub async fn search_chunks(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
        namespace: Option<&str>,
        document_ids: Option<&[String]>,
        filename_filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embeddings.embed_one(query).await?;
        let chunks = self
            .store
            .list_chunks_filtered(namespace, document_ids, filename_filter)
            .await?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut skipped = 0usize;
        let mut scored: Vec<ScoredChunk> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let Some(embedding) = chunk.embedding() else {
                skipped += 1;
                continue;
            };
            let similarity = cosine_similarity(&query_vector, &embedding);
            scored.push(ScoredChunk::from_chunk(chunk, similarity));
        }
        if skipped > 0 {
            warn!(
                skipped,
                total = chunks.len(),
                "Skipped chunks with missing or unparseable embeddings"
            );
        }

        sort_by_score_desc(&mut scored);
        scored.truncate(top_k * 2);
        scored.retain(|c| c.score >= similarity_threshold);
        scored.truncate(top_k);

        debug!(
            query_chars = query.chars().count(),
            candidates = chunks.len(),
            returned = scored.len(),
            "Vector search complete"
        );
        Ok(scored)
    }
}
