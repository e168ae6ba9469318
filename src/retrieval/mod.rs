//! Retrieval over indexed chunks
//!
//! Four layers, each usable on its own:
//! - `VectorRetrieval`: embedding similarity over stored chunk vectors
//! - `Bm25Retrieval`: lexical BM25 with per-namespace in-memory indexes
//! - `HybridRetrieval`: both legs fused by RRF or weighted normalization,
//!   optionally reranked
//! - `CrossDomainRetrieval`: hybrid search fanned out across namespaces

mod bm25_search;
mod cross_domain;
mod hybrid;
mod vector;

pub use bm25_search::{Bm25Retrieval, CjkTokenizer};
pub use cross_domain::CrossDomainRetrieval;
pub use hybrid::{rrf_fuse, weighted_fuse, HybridRetrieval};
pub use vector::VectorRetrieval;

use crate::store::ChunkWithDoc;
use serde::Serialize;

/// A retrieved chunk with its relevance score.
///
/// The score's meaning depends on the producing layer (cosine similarity,
/// BM25, fused, or cross-encoder) and is only comparable within one result
/// list.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i32,
    pub content: String,
    pub filename: String,
    pub namespace: String,
    pub score: f32,
}

impl ScoredChunk {
    pub fn from_chunk(chunk: &ChunkWithDoc, score: f32) -> Self {
        Self {
            id: chunk.id.clone(),
            document_id: chunk.doc_id.clone(),
            chunk_index: chunk.chunk_index,
            content: chunk.content.clone(),
            filename: chunk.filename.clone(),
            namespace: chunk.namespace.clone(),
            score,
        }
    }
}

/// Cosine similarity between two vectors. Returns 0.0 for mismatched
/// lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub(crate) fn sort_by_score_desc(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
