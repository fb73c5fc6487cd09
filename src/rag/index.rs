//! Nearest-neighbor index over chunk embeddings.
//!
//! Exact cosine scan. Chunks and their vectors are stored side by side and
//! only mutated together, so the index can never answer from embeddings that
//! drifted from their chunk texts.

use serde::{Deserialize, Serialize};

use super::chunker::Chunk;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, ApiError> {
        if chunks.len() != vectors.len() {
            return Err(ApiError::Internal(format!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }
        Ok(Self { chunks, vectors })
    }

    pub fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<(), ApiError> {
        if chunks.len() != vectors.len() {
            return Err(ApiError::Internal(format!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }
        self.chunks.extend(chunks);
        self.vectors.extend(vectors);
        Ok(())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top-k chunks by cosine similarity, ties broken by insertion order.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<&Chunk> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        scored.into_iter().map(|(i, _)| &self.chunks[i]).collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
