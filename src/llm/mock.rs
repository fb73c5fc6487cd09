use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::provider::LanguageModel;
use crate::core::errors::ApiError;

const DIM: usize = 64;

/// Deterministic in-process model for tests.
///
/// Embeddings are a hashed bag-of-words, so texts sharing vocabulary score
/// higher under cosine similarity than unrelated texts. `failing()` yields a
/// provider whose capability calls always error, for atomicity tests.
pub struct MockModel {
    fail: bool,
    fail_generation: bool,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            fail: false,
            fail_generation: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            fail_generation: true,
        }
    }

    /// Embeds normally but fails on generation.
    pub fn failing_generation() -> Self {
        Self {
            fail: false,
            fail_generation: true,
        }
    }

    fn embed_one(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            v[(hasher.finish() % DIM as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(!self.fail)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if self.fail {
            return Err(ApiError::Embedding("mock embedding failure".to_string()));
        }
        Ok(inputs.iter().map(|t| Self::embed_one(t)).collect())
    }

    async fn generate(&self, _context: &str, question: &str) -> Result<String, ApiError> {
        if self.fail_generation {
            return Err(ApiError::Generation("mock generation failure".to_string()));
        }
        Ok(format!("mock answer: {}", question))
    }
}
