use async_trait::async_trait;

use crate::core::errors::ApiError;

/// External model capabilities consumed by the retrieval pipeline.
///
/// `embed` turns text into fixed-length vectors, `generate` answers a
/// question against retrieved context. Both are blocking capability calls
/// from the pipeline's point of view: no retries, no partial results.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// return the provider name (e.g. "ollama", "mock")
    fn name(&self) -> &str;

    /// check if the provider is healthy/reachable
    async fn health_check(&self) -> Result<bool, ApiError>;

    /// generate embeddings, one vector per input text
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    /// answer a question given retrieved context
    async fn generate(&self, context: &str, question: &str) -> Result<String, ApiError>;
}
