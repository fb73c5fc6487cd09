use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LanguageModel;
use crate::core::config::OllamaConfig;
use crate::core::errors::ApiError;

const PROMPT_TEMPLATE: &str = "You are a helpful AI assistant that answers questions based on the provided context from uploaded documents.\n\
Use the following pieces of context to answer the question at the end.\n\
If you don't know the answer or if it's not in the context, just say that you don't have enough information to answer, don't try to make up an answer.\n\
Always be specific and cite the relevant parts of the context in your answer.\n\n\
Context: {context}\n\n\
Question: {question}\n\n\
Answer: Let me help you with that based on the document.";

/// Ollama-backed embedding and generation provider.
#[derive(Clone)]
pub struct OllamaModel {
    config: OllamaConfig,
    client: Client,
}

impl OllamaModel {
    pub fn new(config: OllamaConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            config: OllamaConfig { base_url, ..config },
            client: Client::new(),
        }
    }

    fn build_prompt(context: &str, question: &str) -> String {
        PROMPT_TEMPLATE
            .replace("{context}", context)
            .replace("{question}", question)
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let mut embeddings = Vec::with_capacity(inputs.len());

        for input in inputs {
            let body = json!({
                "model": self.config.embed_model,
                "prompt": input,
            });

            let res = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ApiError::Embedding(e.to_string()))?;

            if !res.status().is_success() {
                let text = res.text().await.unwrap_or_default();
                return Err(ApiError::Embedding(format!("Ollama embed error: {}", text)));
            }

            let payload: Value = res
                .json()
                .await
                .map_err(|e| ApiError::Embedding(e.to_string()))?;

            let vector: Vec<f32> = payload["embedding"]
                .as_array()
                .ok_or_else(|| ApiError::Embedding("missing embedding in response".to_string()))?
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();

            if vector.is_empty() {
                return Err(ApiError::Embedding("empty embedding vector".to_string()));
            }

            embeddings.push(vector);
        }

        Ok(embeddings)
    }

    async fn generate(&self, context: &str, question: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = json!({
            "model": self.config.chat_model,
            "prompt": Self::build_prompt(context, question),
            "stream": false,
            "options": { "temperature": self.config.temperature },
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Generation(e.to_string()))?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Generation(format!(
                "Ollama generate error: {}",
                text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::Generation(e.to_string()))?;

        payload["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::Generation("missing response in payload".to_string()))
    }
}
