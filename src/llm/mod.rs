pub mod ollama;
pub mod provider;

#[cfg(test)]
pub mod mock;

pub use ollama::OllamaModel;
pub use provider::LanguageModel;
