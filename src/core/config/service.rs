use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;
use crate::core::errors::ApiError;

/// Typed application configuration, loaded from `config.yml` in the data
/// directory. Missing file or missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub rag: RagConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Rebuild the index from the document snapshot at startup.
    pub restore_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks.
    pub chunk_overlap: usize,
    /// Retrieved chunks per question.
    pub top_k: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ollama: OllamaConfig::default(),
            rag: RagConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            max_upload_bytes: 50 * 1024 * 1024,
            restore_on_start: false,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3:8b".to_string(),
            temperature: 0.3,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
        }
    }
}

impl AppConfig {
    pub fn config_path(paths: &AppPaths) -> PathBuf {
        if let Ok(path) = env::var("DOCUCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        paths.data_dir.join("config.yml")
    }

    /// Load configuration, falling back to defaults when the file is absent.
    /// A malformed file is an error rather than a silent default.
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let path = Self::config_path(paths);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(ApiError::internal)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ApiError::Internal(format!("invalid config {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf());
        let config = AppConfig::load(&paths).unwrap();

        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.ollama.embed_model, "nomic-embed-text");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf());
        fs::write(
            AppConfig::config_path(&paths),
            "rag:\n  top_k: 6\nollama:\n  chat_model: mistral\n",
        )
        .unwrap();

        let config = AppConfig::load(&paths).unwrap();
        assert_eq!(config.rag.top_k, 6);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.ollama.chat_model, "mistral");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf());
        fs::write(AppConfig::config_path(&paths), ": not yaml [").unwrap();

        assert!(AppConfig::load(&paths).is_err());
    }
}
