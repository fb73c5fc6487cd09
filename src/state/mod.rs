//! Shared application state wired together at startup.

pub mod error;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::config::{AppConfig, AppPaths};
use crate::history::SessionStore;
use crate::llm::ollama::OllamaModel;
use crate::llm::LanguageModel;
use crate::rag::RagEngine;
use error::InitializationError;

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub model: Arc<dyn LanguageModel>,
    pub engine: Mutex<RagEngine>,
    pub sessions: Mutex<SessionStore>,
}

impl AppState {
    /// Build the full state from the discovered data directory: load config,
    /// construct the model client, the engine and the session store, and
    /// optionally restore the index from the last document snapshot.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = AppConfig::load(&paths).map_err(InitializationError::Config)?;

        let model: Arc<dyn LanguageModel> = Arc::new(OllamaModel::new(config.ollama.clone()));
        match model.health_check().await {
            Ok(true) => tracing::info!("Model backend reachable: {}", model.name()),
            Ok(false) | Err(_) => tracing::warn!(
                "Model backend not reachable at startup; uploads and chat will fail until it is"
            ),
        }

        let mut engine = RagEngine::new(&paths, config.rag.clone());
        if config.server.restore_on_start {
            match engine.restore(model.as_ref()).await {
                Ok(true) => tracing::info!("Restored previous document session"),
                Ok(false) => tracing::info!("No previous document session to restore"),
                Err(err) => tracing::warn!("Session restore failed, starting empty: {}", err),
            }
        }

        let sessions = SessionStore::load(paths.history_path.clone())
            .map_err(InitializationError::History)?;

        Ok(Self::from_parts(paths, config, model, engine, sessions))
    }

    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: AppConfig,
        model: Arc<dyn LanguageModel>,
        engine: RagEngine,
        sessions: SessionStore,
    ) -> Arc<Self> {
        Arc::new(Self {
            paths,
            config,
            model,
            engine: Mutex::new(engine),
            sessions: Mutex::new(sessions),
        })
    }
}
