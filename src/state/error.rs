use thiserror::Error;

use crate::core::errors::ApiError;

/// Failures that abort startup before the server binds.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("failed to load configuration: {0}")]
    Config(#[source] ApiError),
    #[error("failed to load chat history: {0}")]
    History(#[source] ApiError),
}
