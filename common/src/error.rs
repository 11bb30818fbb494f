use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Transient fetch error: {0}")]
    Fetch(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Ingestion Processing error: {0}")]
    Processing(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// True for failures worth retrying on a later run: network hiccups,
    /// timeouts and store trouble. Validation and duplicate outcomes are
    /// deterministic, retrying cannot change them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Fetch(_) | AppError::Database(_) | AppError::OpenAI(_) | AppError::Io(_)
        )
    }
}
