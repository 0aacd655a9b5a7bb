use storage::error::{ScoringError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImporterError>;

#[derive(Error, Debug)]
pub enum ImporterError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error on line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("Failed to serialize JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Scoring error: {0}")]
    ScoringError(#[from] ScoringError),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ImporterError {
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            reason: reason.into(),
        }
    }
}
