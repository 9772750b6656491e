//! Error types for QA report persistence and history

use crate::elastic::ElasticError;
use crate::error::AppError;

pub type ReportResult<T> = std::result::Result<T, QaError>;

/// Errors raised outside the validation run itself.
///
/// Checks never return these; a failing check is recorded as a `fail` result.
#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("Report store unavailable: {0}")]
    Backend(#[from] ElasticError),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Failed to encode report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        match err {
            QaError::Backend(inner) => inner.into(),
            QaError::InvalidInput(msg) => AppError::Validation(msg),
            QaError::Serialization(e) => AppError::Serialization(e.to_string()),
        }
    }
}
