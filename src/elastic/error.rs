//! Error types for search backend calls

use crate::error::AppError;

/// Result type for backend operations
pub type ElasticResult<T> = std::result::Result<T, ElasticError>;

/// Errors raised while talking to the Elasticsearch REST API
#[derive(Debug, thiserror::Error)]
pub enum ElasticError {
    /// Connection refused, DNS failure, TLS failure
    #[error("Backend unreachable: {0}")]
    Transport(String),

    /// The request exceeded the configured client timeout
    #[error("Backend request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the cluster
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected JSON shape
    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    /// Endpoint or path could not be turned into a URL
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ElasticError {
    /// Status code returned by the cluster, if the request reached it
    pub fn status(&self) -> Option<u16> {
        match self {
            ElasticError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ElasticError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ElasticError::Timeout(err.to_string())
        } else if err.is_decode() {
            ElasticError::Decode(err.to_string())
        } else {
            ElasticError::Transport(err.to_string())
        }
    }
}

impl From<ElasticError> for AppError {
    fn from(err: ElasticError) -> Self {
        match err {
            ElasticError::Timeout(msg) => AppError::Timeout(msg),
            ElasticError::InvalidUrl(msg) => AppError::Configuration(msg),
            other => AppError::Integration {
                integration_source: "elasticsearch".to_string(),
                message: other.to_string(),
            },
        }
    }
}
