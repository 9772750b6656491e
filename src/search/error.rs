//! Error types for search operations

use crate::elastic::ElasticError;
use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The backend is unreachable or rejected the composed request
    #[error("Search execution failed: {0}")]
    Backend(#[from] ElasticError),

    /// Admin submitted an invalid boost configuration
    #[error("Invalid boost configuration: {0}")]
    InvalidBoosts(String),

    /// Requested page lies beyond the result window
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Admin submitted an invalid curation
    #[error("Invalid curation: {0}")]
    InvalidCuration(String),

    /// Index or alias name outside the managed namespace
    #[error("Invalid index request: {0}")]
    InvalidIndex(String),

    /// Maintenance target does not exist
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Curation lookup for a query that has none
    #[error("Curation not found: {0}")]
    CurationNotFound(String),

    /// Index mapping could not be interpreted
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Stored configuration document has an unexpected shape
    #[error("Malformed configuration document: {0}")]
    MalformedDocument(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::MalformedDocument(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Backend(ElasticError::Timeout(msg)) => AppError::Timeout(msg),
            SearchError::Backend(inner) => AppError::SearchUnavailable(inner.to_string()),
            SearchError::InvalidBoosts(msg)
            | SearchError::InvalidCuration(msg)
            | SearchError::InvalidPage(msg)
            | SearchError::InvalidIndex(msg) => AppError::Validation(msg),
            SearchError::IndexNotFound(index) => {
                AppError::NotFound(format!("Index '{}' not found", index))
            }
            SearchError::CurationNotFound(query) => {
                AppError::NotFound(format!("No curation for query '{}'", query))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}
