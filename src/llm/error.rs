use crate::error::AppError;

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Errors from the embedding and chat completion endpoints
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("No API key configured")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected LLM response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Integration {
            integration_source: "llm".to_string(),
            message: err.to_string(),
        }
    }
}
