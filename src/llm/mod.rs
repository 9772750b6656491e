//! Optional LLM integrations: query embeddings and result summaries.
//!
//! Both are best-effort. Without an API key the search runs lexically and
//! summaries come from a deterministic template.

mod embeddings;
mod error;
mod summary;

pub use embeddings::{EmbeddingProvider, OpenAiEmbeddings};
pub use error::{LlmError, LlmResult};
pub use summary::{cache_key, fallback_summary, Summary, SummaryInput, SummaryService, SummarySource};
