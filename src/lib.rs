//! Relevancy-tuned health plan document search with QA validation.
//!
//! - [`search`]: query composition with field weights, numeric boosts,
//!   curations and semantic retrieval, plus facets and suggestions
//! - [`qa`]: staged validation of the backend and the running application
//! - [`llm`]: optional query embeddings and result summaries
//! - [`api`]: the axum HTTP surface over both
//! - [`elastic`]: the shared Elasticsearch REST client

pub mod api;
pub mod config;
pub mod elastic;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod qa;
pub mod search;

pub use error::{AppError, Result};
