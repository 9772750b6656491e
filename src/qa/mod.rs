//! QA validation of a search deployment.
//!
//! [`QaEngine`] checks the backend and the running application in fixed
//! stages and aggregates the outcome into a [`ValidationReport`]. Reports can
//! be rendered as markdown ([`render_markdown`]) and kept in a history index
//! ([`ReportStore`]). [`DataQualityAnalyzer`] runs corpus-wide aggregation
//! checks and reports them the same way.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use health_plan_search::config::ElasticConfig;
//! use health_plan_search::elastic::ElasticClient;
//! use health_plan_search::qa::{render_markdown, QaConfig, QaEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(ElasticClient::new(&ElasticConfig::default())?);
//!     let engine = QaEngine::new(client, QaConfig::default());
//!
//!     let report = engine.run_full_validation(Some("staging")).await;
//!     println!("{}", render_markdown(&report));
//!     Ok(())
//! }
//! ```

pub mod checks;
mod config;
mod data_quality;
mod engine;
mod error;
mod history;
mod models;
mod report;

pub use config::{EndpointCheck, QaConfig};
pub use data_quality::DataQualityAnalyzer;
pub use engine::QaEngine;
pub use error::{QaError, ReportResult};
pub use history::ReportStore;
pub use models::{QaResult, QaStatus, ReportSummary, ValidationReport};
pub use report::render_markdown;
