//! Relevance-tuned search over the health plan index
//!
//! This module turns a user query plus admin-managed relevance configuration
//! into a backend request, and post-processes the hits:
//!
//! - **Field weights**: per-field multipliers on the lexical `multi_match`
//! - **Numeric boosts**: `log`/`sigmoid` script functions over numeric or date fields
//! - **Curations**: pinned and excluded documents for exact queries
//! - **Semantic mode**: a `knn` clause over a precomputed query embedding
//! - **Facets and suggestions** for the search UI
//! - **Index maintenance**: versioned indices, alias moves and URL deduplication
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              SearchService                        │
//! │  search() facets() suggest() admin operations     │
//! └──────────────────────────────────────────────────┘
//!          │                 │                 │
//!          ▼                 ▼                 ▼
//! ┌────────────────┐ ┌───────────────┐ ┌──────────────┐
//! │ QueryComposer  │ │  ConfigStore  │ │  Embedding   │
//! │ (pure JSON)    │ │ boosts/curat. │ │  provider    │
//! └────────────────┘ └───────────────┘ └──────────────┘
//!          │                 │
//!          ▼                 ▼
//! ┌──────────────────────────────────────────────────┐
//! │              ElasticClient                        │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Fail-open config, fail-closed backend
//!
//! Relevance configuration is advisory. If the boost configuration cannot be
//! read, ranking uses default weights and no numeric boosts
//! ([`SearchService::load_boosts_fail_open`]). If the curation lookup fails,
//! no pinning happens ([`SearchService::load_curation_fail_open`]). If the
//! query embedding fails, the request is lexical only. Search event tracking
//! failures are ignored.
//!
//! The search call itself is not advisory: a backend failure is returned as
//! [`SearchError::Backend`] and surfaces as HTTP 502.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use health_plan_search::config::ElasticConfig;
//! use health_plan_search::elastic::ElasticClient;
//! use health_plan_search::search::{
//!     ElasticConfigStore, QueryComposer, SearchConfig, SearchQuery, SearchService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(ElasticClient::new(&ElasticConfig::default())?);
//!     let store = Arc::new(ElasticConfigStore::new(client.clone()));
//!     let service = SearchService::new(client, store, QueryComposer::new(SearchConfig::default()));
//!
//!     let response = service.search(SearchQuery::new("bronze plan texas")).await?;
//!     println!("Found {} plans", response.total);
//!
//!     Ok(())
//! }
//! ```

mod boosts;
mod config;
mod curation;
mod document;
mod error;
mod facets;
mod fields;
mod indices;
mod query;
mod service;
mod store;

pub use boosts::{BoostConfiguration, DecayType, NumericBoost};
pub use config::{DecayParams, SearchConfig, SearchConfigBuilder};
pub use curation::{curation_id, merge_with_curations, normalize_query, Curation};
pub use document::{extract_plan_name, HealthPlanDocument, Identified, SearchHit};
pub use error::{SearchError, SearchResult};
pub use facets::{FacetValue, FacetsResponse};
pub use fields::{FieldCatalog, FieldClass, FieldInfo};
pub use indices::{AliasAction, IndexAdmin, IndexSummary, DEDUP_FIELD, DEDUP_SORT_FIELD};
pub use query::{
    detect_state_from_query, ComposedRequest, QueryComposer, SearchFilters, SearchMode,
    SearchQuery, SortBy,
};
pub use service::{SearchEvent, SearchResponse, SearchService, Suggestion};
pub use store::{ConfigStore, ElasticConfigStore, InMemoryConfigStore};
