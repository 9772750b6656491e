use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::elastic::ElasticClient;
use crate::llm::EmbeddingProvider;
use crate::metrics::{CONFIG_FALLBACKS_TOTAL, SEARCH_DURATION_SECONDS, SEARCH_REQUESTS_TOTAL};
use crate::search::boosts::BoostConfiguration;
use crate::search::curation::{merge_with_curations, normalize_query, Curation};
use crate::search::document::{Identified, SearchHit};
use crate::search::error::{SearchError, SearchResult};
use crate::search::facets::{self, FacetsResponse};
use crate::search::fields::FieldCatalog;
use crate::search::query::{
    detect_state_from_query, QueryComposer, SearchFilters, SearchMode, SearchQuery,
};
use crate::search::store::ConfigStore;

/// Completion options requested from the suggest index
const SUGGEST_SIZE: usize = 8;

/// One page of curated, ranked results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: u64,
    pub page: usize,
    pub limit: usize,
    pub query: String,
    pub filters: SearchFilters,
    pub mode: SearchMode,
    /// Whether the knn branch took part in ranking
    pub semantic_applied: bool,
    /// Pinned documents found on this page
    pub pinned: usize,
    pub took_ms: u64,
}

/// Analytics record written after each search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEvent {
    pub search_query: String,
    pub filters: SearchFilters,
    pub timestamp: DateTime<Utc>,
    pub result_count: usize,
    pub search_duration_ms: u64,
    pub mode: SearchMode,
}

/// Completion suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Search orchestration over the content index.
///
/// Reads relevance configuration fresh on every call, so an admin save is
/// visible to the next search.
pub struct SearchService {
    client: Arc<ElasticClient>,
    store: Arc<dyn ConfigStore>,
    composer: QueryComposer,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
}

impl SearchService {
    pub fn new(
        client: Arc<ElasticClient>,
        store: Arc<dyn ConfigStore>,
        composer: QueryComposer,
    ) -> Self {
        Self {
            client,
            store,
            composer,
            embeddings: None,
        }
    }

    /// Enable the semantic branch with a query embedding provider
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    pub fn composer(&self) -> &QueryComposer {
        &self.composer
    }

    /// Active boost configuration, or the identity configuration when none is
    /// stored or the store cannot be read.
    pub async fn load_boosts_fail_open(&self) -> BoostConfiguration {
        match self.store.latest_boosts().await {
            Ok(Some(config)) => config,
            Ok(None) => BoostConfiguration::default(),
            Err(e) => {
                warn!(error = %e, "Boost configuration unavailable, using defaults");
                CONFIG_FALLBACKS_TOTAL.with_label_values(&["boosts"]).inc();
                BoostConfiguration::default()
            }
        }
    }

    /// Curation for the query text, or `None` when absent or unreadable
    pub async fn load_curation_fail_open(&self, text: &str) -> Option<Curation> {
        let normalized = normalize_query(text);
        if normalized.is_empty() {
            return None;
        }
        match self.store.get_curation(&normalized).await {
            Ok(curation) => curation,
            Err(e) => {
                warn!(query = %normalized, error = %e, "Curation lookup failed, skipping pins");
                CONFIG_FALLBACKS_TOTAL.with_label_values(&["curation"]).inc();
                None
            }
        }
    }

    async fn query_vector(&self, query: &SearchQuery) -> Option<Vec<f32>> {
        if !query.mode.uses_vectors() || query.text.trim().is_empty() {
            return None;
        }
        let provider = self.embeddings.as_ref()?;
        match provider.embed(query.text.trim()).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, searching lexically");
                CONFIG_FALLBACKS_TOTAL.with_label_values(&["embedding"]).inc();
                None
            }
        }
    }

    /// Run a search: compose, execute, then apply the curation for the query.
    ///
    /// Configuration problems degrade ranking; a backend failure on the
    /// search call is returned as [`SearchError::Backend`].
    pub async fn search(&self, mut query: SearchQuery) -> SearchResult<SearchResponse> {
        self.composer.check_result_window(&query)?;
        let start = Instant::now();
        let mode_label = query.mode.to_string();

        if self.composer.config().auto_detect_state && query.filters.state.is_none() {
            if let Some(state) = detect_state_from_query(&query.text) {
                debug!(state, query = %query.text, "Detected state in query");
                query.filters.state = Some(state.to_string());
            }
        }

        let boosts = self.load_boosts_fail_open().await;
        let vector = self.query_vector(&query).await;
        let composed = self
            .composer
            .build_search_request(&query, &boosts, vector.as_deref());

        let index = &self.client.indices().health_plans;
        let response = match self.client.search(index, &composed.body).await {
            Ok(response) => response,
            Err(e) => {
                SEARCH_REQUESTS_TOTAL
                    .with_label_values(&[mode_label.as_str(), "error"])
                    .inc();
                warn!(error = %e, query = %query.text, "Search backend call failed");
                return Err(SearchError::Backend(e));
            }
        };

        let total = response.total();
        let hits: Vec<SearchHit> = response.hits.hits.iter().map(SearchHit::from_raw).collect();

        let curation = self.load_curation_fail_open(&query.text).await;
        let results = merge_with_curations(hits, curation.as_ref(), composed.size);
        let pinned = curation
            .as_ref()
            .map(|c| {
                results
                    .iter()
                    .take_while(|hit| c.pins.iter().any(|p| p == hit.identity()))
                    .count()
            })
            .unwrap_or(0);

        let elapsed = start.elapsed();
        SEARCH_DURATION_SECONDS.observe(elapsed.as_secs_f64());
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&[mode_label.as_str(), "success"])
            .inc();

        let took_ms = elapsed.as_millis() as u64;
        if self.composer.config().track_events {
            self.track_event(&query, results.len(), took_ms).await;
        }

        info!(
            query = %query.text,
            mode = %query.mode,
            total,
            returned = results.len(),
            pinned,
            semantic = composed.semantic_applied,
            tuned = !boosts.is_identity(),
            took_ms,
            "Search completed"
        );

        Ok(SearchResponse {
            results,
            total,
            page: query.page.max(1),
            limit: composed.size,
            query: query.text,
            filters: query.filters,
            mode: query.mode,
            semantic_applied: composed.semantic_applied,
            pinned,
            took_ms,
        })
    }

    async fn track_event(&self, query: &SearchQuery, result_count: usize, took_ms: u64) {
        let event = SearchEvent {
            search_query: query.text.clone(),
            filters: query.filters.clone(),
            timestamp: Utc::now(),
            result_count,
            search_duration_ms: took_ms,
            mode: query.mode,
        };
        let body = match serde_json::to_value(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to encode search event");
                return;
            }
        };
        let index = &self.client.indices().search_events;
        if let Err(e) = self.client.index_document(index, None, &body, false).await {
            debug!(error = %e, "Failed to record search event");
        }
    }

    /// Facet counts for the query, unfiltered. Blank text counts everything.
    pub async fn facets(&self, text: &str) -> SearchResult<FacetsResponse> {
        let body = json!({
            "size": 0,
            "query": self.composer.text_clause(text, &BoostConfiguration::default()),
            "aggs": facets::aggregations(),
        });
        let index = &self.client.indices().health_plans;
        let response = self.client.search(index, &body).await?;
        Ok(response
            .aggregations
            .as_ref()
            .map(facets::format_facets)
            .unwrap_or_default())
    }

    /// Completion suggestions for a prefix; empty on any failure
    pub async fn suggest(&self, prefix: &str) -> Vec<Suggestion> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Vec::new();
        }

        let body = json!({
            "size": 0,
            "suggest": {
                "plan_suggest": {
                    "prefix": prefix,
                    "completion": {
                        "field": "suggest",
                        "fuzzy": { "fuzziness": 1 },
                        "size": SUGGEST_SIZE
                    }
                }
            }
        });

        let index = &self.client.indices().suggest;
        let response = match self.client.search(index, &body).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Suggest failed");
                return Vec::new();
            }
        };

        response
            .suggest
            .as_ref()
            .and_then(|s| s.pointer("/plan_suggest/0/options"))
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|o| {
                        Some(Suggestion {
                            text: o.get("text")?.as_str()?.to_string(),
                            payload: o.pointer("/_source/payload").cloned(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tunable fields of the content index, resolving an alias to its first index
    pub async fn resolve_field_catalog(&self) -> SearchResult<FieldCatalog> {
        let name = &self.client.indices().health_plans;
        let concrete = self
            .client
            .resolve_alias(name)
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| name.clone());

        let mapping = self.client.get_mapping(&concrete).await?;
        let catalog = FieldCatalog::from_mapping_response(&mapping).ok_or_else(|| {
            SearchError::SchemaError(format!("Empty mapping response for '{}'", concrete))
        })?;

        debug!(index = %catalog.index, fields = catalog.fields.len(), "Resolved field catalog");
        Ok(catalog)
    }

    /// Validate and persist a new boost configuration version
    pub async fn save_boosts(&self, config: BoostConfiguration) -> SearchResult<BoostConfiguration> {
        config.validate()?;
        self.store.save_boosts(&config).await
    }

    pub async fn list_curations(&self) -> SearchResult<Vec<Curation>> {
        self.store.list_curations().await
    }

    pub async fn save_curation(
        &self,
        query: &str,
        pins: Vec<String>,
        excludes: Vec<String>,
    ) -> SearchResult<Curation> {
        let curation = Curation::new(query, pins, excludes)?;
        self.store.save_curation(&curation).await
    }

    pub async fn delete_curation(&self, query: &str) -> SearchResult<()> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(SearchError::InvalidCuration("query is required".to_string()));
        }
        if self.store.delete_curation(&normalized).await? {
            Ok(())
        } else {
            Err(SearchError::CurationNotFound(normalized))
        }
    }
}
