use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::elastic::{ElasticClient, ElasticError};
use crate::search::boosts::BoostConfiguration;
use crate::search::curation::{curation_id, Curation};
use crate::search::error::SearchResult;

/// Curations returned by a listing, at most
const MAX_CURATIONS: usize = 1000;

/// Persistence for relevance configuration.
///
/// Boost configurations are append-only versions read back by recency.
/// Curations are keyed by normalized query and overwritten on save.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Most recently saved boost configuration, if any
    async fn latest_boosts(&self) -> SearchResult<Option<BoostConfiguration>>;

    /// Persist a new version, stamping `updated_at`
    async fn save_boosts(&self, config: &BoostConfiguration) -> SearchResult<BoostConfiguration>;

    async fn get_curation(&self, normalized_query: &str) -> SearchResult<Option<Curation>>;

    /// All curations, most recently updated first
    async fn list_curations(&self) -> SearchResult<Vec<Curation>>;

    /// Create or overwrite, stamping `updated_at`
    async fn save_curation(&self, curation: &Curation) -> SearchResult<Curation>;

    /// Returns whether a curation existed
    async fn delete_curation(&self, normalized_query: &str) -> SearchResult<bool>;
}

fn is_missing_index(err: &ElasticError) -> bool {
    err.status() == Some(404)
}

/// Config store backed by the boosts and curations indices
#[derive(Clone)]
pub struct ElasticConfigStore {
    client: Arc<ElasticClient>,
}

impl ElasticConfigStore {
    pub fn new(client: Arc<ElasticClient>) -> Self {
        Self { client }
    }

    fn recent_first(size: usize) -> Value {
        json!({
            "size": size,
            "query": { "match_all": {} },
            "sort": [{ "updated_at": { "order": "desc" } }]
        })
    }
}

#[async_trait]
impl ConfigStore for ElasticConfigStore {
    async fn latest_boosts(&self) -> SearchResult<Option<BoostConfiguration>> {
        let index = &self.client.indices().search_boosts;
        let response = match self.client.search(index, &Self::recent_first(1)).await {
            Ok(response) => response,
            Err(e) if is_missing_index(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match response.hits.hits.into_iter().next() {
            Some(hit) => Ok(Some(serde_json::from_value(hit.source)?)),
            None => Ok(None),
        }
    }

    async fn save_boosts(&self, config: &BoostConfiguration) -> SearchResult<BoostConfiguration> {
        let mut stored = config.clone();
        stored.updated_at = Some(Utc::now());

        let index = &self.client.indices().search_boosts;
        let response = self
            .client
            .index_document(index, None, &serde_json::to_value(&stored)?, true)
            .await?;

        tracing::info!(
            version_id = %response.id,
            weights = stored.weights.len(),
            numeric_boosts = stored.numeric_boosts.len(),
            "Boost configuration saved"
        );
        Ok(stored)
    }

    async fn get_curation(&self, normalized_query: &str) -> SearchResult<Option<Curation>> {
        let index = &self.client.indices().curations;
        match self
            .client
            .get_document(index, &curation_id(normalized_query))
            .await?
        {
            Some(source) => Ok(Some(serde_json::from_value(source)?)),
            None => Ok(None),
        }
    }

    async fn list_curations(&self) -> SearchResult<Vec<Curation>> {
        let index = &self.client.indices().curations;
        let response = match self
            .client
            .search(index, &Self::recent_first(MAX_CURATIONS))
            .await
        {
            Ok(response) => response,
            Err(e) if is_missing_index(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut curations = Vec::with_capacity(response.hits.hits.len());
        for hit in response.hits.hits {
            match serde_json::from_value::<Curation>(hit.source) {
                Ok(curation) => curations.push(curation),
                Err(e) => tracing::warn!(id = %hit.id, error = %e, "Skipping malformed curation"),
            }
        }
        Ok(curations)
    }

    async fn save_curation(&self, curation: &Curation) -> SearchResult<Curation> {
        let mut stored = curation.clone();
        stored.updated_at = Some(Utc::now());

        let index = &self.client.indices().curations;
        self.client
            .index_document(
                index,
                Some(&stored.id()),
                &serde_json::to_value(&stored)?,
                true,
            )
            .await?;

        tracing::info!(query = %stored.query, pins = stored.pins.len(), "Curation saved");
        Ok(stored)
    }

    async fn delete_curation(&self, normalized_query: &str) -> SearchResult<bool> {
        let index = &self.client.indices().curations;
        let existed = self
            .client
            .delete_document(index, &curation_id(normalized_query), true)
            .await?;
        tracing::info!(query = %normalized_query, existed, "Curation deleted");
        Ok(existed)
    }
}

/// In-memory config store (for tests and local runs without a cluster)
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    boosts: Arc<RwLock<Vec<BoostConfiguration>>>,
    curations: Arc<DashMap<String, Curation>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn latest_boosts(&self) -> SearchResult<Option<BoostConfiguration>> {
        Ok(self.boosts.read().await.last().cloned())
    }

    async fn save_boosts(&self, config: &BoostConfiguration) -> SearchResult<BoostConfiguration> {
        let mut stored = config.clone();
        stored.updated_at = Some(Utc::now());
        self.boosts.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn get_curation(&self, normalized_query: &str) -> SearchResult<Option<Curation>> {
        Ok(self
            .curations
            .get(normalized_query)
            .map(|entry| entry.clone()))
    }

    async fn list_curations(&self) -> SearchResult<Vec<Curation>> {
        let mut curations: Vec<Curation> = self
            .curations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        curations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(curations)
    }

    async fn save_curation(&self, curation: &Curation) -> SearchResult<Curation> {
        let mut stored = curation.clone();
        stored.updated_at = Some(Utc::now());
        self.curations.insert(stored.query.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_curation(&self, normalized_query: &str) -> SearchResult<bool> {
        Ok(self.curations.remove(normalized_query).is_some())
    }
}
