pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::Config;
use crate::elastic::ElasticClient;
use crate::error::Result;
use crate::llm::{OpenAiEmbeddings, SummaryService};
use crate::qa::{DataQualityAnalyzer, QaEngine, ReportStore};
use crate::search::{ElasticConfigStore, IndexAdmin, QueryComposer, SearchService};
use std::sync::Arc;

/// Shared application state
///
/// Every component holds the same `Arc<ElasticClient>`, so the whole process
/// uses one connection pool.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: Arc<ElasticClient>,
    pub search: Arc<SearchService>,
    pub qa: Arc<QaEngine>,
    pub reports: Arc<ReportStore>,
    pub data_quality: Arc<DataQualityAnalyzer>,
    pub summaries: Arc<SummaryService>,
    pub indices: Arc<IndexAdmin>,
}

impl AppState {
    /// Wire every service from configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let client = Arc::new(ElasticClient::new(&config.elasticsearch)?);

        let store = Arc::new(ElasticConfigStore::new(client.clone()));
        let mut search = SearchService::new(
            client.clone(),
            store,
            QueryComposer::new(config.search.clone()),
        );
        match OpenAiEmbeddings::from_config(&config.llm)? {
            Some(provider) => {
                tracing::info!(model = %config.llm.embedding_model, "Semantic search enabled");
                search = search.with_embeddings(Arc::new(provider));
            }
            None => tracing::info!("No LLM API key configured, semantic search runs lexically"),
        }

        let qa = QaEngine::new(client.clone(), config.qa.clone());
        let reports = ReportStore::new(client.clone());
        let data_quality = DataQualityAnalyzer::new(client.clone(), config.qa.environment.clone())
            .with_collapse_field(config.search.collapse_field.clone());
        let indices = IndexAdmin::new(client.clone());
        let summaries = SummaryService::new(&config.llm)?;

        Ok(Self {
            config: Arc::new(config),
            client,
            search: Arc::new(search),
            qa: Arc::new(qa),
            reports: Arc::new(reports),
            data_quality: Arc::new(data_quality),
            summaries: Arc::new(summaries),
            indices: Arc::new(indices),
        })
    }
}
