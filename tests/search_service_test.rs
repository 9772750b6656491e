//! SearchService against a mocked cluster: configuration loading, curations,
//! fail-open fallbacks and admin operations

mod common;

use async_trait::async_trait;
use health_plan_search::error::AppError;
use health_plan_search::llm::{EmbeddingProvider, LlmResult};
use health_plan_search::search::{
    BoostConfiguration, ConfigStore, DecayType, ElasticConfigStore, Identified,
    InMemoryConfigStore, NumericBoost, QueryComposer, SearchConfig, SearchConfigBuilder,
    SearchError, SearchMode, SearchQuery, SearchService,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn quiet_config() -> SearchConfig {
    SearchConfigBuilder::new().track_events(false).build()
}

fn elastic_service(endpoint: &str) -> SearchService {
    let client = common::client(endpoint);
    let store = Arc::new(ElasticConfigStore::new(client.clone()));
    SearchService::new(client, store, QueryComposer::new(quiet_config()))
}

struct FixedEmbeddings(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedEmbeddings {
    async fn embed(&self, _text: &str) -> LlmResult<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn model(&self) -> &str {
        "fixed"
    }
}

#[tokio::test]
async fn test_stored_weights_reach_the_backend_request() {
    let mut server = Server::new_async().await;
    let boosts = server
        .mock("POST", "/search-boosts/_search")
        .with_status(200)
        .with_body(common::search_response(
            &[json!({ "weights": { "plan_name": 3.0 }, "numeric_boosts": [] })],
            1,
        ))
        .create_async()
        .await;
    let search = server
        .mock("POST", "/health-plans/_search")
        .match_body(Matcher::PartialJson(json!({
            "query": { "bool": {
                "must": [{ "multi_match": { "query": "texas", "fields": ["plan_name^3"] } }],
                "filter": [{ "term": { "state.keyword": "TX" } }]
            }}
        })))
        .with_status(200)
        .with_body(common::search_response(
            &[common::plan("https://plans.example.com/tx-gold.pdf", "Texas Gold")],
            1,
        ))
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/search-curations/_doc/".to_string()))
        .with_status(404)
        .with_body(r#"{"found": false}"#)
        .create_async()
        .await;

    let service = elastic_service(&server.url());
    let response = service
        .search(SearchQuery::new("texas").with_mode(SearchMode::Keyword))
        .await
        .unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.filters.state.as_deref(), Some("TX"));
    assert_eq!(response.results[0].display_name, "Texas Gold");
    assert_eq!(response.pinned, 0);
    boosts.assert_async().await;
    search.assert_async().await;
}

#[tokio::test]
async fn test_curation_pins_and_order() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/search-boosts/_search")
        .with_status(404)
        .with_body(r#"{"error": {"type": "index_not_found_exception"}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/health-plans/_search")
        .with_status(200)
        .with_body(common::search_response(
            &[
                common::plan("urlC", "Bronze C"),
                common::plan("urlA", "Bronze A"),
                common::plan("urlD", "Bronze D"),
            ],
            3,
        ))
        .create_async()
        .await;
    let curation = server
        .mock("GET", "/search-curations/_doc/YnJvbnplIHBsYW4=")
        .with_status(200)
        .with_body(
            json!({
                "_id": "YnJvbnplIHBsYW4=",
                "found": true,
                "_source": { "query": "bronze plan", "pins": ["urlA", "urlB"] }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let service = elastic_service(&server.url());
    let response = service
        .search(SearchQuery::new("  Bronze Plan ").with_mode(SearchMode::Keyword))
        .await
        .unwrap();

    let order: Vec<&str> = response.results.iter().map(|hit| hit.identity()).collect();
    assert_eq!(order, vec!["urlA", "urlC", "urlD"]);
    assert_eq!(response.pinned, 1);
    curation.assert_async().await;
}

#[tokio::test]
async fn test_unreadable_configuration_fails_open() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/search-boosts/_search")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/search-curations/_doc/".to_string()))
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    let search = server
        .mock("POST", "/health-plans/_search")
        .match_body(Matcher::PartialJson(json!({
            "query": { "bool": { "must": [{ "multi_match": { "fields": ["plan_name^1"] } }] } }
        })))
        .with_status(200)
        .with_body(common::search_response(
            &[common::plan("urlX", "Silver X"), common::plan("urlY", "Silver Y")],
            2,
        ))
        .create_async()
        .await;

    let service = elastic_service(&server.url());
    let response = service
        .search(SearchQuery::new("silver").with_mode(SearchMode::Keyword))
        .await
        .unwrap();

    let order: Vec<&str> = response.results.iter().map(|hit| hit.identity()).collect();
    assert_eq!(order, vec!["urlX", "urlY"]);
    search.assert_async().await;
}

#[tokio::test]
async fn test_backend_failure_is_surfaced() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/search-boosts/_search")
        .with_status(200)
        .with_body(common::empty_search_response())
        .create_async()
        .await;
    server
        .mock("POST", "/health-plans/_search")
        .with_status(503)
        .with_body(r#"{"error": "unavailable"}"#)
        .create_async()
        .await;

    let service = elastic_service(&server.url());
    let err = service
        .search(SearchQuery::new("gold").with_mode(SearchMode::Keyword))
        .await
        .unwrap_err();

    assert!(matches!(err, SearchError::Backend(_)));
    let app_err: AppError = err.into();
    assert_eq!(app_err.status_code().as_u16(), 502);
    assert_eq!(app_err.error_code(), "SEARCH_FAILED");
}

#[tokio::test]
async fn test_event_tracking_failure_is_ignored() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/search-boosts/_search")
        .with_status(200)
        .with_body(common::empty_search_response())
        .create_async()
        .await;
    server
        .mock("POST", "/health-plans/_search")
        .with_status(200)
        .with_body(common::search_response(&[common::plan("urlA", "Gold A")], 1))
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/search-curations/_doc/".to_string()))
        .with_status(404)
        .with_body(r#"{"found": false}"#)
        .create_async()
        .await;
    let events = server
        .mock("POST", "/search-events/_doc")
        .with_status(500)
        .with_body("disk full")
        .create_async()
        .await;

    let client = common::client(&server.url());
    let store = Arc::new(ElasticConfigStore::new(client.clone()));
    let service = SearchService::new(client, store, QueryComposer::new(SearchConfig::default()));

    let response = service
        .search(SearchQuery::new("gold").with_mode(SearchMode::Keyword))
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    events.assert_async().await;
}

#[tokio::test]
async fn test_semantic_search_sends_knn() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/search-boosts/_search")
        .with_status(200)
        .with_body(common::empty_search_response())
        .create_async()
        .await;
    let search = server
        .mock("POST", "/health-plans/_search")
        .match_body(Matcher::PartialJson(json!({
            "query": { "bool": {
                "should": [{}, { "knn": { "field": "semantic_vector", "query_vector": [0.5, 0.25] } }],
                "minimum_should_match": 1
            }}
        })))
        .with_status(200)
        .with_body(common::empty_search_response())
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/search-curations/_doc/".to_string()))
        .with_status(404)
        .with_body(r#"{"found": false}"#)
        .create_async()
        .await;

    let client = common::client(&server.url());
    let store = Arc::new(InMemoryConfigStore::new());
    let service = SearchService::new(client, store, QueryComposer::new(quiet_config()))
        .with_embeddings(Arc::new(FixedEmbeddings(vec![0.5, 0.25])));

    let response = service
        .search(SearchQuery::new("low deductible").with_mode(SearchMode::Semantic))
        .await
        .unwrap();
    assert!(response.semantic_applied);
    search.assert_async().await;
}

#[tokio::test]
async fn test_boost_round_trip_through_memory_store() {
    let server = Server::new_async().await;
    let client = common::client(&server.url());
    let store = Arc::new(InMemoryConfigStore::new());
    let service = SearchService::new(client, store.clone(), QueryComposer::new(quiet_config()));

    assert!(service.load_boosts_fail_open().await.is_identity());

    let config = BoostConfiguration::default()
        .with_weight("plan_name", 3.0)
        .with_numeric_boost(NumericBoost::new("premium", DecayType::Log, 0.5));
    let saved = service.save_boosts(config.clone()).await.unwrap();
    assert!(saved.updated_at.is_some());

    let loaded = service.load_boosts_fail_open().await;
    assert_eq!(loaded.weights, config.weights);
    assert_eq!(loaded.numeric_boosts, config.numeric_boosts);
    assert_eq!(store.latest_boosts().await.unwrap().unwrap().weight("plan_name"), 3.0);
}

#[tokio::test]
async fn test_invalid_boosts_rejected_before_storage() {
    let server = Server::new_async().await;
    let store = Arc::new(InMemoryConfigStore::new());
    let service = SearchService::new(
        common::client(&server.url()),
        store.clone(),
        QueryComposer::new(quiet_config()),
    );

    let err = service
        .save_boosts(BoostConfiguration::default().with_weight("plan_name", -1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidBoosts(_)));
    assert!(store.latest_boosts().await.unwrap().is_none());
}

#[tokio::test]
async fn test_curation_admin_lifecycle() {
    let server = Server::new_async().await;
    let service = SearchService::new(
        common::client(&server.url()),
        Arc::new(InMemoryConfigStore::new()),
        QueryComposer::new(quiet_config()),
    );

    let saved = service
        .save_curation(
            "Bronze Plan",
            vec!["urlA".to_string(), "urlA".to_string(), "urlB".to_string()],
            vec![],
        )
        .await
        .unwrap();
    assert_eq!(saved.query, "bronze plan");
    assert_eq!(saved.pins, vec!["urlA", "urlB"]);
    assert_eq!(service.list_curations().await.unwrap().len(), 1);

    let overlap = service
        .save_curation("bronze plan", vec!["urlA".to_string()], vec!["urlA".to_string()])
        .await;
    assert!(matches!(overlap, Err(SearchError::InvalidCuration(_))));

    service.delete_curation("BRONZE PLAN").await.unwrap();
    assert!(service.list_curations().await.unwrap().is_empty());
    assert!(matches!(
        service.delete_curation("bronze plan").await,
        Err(SearchError::CurationNotFound(_))
    ));
}

#[tokio::test]
async fn test_field_catalog_resolves_alias() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/_alias/health-plans")
        .with_status(200)
        .with_body(json!({ "health-plans-v2": { "aliases": { "health-plans": {} } } }).to_string())
        .create_async()
        .await;
    let mapping = server
        .mock("GET", "/health-plans-v2/_mapping")
        .with_status(200)
        .with_body(
            json!({
                "health-plans-v2": { "mappings": { "properties": {
                    "plan_name": { "type": "text" },
                    "premium": { "type": "float" },
                    "updated_at": { "type": "date" },
                    "semantic_vector": { "type": "dense_vector" }
                }}}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let service = elastic_service(&server.url());
    let catalog = service.resolve_field_catalog().await.unwrap();

    assert_eq!(catalog.index, "health-plans-v2");
    let text: Vec<&str> = catalog.text_weightable().map(|f| f.name.as_str()).collect();
    let numeric: Vec<&str> = catalog.numeric_boostable().map(|f| f.name.as_str()).collect();
    assert_eq!(text, vec!["plan_name"]);
    assert!(numeric.contains(&"premium"));
    assert!(numeric.contains(&"updated_at"));
    assert!(!catalog.contains("semantic_vector"));
    mapping.assert_async().await;
}

#[tokio::test]
async fn test_suggest_parses_options_and_swallows_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/health-plans-suggest/_search")
        .match_body(Matcher::PartialJson(json!({
            "suggest": { "plan_suggest": { "prefix": "gol" } }
        })))
        .with_status(200)
        .with_body(
            json!({
                "took": 1,
                "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] },
                "suggest": { "plan_suggest": [{ "text": "gol", "options": [
                    { "text": "Gold 1000", "_source": { "payload": { "plan_id": "123" } } },
                    { "text": "Gold Plus" }
                ]}]}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let service = elastic_service(&server.url());
    let suggestions = service.suggest("gol").await;
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].text, "Gold 1000");
    assert_eq!(suggestions[0].payload, Some(json!({ "plan_id": "123" })));
    assert!(suggestions[1].payload.is_none());

    // No mock for this prefix: the server answers 501
    assert!(service.suggest("xyz").await.is_empty());
}

#[tokio::test]
async fn test_elastic_store_writes_boost_versions() {
    let mut server = Server::new_async().await;
    let save = server
        .mock("POST", "/search-boosts/_doc")
        .match_query(Matcher::UrlEncoded("refresh".to_string(), "wait_for".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "weights": { "plan_name": 3.0 },
            "numeric_boosts": [{ "field": "premium", "type": "log", "factor": 0.5 }]
        })))
        .with_status(201)
        .with_body(common::index_created("v7"))
        .create_async()
        .await;

    let store = ElasticConfigStore::new(common::client(&server.url()));
    let config = BoostConfiguration::default()
        .with_weight("plan_name", 3.0)
        .with_numeric_boost(NumericBoost::new("premium", DecayType::Log, 0.5));
    let stored = store.save_boosts(&config).await.unwrap();

    assert!(stored.updated_at.is_some());
    assert_eq!(stored.weights, config.weights);
    save.assert_async().await;
}

#[tokio::test]
async fn test_elastic_store_curation_writes() {
    let mut server = Server::new_async().await;
    let put = server
        .mock("PUT", "/search-curations/_doc/YnJvbnplIHBsYW4=")
        .match_query(Matcher::UrlEncoded("refresh".to_string(), "wait_for".to_string()))
        .match_body(Matcher::PartialJson(json!({
            "query": "bronze plan",
            "pins": ["https://plans.example.com/a.pdf"],
            "excludes": ["https://plans.example.com/b.pdf"]
        })))
        .with_status(201)
        .with_body(common::index_created("YnJvbnplIHBsYW4="))
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/search-curations/_doc/YnJvbnplIHBsYW4=")
        .match_query(Matcher::UrlEncoded("refresh".to_string(), "wait_for".to_string()))
        .with_status(200)
        .with_body(r#"{"result": "deleted"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("DELETE", "/search-curations/_doc/YnJvbnplIHBsYW4=")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"result": "not_found"}"#)
        .create_async()
        .await;

    let store = ElasticConfigStore::new(common::client(&server.url()));
    let curation = health_plan_search::search::Curation::new(
        "  Bronze Plan ",
        vec!["https://plans.example.com/a.pdf".to_string()],
        vec!["https://plans.example.com/b.pdf".to_string()],
    )
    .unwrap();
    let stored = store.save_curation(&curation).await.unwrap();
    assert_eq!(stored.query, "bronze plan");
    assert!(stored.updated_at.is_some());
    put.assert_async().await;

    assert!(store.delete_curation("bronze plan").await.unwrap());
    assert!(!store.delete_curation("bronze plan").await.unwrap());
    delete.assert_async().await;
}

#[tokio::test]
async fn test_elastic_store_lists_recent_curations() {
    let mut server = Server::new_async().await;
    let list = server
        .mock("POST", "/search-curations/_search")
        .match_body(Matcher::PartialJson(json!({
            "size": 1000,
            "sort": [{ "updated_at": { "order": "desc" } }]
        })))
        .with_status(200)
        .with_body(
            json!({
                "hits": { "total": { "value": 3, "relation": "eq" }, "hits": [
                    { "_id": "c1", "_source": {
                        "query": "gold hmo", "pins": ["u1"], "updated_at": "2026-10-02T00:00:00Z"
                    }},
                    { "_id": "bad", "_source": { "pins": "not-a-list" } },
                    { "_id": "c2", "_source": {
                        "query": "bronze plan", "pins": [], "excludes": ["u9"],
                        "updated_at": "2026-09-01T00:00:00Z"
                    }}
                ]}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let store = ElasticConfigStore::new(common::client(&server.url()));
    let curations = store.list_curations().await.unwrap();
    let queries: Vec<&str> = curations.iter().map(|c| c.query.as_str()).collect();
    assert_eq!(queries, vec!["gold hmo", "bronze plan"]);
    assert_eq!(curations[1].excludes, vec!["u9".to_string()]);
    list.assert_async().await;
}
