//! HTTP surface served on an ephemeral port against a mocked cluster

mod common;

use health_plan_search::api::{build_router, AppState};
use health_plan_search::config::{Config, LlmConfig};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::io::Write;
use tokio_test::assert_ok;

fn config_for(es_endpoint: &str) -> Config {
    Config {
        elasticsearch: common::elastic_config(es_endpoint),
        llm: LlmConfig {
            api_key_env: None,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Start the router on 127.0.0.1:0 and return its base URL
async fn spawn_app(config: Config) -> String {
    let state = AppState::from_config(config).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_search_without_query_is_rejected() {
    let es = Server::new_async().await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/search", base))
        .json(&json!({ "filters": { "state": "TX" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Query is required"));

    let response = reqwest::get(format!("{}/api/search?query=%20%20", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_search_returns_ranked_results() {
    let mut es = Server::new_async().await;
    let search = es
        .mock("POST", "/health-plans/_search")
        .match_body(Matcher::PartialJson(json!({ "from": 0, "size": 5 })))
        .with_status(200)
        .with_body(common::search_response(
            &[
                common::plan("https://plans.example.com/a.pdf", "Gold HMO"),
                common::plan("https://plans.example.com/b.pdf", "Silver PPO"),
            ],
            2,
        ))
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/search", base))
        .json(&json!({ "query": "gold plan", "mode": "keyword", "limit": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["query"], "gold plan");
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["document_url"], "https://plans.example.com/a.pdf");
    assert_eq!(body["semantic_applied"], false);
    search.assert_async().await;
}

#[tokio::test]
async fn test_backend_failure_maps_to_bad_gateway() {
    let mut es = Server::new_async().await;
    es.mock("POST", "/health-plans/_search")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::get(format!("{}/api/search?query=dental", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "SEARCH_FAILED");
}

#[tokio::test]
async fn test_health_reflects_backend_reachability() {
    let mut es = Server::new_async().await;
    es.mock("GET", "/")
        .with_status(200)
        .with_body(common::cluster_info("prod"))
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["elasticsearch"], "healthy");
    assert_eq!(body["services"]["embeddings"], "not_configured");

    let down = spawn_app(config_for("http://127.0.0.1:1")).await;
    let response = reqwest::get(format!("{}/api/health", down)).await.unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_curations_list_when_index_missing() {
    let mut es = Server::new_async().await;
    es.mock("POST", "/search-curations/_search")
        .with_status(404)
        .with_body(r#"{"error": {"type": "index_not_found_exception"}}"#)
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::get(format!("{}/api/admin/curations", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "items": [] }));
}

#[tokio::test]
async fn test_curation_delete_requires_query() {
    let es = Server::new_async().await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::Client::new()
        .delete(format!("{}/api/admin/curations", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_report_prune_requires_cutoff() {
    let es = Server::new_async().await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::Client::new()
        .delete(format!("{}/api/qa/reports", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_report_listing() {
    let mut es = Server::new_async().await;
    es.mock("POST", "/qa-reports/_search")
        .match_body(Matcher::PartialJson(json!({ "size": 100 })))
        .with_status(200)
        .with_body(
            json!({
                "hits": { "total": { "value": 1, "relation": "eq" }, "hits": [
                    { "_id": "r1", "_source": {
                        "timestamp": "2026-10-01T12:00:00Z", "environment": "production",
                        "overall_status": "fail", "total_tests": 12, "passed_tests": 10,
                        "failed_tests": 2, "warning_tests": 0, "duration_ms": 1500
                    }}
                ]}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    // Limit is clamped to 100
    let response = reqwest::get(format!("{}/api/qa/reports?limit=5000", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["reports"][0]["id"], "r1");
    assert_eq!(body["reports"][0]["overall_status"], "fail");
}

#[tokio::test]
async fn test_validation_run_returns_markdown() {
    let mut es = Server::new_async().await;
    es.mock("POST", "/qa-reports/_doc")
        .with_status(201)
        .with_body(common::index_created("saved-1"))
        .create_async()
        .await;
    let mut config = config_for(&es.url());
    config.qa.app_base_url = "http://127.0.0.1:1".to_string();
    let base = spawn_app(config).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/qa/validate", base))
        .json(&json!({ "environment": "ci" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["report"]["environment"], "ci");
    assert_eq!(body["report"]["overall_status"], "fail");
    assert_eq!(body["report"]["id"], "saved-1");
    assert!(body["markdown_report"]
        .as_str()
        .unwrap()
        .starts_with("# QA Validation Report"));
}

#[tokio::test]
async fn test_metrics_endpoint_is_plain_text() {
    let es = Server::new_async().await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::get(format!("{}/metrics", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_pages_beyond_result_window_are_rejected() {
    let es = Server::new_async().await;
    let base = spawn_app(config_for(&es.url())).await;

    for query in [
        format!("query=gold&page={}", usize::MAX),
        "query=gold&page=501&limit=20".to_string(),
    ] {
        let response = reqwest::get(format!("{}/api/search?{}", base, query))
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "{}", query);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let response = reqwest::Client::new()
        .post(format!("{}/api/search", base))
        .json(&json!({ "query": "gold", "page": 1_000_000_000_000u64, "limit": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_curation_save_without_query_is_a_validation_error() {
    let es = Server::new_async().await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/curations", base))
        .json(&json!({ "pins": ["https://plans.example.com/a.pdf"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_index_listing_marks_aliased_index() {
    let mut es = Server::new_async().await;
    es.mock("GET", "/_cat/indices/health-plans-*")
        .match_query(Matcher::UrlEncoded("format".to_string(), "json".to_string()))
        .with_status(200)
        .with_body(
            json!([
                { "index": "health-plans-v1", "docs.count": "900", "store.size": "8mb",
                  "creation.date": "1767225600000", "health": "green" },
                { "index": "health-plans-v2", "docs.count": "1200", "store.size": "11mb",
                  "creation.date": "1775000000000", "health": "yellow" }
            ])
            .to_string(),
        )
        .create_async()
        .await;
    es.mock("GET", "/_alias/health-plans")
        .with_status(200)
        .with_body(json!({ "health-plans-v2": { "aliases": { "health-plans": {} } } }).to_string())
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::get(format!("{}/api/admin/indices", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["alias"], "health-plans");
    assert_eq!(body["indices"][0]["name"], "health-plans-v2");
    assert_eq!(body["indices"][0]["inAlias"], true);
    assert_eq!(body["indices"][0]["docCount"], 1200);
    assert_eq!(body["indices"][1]["name"], "health-plans-v1");
    assert_eq!(body["indices"][1]["inAlias"], false);
}

#[tokio::test]
async fn test_index_delete_detaches_alias_first() {
    let mut es = Server::new_async().await;
    es.mock("HEAD", "/health-plans-v1")
        .with_status(200)
        .create_async()
        .await;
    es.mock("HEAD", "/health-plans-gone")
        .with_status(404)
        .create_async()
        .await;
    let detach = es
        .mock("POST", "/_aliases")
        .match_body(Matcher::PartialJson(json!({
            "actions": [{ "remove": { "index": "health-plans-v1", "alias": "health-plans" } }]
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged": true}"#)
        .create_async()
        .await;
    let removal = es
        .mock("DELETE", "/health-plans-v1")
        .with_status(200)
        .with_body(r#"{"acknowledged": true}"#)
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;
    let http = reqwest::Client::new();

    let response = http
        .delete(format!("{}/api/admin/indices/health-plans-v1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    detach.assert_async().await;
    removal.assert_async().await;

    let response = http
        .delete(format!("{}/api/admin/indices/qa-reports", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = http
        .delete(format!("{}/api/admin/indices/health-plans-gone", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_alias_repoint_is_one_atomic_update() {
    let mut es = Server::new_async().await;
    es.mock("HEAD", "/health-plans-v2")
        .with_status(200)
        .create_async()
        .await;
    es.mock("GET", "/_alias/health-plans")
        .with_status(200)
        .with_body(json!({ "health-plans-v1": { "aliases": { "health-plans": {} } } }).to_string())
        .create_async()
        .await;
    let update = es
        .mock("POST", "/_aliases")
        .match_body(Matcher::PartialJson(json!({
            "actions": [
                { "remove": { "index": "health-plans-v1", "alias": "health-plans" } },
                { "add": { "index": "health-plans-v2", "alias": "health-plans" } }
            ]
        })))
        .with_status(200)
        .with_body(r#"{"acknowledged": true}"#)
        .expect(1)
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/api/admin/aliases", base))
        .json(&json!({ "action": "repoint", "index": "health-plans-v2", "alias": "health-plans" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["action"], "repoint");
    update.assert_async().await;

    for bad in [
        json!({ "action": "add", "index": "health-plans-v2" }),
        json!({ "action": "rename", "index": "health-plans-v2", "alias": "health-plans" }),
        json!({ "action": "add", "index": "search-events", "alias": "health-plans" }),
    ] {
        let response = http
            .post(format!("{}/api/admin/aliases", base))
            .json(&bad)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "{}", bad);
    }
}

#[tokio::test]
async fn test_deduplicate_keeps_newest_copy() {
    let mut es = Server::new_async().await;
    es.mock("POST", "/health-plans/_search")
        .match_body(Matcher::PartialJson(json!({
            "aggs": { "duplicates": { "terms": { "field": "document_url.keyword", "min_doc_count": 2 } } }
        })))
        .with_status(200)
        .with_body(
            json!({
                "hits": { "total": { "value": 40, "relation": "eq" }, "hits": [] },
                "aggregations": { "duplicates": { "buckets": [
                    { "key": "https://plans.example.com/a.pdf", "doc_count": 3 }
                ]}}
            })
            .to_string(),
        )
        .create_async()
        .await;
    es.mock("POST", "/health-plans/_search")
        .match_body(Matcher::PartialJson(json!({
            "query": { "term": { "document_url.keyword": "https://plans.example.com/a.pdf" } },
            "sort": [{ "metadata.indexed_at": { "order": "desc" } }]
        })))
        .with_status(200)
        .with_body(
            json!({
                "hits": { "total": { "value": 3, "relation": "eq" }, "hits": [
                    { "_id": "newest", "_index": "health-plans-v2" },
                    { "_id": "older", "_index": "health-plans-v2" },
                    { "_id": "oldest", "_index": "health-plans-v2" }
                ]}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let removed = es
        .mock("DELETE", Matcher::Regex(r"^/health-plans-v2/_doc/(older|oldest)$".to_string()))
        .with_status(200)
        .with_body(r#"{"result": "deleted"}"#)
        .expect(2)
        .create_async()
        .await;
    let base = spawn_app(config_for(&es.url())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/admin/deduplicate", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "duplicate_groups": 1, "removed": 2 }));
    removed.assert_async().await;
}

#[tokio::test]
async fn test_slow_requests_time_out() {
    // Accepts connections and never answers
    let stalled = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stalled_url = format!("http://{}", stalled.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = stalled.accept().await {
            held.push(socket);
        }
    });

    let mut config = config_for(&stalled_url);
    config.server.request_timeout_secs = 1;
    let base = spawn_app(config).await;

    let response = reqwest::get(format!("{}/api/search?query=gold", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 408);
}

#[tokio::test]
async fn test_validation_usage_lists_configured_endpoints() {
    let es = Server::new_async().await;
    let mut config = config_for(&es.url());
    config.qa.environment = "staging".to_string();
    config.qa.endpoints.truncate(1);
    let base = spawn_app(config).await;

    let response = reqwest::get(format!("{}/api/qa/validate", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["endpoints"], json!(["Health Check"]));
    assert_eq!(body["environment"], "staging");
}

#[test]
fn test_config_file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[qa]\nenvironment = \"staging\"\n\n[search]\ndefault_page_size = 15"
    )
    .unwrap();

    let config = assert_ok!(Config::load_from(file.path()));
    assert_eq!(config.qa.environment, "staging");
    assert_eq!(config.search.default_page_size, 15);
    assert_eq!(config.elasticsearch.indices.health_plans, "health-plans");
    assert_eq!(config.qa.endpoints.len(), 3);
}
