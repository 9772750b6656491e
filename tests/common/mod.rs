//! Shared fixtures for integration tests against a mocked cluster
#![allow(dead_code)]

use health_plan_search::config::ElasticConfig;
use health_plan_search::elastic::ElasticClient;
use serde_json::{json, Value};
use std::sync::Arc;

/// Backend config pointing at a mock server, never reading an API key
pub fn elastic_config(endpoint: &str) -> ElasticConfig {
    ElasticConfig {
        endpoint: endpoint.to_string(),
        api_key_env: None,
        timeout_secs: 5,
        ..Default::default()
    }
}

pub fn client(endpoint: &str) -> Arc<ElasticClient> {
    Arc::new(ElasticClient::new(&elastic_config(endpoint)).unwrap())
}

pub fn client_with_key(endpoint: &str, key: &str) -> Arc<ElasticClient> {
    Arc::new(ElasticClient::with_api_key(&elastic_config(endpoint), Some(key.to_string())).unwrap())
}

/// A plan document whose identity is `url`
pub fn plan(url: &str, name: &str) -> Value {
    json!({
        "document_url": url,
        "plan_name": name,
        "state": "TX",
        "plan_id": url.rsplit('/').next().unwrap_or(url),
    })
}

/// `_search` response body with the given `_source` documents
pub fn search_response(sources: &[Value], total: u64) -> String {
    let hits: Vec<Value> = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            json!({
                "_index": "health-plans",
                "_id": format!("doc-{}", i),
                "_score": 10.0 - i as f64,
                "_source": source,
            })
        })
        .collect();
    json!({
        "took": 3,
        "timed_out": false,
        "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
    })
    .to_string()
}

pub fn empty_search_response() -> String {
    search_response(&[], 0)
}

pub fn index_created(id: &str) -> String {
    json!({ "_index": "idx", "_id": id, "result": "created" }).to_string()
}

pub fn cluster_info(name: &str) -> String {
    json!({
        "name": "node-1",
        "cluster_name": name,
        "version": { "number": "8.15.0", "build_flavor": "serverless" }
    })
    .to_string()
}
