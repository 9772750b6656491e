//! Individual QA stages and the pure classifiers they rely on.
//!
//! Every stage returns its results instead of an error: a failing backend
//! call becomes a `fail` result and the next stage still runs.

use futures::future::join_all;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Instant;

use crate::elastic::ElasticClient;
use crate::qa::config::{EndpointCheck, QaConfig};
use crate::qa::models::{QaResult, QaStatus};

/// Documents fetched by the performance search
const PERFORMANCE_SEARCH_SIZE: usize = 20;

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Integrity score as a percentage, with its status.
///
/// `>= 80` passes, `>= 50` warns, anything lower fails. An empty sample warns.
pub fn assess_integrity(valid: usize, total: usize) -> (QaStatus, f64) {
    if total == 0 {
        return (QaStatus::Warning, 0.0);
    }
    let score = valid as f64 / total as f64 * 100.0;
    let status = if score >= 80.0 {
        QaStatus::Pass
    } else if score >= 50.0 {
        QaStatus::Warning
    } else {
        QaStatus::Fail
    };
    (status, score)
}

/// `pass` under `pass_ms`, `warning` under `warn_ms`, else `fail`
pub fn classify_latency(elapsed_ms: u64, pass_ms: u64, warn_ms: u64) -> QaStatus {
    if elapsed_ms < pass_ms {
        QaStatus::Pass
    } else if elapsed_ms < warn_ms {
        QaStatus::Warning
    } else {
        QaStatus::Fail
    }
}

/// Interpret the authenticate response.
///
/// `status` is the HTTP status, or the transport error text when the call
/// never got a response.
pub fn classify_auth(has_api_key: bool, status: Result<u16, String>) -> (QaStatus, String) {
    if !has_api_key {
        return (QaStatus::Warning, "No API key configured".to_string());
    }
    match status {
        Ok(code) if (200..300).contains(&code) => (
            QaStatus::Pass,
            "API key authentication successful".to_string(),
        ),
        Ok(code @ (401 | 403)) => (QaStatus::Fail, format!("API key rejected (HTTP {})", code)),
        Ok(code) => (
            QaStatus::Warning,
            format!("Authentication endpoint returned HTTP {}", code),
        ),
        Err(e) => (QaStatus::Fail, format!("Authentication check failed: {}", e)),
    }
}

fn has_value(source: &Value, field: &str) -> bool {
    let mut current = source;
    for key in field.split('.') {
        match current.get(key) {
            Some(next) => current = next,
            None => return false,
        }
    }
    match current {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Whether a `_source` carries every required field with a non-empty value
pub fn has_required_fields(source: &Value, required: &[String]) -> bool {
    required.iter().all(|field| has_value(source, field))
}

/// Required fields absent from a `GET /{index}/_mapping` response.
///
/// Dotted names are looked up through nested `properties`.
pub fn missing_mapping_fields(mapping: &Value, required: &[String]) -> Vec<String> {
    let mappings = mapping
        .as_object()
        .and_then(|indices| indices.values().next())
        .and_then(|index| index.get("mappings"));

    required
        .iter()
        .filter(|field| {
            let mut node = mappings;
            for key in field.split('.') {
                node = node
                    .and_then(|n| n.get("properties"))
                    .and_then(|p| p.get(key));
            }
            node.is_none()
        })
        .cloned()
        .collect()
}

/// Cluster reachability plus API key authentication
pub async fn check_connectivity(client: &ElasticClient) -> Vec<QaResult> {
    let mut results = Vec::with_capacity(2);
    let start = Instant::now();

    results.push(match client.info().await {
        Ok(info) => {
            let version = info.version.as_ref().map(|v| v.number.clone());
            let flavor = info.version.as_ref().and_then(|v| v.build_flavor.clone());
            QaResult::pass(
                "Elasticsearch Connection",
                format!("Connected to {}", info.cluster_name),
                elapsed_ms(start),
            )
            .with_details(json!({
                "cluster_name": info.cluster_name,
                "version": version,
                "build_flavor": flavor,
            }))
        }
        Err(e) => QaResult::fail(
            "Elasticsearch Connection",
            format!("Connection failed: {}", e),
            elapsed_ms(start),
        ),
    });

    let start = Instant::now();
    let outcome = if client.has_api_key() {
        client
            .authenticate()
            .await
            .map(|s| s.as_u16())
            .map_err(|e| e.to_string())
    } else {
        Err("no API key".to_string())
    };
    let (status, message) = classify_auth(client.has_api_key(), outcome);
    results.push(QaResult::new(
        "API Key Authentication",
        status,
        message,
        elapsed_ms(start),
    ));

    results
}

/// Index existence, document count and mapping.
///
/// An absent index is a failure and ends the stage.
pub async fn check_index_health(client: &ElasticClient, config: &QaConfig) -> Vec<QaResult> {
    let index = &client.indices().health_plans;
    let start = Instant::now();

    match client.index_exists(index).await {
        Ok(true) => {}
        Ok(false) => {
            return vec![QaResult::fail(
                "Health Plans Index",
                "Health plans index does not exist",
                elapsed_ms(start),
            )]
        }
        Err(e) => {
            return vec![QaResult::fail(
                "Index Health Check",
                format!("Index check failed: {}", e),
                elapsed_ms(start),
            )]
        }
    }

    let mut results = Vec::with_capacity(2);

    results.push(match client.count(index, None).await {
        Ok(count) => QaResult::new(
            "Health Plans Index",
            if count > 0 {
                QaStatus::Pass
            } else {
                QaStatus::Warning
            },
            format!("Index exists with {} documents", count),
            elapsed_ms(start),
        )
        .with_details(json!({ "document_count": count })),
        Err(e) => QaResult::fail(
            "Health Plans Index",
            format!("Document count failed: {}", e),
            elapsed_ms(start),
        ),
    });

    let start = Instant::now();
    results.push(match client.get_mapping(index).await {
        Ok(mapping) => {
            let missing = missing_mapping_fields(&mapping, &config.required_mapping_fields);
            if missing.is_empty() {
                QaResult::pass("Index Mapping", "Required fields configured", elapsed_ms(start))
            } else {
                QaResult::warning(
                    "Index Mapping",
                    format!("Required fields missing: {}", missing.join(", ")),
                    elapsed_ms(start),
                )
                .with_details(json!({ "missing_fields": missing }))
            }
        }
        Err(e) => QaResult::fail(
            "Index Mapping",
            format!("Mapping check failed: {}", e),
            elapsed_ms(start),
        ),
    });

    results
}

async fn check_endpoint(http: &Client, base_url: &str, endpoint: &EndpointCheck) -> QaResult {
    let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint.path);
    let start = Instant::now();

    let method = match Method::from_bytes(endpoint.method.to_uppercase().as_bytes()) {
        Ok(method) => method,
        Err(_) => {
            return QaResult::fail(
                &endpoint.name,
                format!("Invalid HTTP method '{}'", endpoint.method),
                0,
            )
        }
    };

    match http
        .request(method, &url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .send()
        .await
    {
        Ok(response) => {
            let status = response.status();
            QaResult::new(
                &endpoint.name,
                if status.is_success() {
                    QaStatus::Pass
                } else {
                    QaStatus::Fail
                },
                format!(
                    "Status: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )
                .trim_end()
                .to_string(),
                elapsed_ms(start),
            )
            .with_details(json!({
                "url": url,
                "method": endpoint.method,
                "status_code": status.as_u16(),
            }))
        }
        Err(e) => QaResult::fail(
            &endpoint.name,
            format!("Request failed: {}", e),
            elapsed_ms(start),
        )
        .with_details(json!({ "url": url, "method": endpoint.method })),
    }
}

/// Check every configured endpoint concurrently; results keep configured order
pub async fn check_endpoints(http: &Client, config: &QaConfig) -> Vec<QaResult> {
    join_all(
        config
            .endpoints
            .iter()
            .map(|endpoint| check_endpoint(http, &config.app_base_url, endpoint)),
    )
    .await
}

/// `match_all` returns hits and a text query executes
pub async fn check_search_functionality(client: &ElasticClient) -> Vec<QaResult> {
    let index = &client.indices().health_plans;
    let mut results = Vec::with_capacity(2);

    let start = Instant::now();
    let basic = json!({ "query": { "match_all": {} }, "size": 1 });
    results.push(match client.search(index, &basic).await {
        Ok(response) => {
            let has_hits = !response.hits.hits.is_empty();
            QaResult::new(
                "Basic Search",
                if has_hits {
                    QaStatus::Pass
                } else {
                    QaStatus::Warning
                },
                if has_hits {
                    "Search returns results"
                } else {
                    "No search results found"
                },
                elapsed_ms(start),
            )
            .with_details(json!({ "total_hits": response.total(), "took": response.took }))
        }
        Err(e) => QaResult::fail(
            "Basic Search",
            format!("Search test failed: {}", e),
            elapsed_ms(start),
        ),
    });

    let start = Instant::now();
    let text = json!({
        "query": { "multi_match": { "query": "test", "fields": ["plan_name", "title"] } },
        "size": 1
    });
    results.push(match client.search(index, &text).await {
        Ok(_) => QaResult::pass(
            "Text Search",
            "Text search functionality working",
            elapsed_ms(start),
        ),
        Err(e) => QaResult::fail(
            "Text Search",
            format!("Text search failed: {}", e),
            elapsed_ms(start),
        ),
    });

    results
}

/// Share of sampled documents carrying every required field
pub async fn check_data_integrity(client: &ElasticClient, config: &QaConfig) -> Vec<QaResult> {
    let index = &client.indices().health_plans;
    let start = Instant::now();

    let body = json!({ "query": { "match_all": {} }, "size": config.sample_size });
    let response = match client.search(index, &body).await {
        Ok(response) => response,
        Err(e) => {
            return vec![QaResult::fail(
                "Data Integrity",
                format!("Integrity check failed: {}", e),
                elapsed_ms(start),
            )]
        }
    };

    let total = response.hits.hits.len();
    if total == 0 {
        return vec![QaResult::warning(
            "Data Integrity",
            "No documents found for integrity check",
            elapsed_ms(start),
        )];
    }

    let valid = response
        .hits
        .hits
        .iter()
        .filter(|hit| has_required_fields(&hit.source, &config.required_document_fields))
        .count();
    let (status, score) = assess_integrity(valid, total);

    vec![QaResult::new(
        "Data Integrity",
        status,
        format!(
            "{}/{} documents have required fields ({:.1}%)",
            valid, total, score
        ),
        elapsed_ms(start),
    )
    .with_details(json!({
        "valid_documents": valid,
        "total_documents": total,
        "integrity_score": score,
        "required_fields": config.required_document_fields,
    }))]
}

/// Latency of a representative search and a count
pub async fn check_performance(client: &ElasticClient, config: &QaConfig) -> Vec<QaResult> {
    let index = &client.indices().health_plans;
    let mut results = Vec::with_capacity(2);

    let start = Instant::now();
    let body = json!({ "query": { "match_all": {} }, "size": PERFORMANCE_SEARCH_SIZE });
    results.push(match client.search(index, &body).await {
        Ok(_) => {
            let ms = elapsed_ms(start);
            QaResult::new(
                "Search Performance",
                classify_latency(ms, config.search_pass_ms, config.search_warn_ms),
                format!("Search completed in {}ms", ms),
                ms,
            )
            .with_details(json!({ "search_time_ms": ms, "threshold_ms": config.search_pass_ms }))
        }
        Err(e) => QaResult::fail(
            "Search Performance",
            format!("Performance test failed: {}", e),
            elapsed_ms(start),
        ),
    });

    let start = Instant::now();
    results.push(match client.count(index, None).await {
        Ok(_) => {
            let ms = elapsed_ms(start);
            QaResult::new(
                "Index Performance",
                classify_latency(ms, config.count_pass_ms, config.count_warn_ms),
                format!("Document count retrieved in {}ms", ms),
                ms,
            )
            .with_details(json!({ "count_time_ms": ms, "threshold_ms": config.count_pass_ms }))
        }
        Err(e) => QaResult::fail(
            "Index Performance",
            format!("Performance test failed: {}", e),
            elapsed_ms(start),
        ),
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_integrity_thresholds() {
        assert_eq!(assess_integrity(6, 10), (QaStatus::Warning, 60.0));
        assert_eq!(assess_integrity(8, 10).0, QaStatus::Pass);
        assert_eq!(assess_integrity(5, 10).0, QaStatus::Warning);
        assert_eq!(assess_integrity(4, 10).0, QaStatus::Fail);
        assert_eq!(assess_integrity(0, 0).0, QaStatus::Warning);
    }

    #[test]
    fn test_integrity_message_format() {
        let (_, score) = assess_integrity(6, 10);
        assert_eq!(
            format!("{}/{} documents have required fields ({:.1}%)", 6, 10, score),
            "6/10 documents have required fields (60.0%)"
        );
    }

    #[test]
    fn test_latency_thresholds() {
        assert_eq!(classify_latency(999, 1000, 3000), QaStatus::Pass);
        assert_eq!(classify_latency(1000, 1000, 3000), QaStatus::Warning);
        assert_eq!(classify_latency(2999, 1000, 3000), QaStatus::Warning);
        assert_eq!(classify_latency(3000, 1000, 3000), QaStatus::Fail);
        assert_eq!(classify_latency(499, 500, 1000), QaStatus::Pass);
    }

    #[test]
    fn test_auth_classification() {
        assert_eq!(classify_auth(true, Ok(200)).0, QaStatus::Pass);
        assert_eq!(classify_auth(true, Ok(401)).0, QaStatus::Fail);
        assert_eq!(classify_auth(true, Ok(403)).0, QaStatus::Fail);
        assert_eq!(classify_auth(true, Ok(404)).0, QaStatus::Warning);
        assert_eq!(
            classify_auth(true, Err("connection refused".to_string())).0,
            QaStatus::Fail
        );
        assert_eq!(classify_auth(false, Ok(200)).0, QaStatus::Warning);
    }

    #[test]
    fn test_required_fields() {
        let required = fields(&["plan_name", "state", "document_url"]);
        let complete = json!({"plan_name": "Gold", "state": "TX", "document_url": "https://x/a.pdf"});
        let blank = json!({"plan_name": "Gold", "state": " ", "document_url": "https://x/a.pdf"});
        let missing = json!({"plan_name": "Gold", "state": "TX"});
        assert!(has_required_fields(&complete, &required));
        assert!(!has_required_fields(&blank, &required));
        assert!(!has_required_fields(&missing, &required));
        assert!(has_required_fields(
            &json!({"metadata": {"plan_info": {"document_type": "sbc"}}}),
            &fields(&["metadata.plan_info.document_type"])
        ));
    }

    #[test]
    fn test_missing_mapping_fields() {
        let mapping = json!({
            "health-plans-v2": {
                "mappings": {
                    "properties": {
                        "plan_name": {"type": "text"},
                        "metadata": {"properties": {"plan_info": {"properties": {"document_type": {"type": "keyword"}}}}}
                    }
                }
            }
        });
        assert_eq!(
            missing_mapping_fields(
                &mapping,
                &fields(&["plan_name", "document_url", "metadata.plan_info.document_type"])
            ),
            fields(&["document_url"])
        );
        assert_eq!(
            missing_mapping_fields(&json!({}), &fields(&["plan_name"])),
            fields(&["plan_name"])
        );
    }
}
