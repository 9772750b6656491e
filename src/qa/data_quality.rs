//! Corpus-level data quality analysis over the health plan index.
//!
//! Unlike the validation run, which samples a handful of documents, these
//! checks use aggregations across the whole index.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::elastic::{ElasticClient, SearchResponseBody};
use crate::qa::models::{QaResult, QaStatus, ValidationReport};

/// Query used to compare collapsed and expanded result pages
const COLLAPSE_SAMPLE_QUERY: &str = "Texas health plans";
const COLLAPSE_SAMPLE_SIZE: usize = 30;

/// Collapsed pages with fewer distinct plans than this fail
const MIN_COLLAPSED_HITS: usize = 10;

/// Documents without a plan id listed in the report
const MISSING_SAMPLE_SIZE: usize = 10;

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn bucket_entries(aggs: &Value, name: &str) -> Vec<(String, u64)> {
    aggs.pointer(&format!("/{}/buckets", name))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|b| {
                    let key = match b.get("key")? {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some((key, b.get("doc_count")?.as_u64()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn doc_count(aggs: &Value, name: &str) -> u64 {
    aggs.pointer(&format!("/{}/doc_count", name))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn metric_value(aggs: &Value, name: &str) -> u64 {
    aggs.pointer(&format!("/{}/value", name))
        .and_then(Value::as_f64)
        .map(|v| v.max(0.0) as u64)
        .unwrap_or(0)
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Plan id coverage: any document without a plan id fails.
///
/// The missing count comes from the `missing_plan_id` aggregation, never
/// from the top-terms buckets.
pub fn assess_plan_ids(aggs: &Value, total_documents: u64, duration_ms: u64) -> QaResult {
    let missing = doc_count(aggs, "missing_plan_id");
    let top: Vec<Value> = bucket_entries(aggs, "plan_ids")
        .iter()
        .take(10)
        .map(|(key, count)| json!({ "plan_id": key, "count": count }))
        .collect();
    let unique = metric_value(aggs, "unique_plan_ids");

    let details = json!({
        "total_documents": total_documents,
        "unique_plan_ids": unique,
        "missing_plan_ids": missing,
        "missing_percentage": percentage(missing, total_documents),
        "top_plan_ids": top,
    });

    if missing > 0 {
        QaResult::fail(
            "Plan ID Coverage",
            format!("{} of {} documents have no plan_id", missing, total_documents),
            duration_ms,
        )
        .with_details(details)
    } else {
        QaResult::pass(
            "Plan ID Coverage",
            format!("All {} documents have a plan_id ({} unique)", total_documents, unique),
            duration_ms,
        )
        .with_details(details)
    }
}

/// Document URL uniqueness: duplicates warn
pub fn assess_url_uniqueness(aggs: &Value, duration_ms: u64) -> QaResult {
    let with_url = metric_value(aggs, "documents_with_url");
    let unique = metric_value(aggs, "unique_urls");
    let duplicates = with_url.saturating_sub(unique);

    let result = if duplicates > 0 {
        QaResult::warning(
            "Document URL Uniqueness",
            format!("{} documents share a document_url with another document", duplicates),
            duration_ms,
        )
    } else {
        QaResult::pass(
            "Document URL Uniqueness",
            format!("{} unique document URLs", unique),
            duration_ms,
        )
    };
    result.with_details(json!({
        "documents_with_url": with_url,
        "unique_urls": unique,
        "duplicates": duplicates,
    }))
}

/// State coverage: documents without a state warn
pub fn assess_states(aggs: &Value, total_documents: u64, duration_ms: u64) -> QaResult {
    let missing = doc_count(aggs, "missing_state");
    let states: Vec<Value> = bucket_entries(aggs, "states")
        .iter()
        .map(|(key, count)| json!({ "state": key, "count": count }))
        .collect();

    let status = if missing > 0 {
        QaStatus::Warning
    } else {
        QaStatus::Pass
    };
    let message = if missing > 0 {
        format!("{} of {} documents have no state", missing, total_documents)
    } else {
        format!("{} states represented", states.len())
    };
    QaResult::new("State Coverage", status, message, duration_ms).with_details(json!({
        "missing_states": missing,
        "missing_percentage": percentage(missing, total_documents),
        "states": states,
    }))
}

/// Documents lacking a plan id, with a sample of them
pub fn assess_documents_without_plan_id(
    response: &SearchResponseBody,
    duration_ms: u64,
) -> QaResult {
    let count = response.total();
    let samples: Vec<Value> = response
        .hits
        .hits
        .iter()
        .map(|hit| {
            let field = |name: &str| hit.source.get(name).cloned().unwrap_or(Value::Null);
            json!({
                "id": hit.id,
                "plan_name": field("plan_name"),
                "plan_type": field("plan_type"),
                "document_url": field("document_url"),
                "title": field("title"),
                "state": field("state"),
            })
        })
        .collect();

    let result = if count > 0 {
        QaResult::fail(
            "Documents Without plan_id",
            format!("{} documents have no plan_id", count),
            duration_ms,
        )
    } else {
        QaResult::pass(
            "Documents Without plan_id",
            "Every document has a plan_id",
            duration_ms,
        )
    };
    result.with_details(json!({ "count": count, "samples": samples }))
}

/// Collapsing on the plan field must still fill a page with distinct plans
pub fn assess_collapse(
    collapsed: &SearchResponseBody,
    expanded: &SearchResponseBody,
    duration_ms: u64,
) -> QaResult {
    let collapsed_returned = collapsed.hits.hits.len();
    let expanded_returned = expanded.hits.hits.len();
    let details = json!({
        "query": COLLAPSE_SAMPLE_QUERY,
        "with_collapse": { "returned": collapsed_returned, "total": collapsed.total() },
        "without_collapse": { "returned": expanded_returned, "total": expanded.total() },
        "difference": expanded_returned.saturating_sub(collapsed_returned),
    });

    let result = if collapsed_returned < MIN_COLLAPSED_HITS {
        QaResult::fail(
            "Collapse Behavior",
            format!(
                "Collapsed search returned {} plans, expected at least {}",
                collapsed_returned, MIN_COLLAPSED_HITS
            ),
            duration_ms,
        )
    } else {
        QaResult::pass(
            "Collapse Behavior",
            format!(
                "Collapsed search returned {} plans from {} documents",
                collapsed_returned, expanded_returned
            ),
            duration_ms,
        )
    };
    result.with_details(details)
}

/// Runs the aggregation checks and aggregates them like a validation report
pub struct DataQualityAnalyzer {
    client: Arc<ElasticClient>,
    environment: String,
    collapse_field: Option<String>,
}

impl DataQualityAnalyzer {
    pub fn new(client: Arc<ElasticClient>, environment: impl Into<String>) -> Self {
        Self {
            client,
            environment: environment.into(),
            collapse_field: None,
        }
    }

    /// Field the search results collapse on; the collapse check needs one
    pub fn with_collapse_field(mut self, field: Option<String>) -> Self {
        self.collapse_field = field;
        self
    }

    async fn search(&self, body: &Value) -> Result<SearchResponseBody, String> {
        self.client
            .search(&self.client.indices().health_plans, body)
            .await
            .map_err(|e| e.to_string())
    }

    async fn aggregate(&self, aggs: Value) -> Result<(u64, Value), String> {
        let body = json!({ "size": 0, "track_total_hits": true, "aggs": aggs });
        let response = self.search(&body).await?;
        Ok((response.total(), response.aggregations.unwrap_or(Value::Null)))
    }

    async fn plan_id_coverage(&self) -> QaResult {
        let start = Instant::now();
        let aggs = json!({
            "plan_ids": { "terms": { "field": "plan_id.keyword", "size": 50 } },
            "missing_plan_id": { "missing": { "field": "plan_id.keyword" } },
            "unique_plan_ids": { "cardinality": { "field": "plan_id.keyword" } }
        });
        match self.aggregate(aggs).await {
            Ok((total, aggs)) => assess_plan_ids(&aggs, total, elapsed_ms(start)),
            Err(e) => QaResult::fail(
                "Plan ID Coverage",
                format!("Analysis failed: {}", e),
                elapsed_ms(start),
            ),
        }
    }

    async fn url_uniqueness(&self) -> QaResult {
        let start = Instant::now();
        let aggs = json!({
            "documents_with_url": { "value_count": { "field": "document_url.keyword" } },
            "unique_urls": { "cardinality": { "field": "document_url.keyword" } }
        });
        match self.aggregate(aggs).await {
            Ok((_, aggs)) => assess_url_uniqueness(&aggs, elapsed_ms(start)),
            Err(e) => QaResult::fail(
                "Document URL Uniqueness",
                format!("Analysis failed: {}", e),
                elapsed_ms(start),
            ),
        }
    }

    async fn state_coverage(&self) -> QaResult {
        let start = Instant::now();
        let aggs = json!({
            "states": { "terms": { "field": "state.keyword", "size": 60 } },
            "missing_state": { "missing": { "field": "state.keyword" } }
        });
        match self.aggregate(aggs).await {
            Ok((total, aggs)) => assess_states(&aggs, total, elapsed_ms(start)),
            Err(e) => QaResult::fail(
                "State Coverage",
                format!("Analysis failed: {}", e),
                elapsed_ms(start),
            ),
        }
    }

    async fn documents_without_plan_id(&self) -> QaResult {
        let start = Instant::now();
        let body = json!({
            "size": MISSING_SAMPLE_SIZE,
            "track_total_hits": true,
            "query": { "bool": { "must_not": { "exists": { "field": "plan_id" } } } },
            "_source": ["plan_name", "plan_type", "document_url", "title", "state"]
        });
        match self.search(&body).await {
            Ok(response) => assess_documents_without_plan_id(&response, elapsed_ms(start)),
            Err(e) => QaResult::fail(
                "Documents Without plan_id",
                format!("Analysis failed: {}", e),
                elapsed_ms(start),
            ),
        }
    }

    async fn collapse_behavior(&self) -> QaResult {
        let start = Instant::now();
        let Some(field) = &self.collapse_field else {
            return QaResult::warning(
                "Collapse Behavior",
                "Result collapsing is disabled",
                elapsed_ms(start),
            );
        };

        let expanded_body = json!({
            "size": COLLAPSE_SAMPLE_SIZE,
            "track_total_hits": true,
            "query": { "match": { "extracted_text": COLLAPSE_SAMPLE_QUERY } },
            "_source": ["plan_id", "plan_name"]
        });
        let mut collapsed_body = expanded_body.clone();
        collapsed_body["collapse"] = json!({ "field": field });

        let outcome = async {
            let collapsed = self.search(&collapsed_body).await?;
            let expanded = self.search(&expanded_body).await?;
            Ok::<_, String>((collapsed, expanded))
        }
        .await;

        match outcome {
            Ok((collapsed, expanded)) => assess_collapse(&collapsed, &expanded, elapsed_ms(start)),
            Err(e) => QaResult::fail(
                "Collapse Behavior",
                format!("Analysis failed: {}", e),
                elapsed_ms(start),
            ),
        }
    }

    /// Run every check in order
    pub async fn analyze(&self) -> ValidationReport {
        let start = Instant::now();
        let results = vec![
            self.plan_id_coverage().await,
            self.documents_without_plan_id().await,
            self.url_uniqueness().await,
            self.state_coverage().await,
            self.collapse_behavior().await,
        ];
        let report = ValidationReport::aggregate(results, self.environment.clone(), elapsed_ms(start));
        info!(
            overall_status = %report.overall_status,
            duration_ms = report.duration_ms,
            "Data quality analysis completed"
        );
        report
    }
}
