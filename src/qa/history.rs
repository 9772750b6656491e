use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::elastic::{ElasticClient, ElasticError};
use crate::qa::error::ReportResult;
use crate::qa::models::{QaStatus, ReportSummary, ValidationReport};
use crate::qa::report::render_markdown;

/// Summary fields read back from a stored report; the full results and
/// markdown are never fetched for listings
#[derive(Debug, Deserialize)]
struct StoredSummary {
    timestamp: DateTime<Utc>,
    environment: String,
    overall_status: QaStatus,
    #[serde(default)]
    total_tests: usize,
    #[serde(default)]
    passed_tests: usize,
    #[serde(default)]
    failed_tests: usize,
    #[serde(default)]
    warning_tests: usize,
    #[serde(default)]
    duration_ms: u64,
}

const SUMMARY_FIELDS: &[&str] = &[
    "timestamp",
    "environment",
    "overall_status",
    "total_tests",
    "passed_tests",
    "failed_tests",
    "warning_tests",
    "duration_ms",
];

/// Persisted history of validation reports in the `qa-reports` index
#[derive(Clone)]
pub struct ReportStore {
    client: Arc<ElasticClient>,
}

impl ReportStore {
    pub fn new(client: Arc<ElasticClient>) -> Self {
        Self { client }
    }

    fn index(&self) -> &str {
        &self.client.indices().qa_reports
    }

    /// Store a report alongside its markdown rendering, returning the new id
    pub async fn save(&self, report: &ValidationReport) -> ReportResult<String> {
        let mut document = serde_json::to_value(report)?;
        if let Value::Object(map) = &mut document {
            map.remove("id");
            map.insert(
                "markdown_report".to_string(),
                Value::String(render_markdown(report)),
            );
        }

        let response = self
            .client
            .index_document(self.index(), None, &document, false)
            .await?;
        info!(
            report_id = %response.id,
            environment = %report.environment,
            overall_status = %report.overall_status,
            "Stored QA report"
        );
        Ok(response.id)
    }

    /// Most recent reports first, optionally for one environment
    pub async fn list(
        &self,
        environment: Option<&str>,
        limit: usize,
    ) -> ReportResult<Vec<ReportSummary>> {
        let query = match environment {
            Some(env) => json!({ "match": { "environment": { "query": env, "operator": "and" } } }),
            None => json!({ "match_all": {} }),
        };
        let body = json!({
            "query": query,
            "sort": [{ "timestamp": { "order": "desc" } }],
            "size": limit,
            "_source": SUMMARY_FIELDS,
        });

        let response = match self.client.search(self.index(), &body).await {
            Ok(response) => response,
            Err(ElasticError::Status { status: 404, .. }) => {
                debug!("QA report index does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::with_capacity(response.hits.hits.len());
        for hit in response.hits.hits {
            match serde_json::from_value::<StoredSummary>(hit.source) {
                Ok(stored) => summaries.push(ReportSummary {
                    id: hit.id,
                    timestamp: stored.timestamp,
                    environment: stored.environment,
                    overall_status: stored.overall_status,
                    total_tests: stored.total_tests,
                    passed_tests: stored.passed_tests,
                    failed_tests: stored.failed_tests,
                    warning_tests: stored.warning_tests,
                    duration_ms: stored.duration_ms,
                }),
                Err(e) => warn!(report_id = %hit.id, error = %e, "Skipping malformed QA report"),
            }
        }
        Ok(summaries)
    }

    /// Delete reports strictly older than `older_than`; returns how many were removed
    pub async fn prune(
        &self,
        environment: Option<&str>,
        older_than: DateTime<Utc>,
    ) -> ReportResult<u64> {
        let mut filters = vec![json!({
            "range": { "timestamp": { "lt": older_than.to_rfc3339() } }
        })];
        if let Some(env) = environment {
            filters.push(json!({ "match": { "environment": { "query": env, "operator": "and" } } }));
        }
        let query = json!({ "bool": { "filter": filters } });

        let deleted = match self.client.delete_by_query(self.index(), &query).await {
            Ok(deleted) => deleted,
            Err(ElasticError::Status { status: 404, .. }) => 0,
            Err(e) => return Err(e.into()),
        };
        info!(deleted, older_than = %older_than, "Pruned QA reports");
        Ok(deleted)
    }
}
