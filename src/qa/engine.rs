use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

use crate::elastic::ElasticClient;
use crate::metrics::{QA_CHECKS_TOTAL, QA_RUN_DURATION_SECONDS};
use crate::qa::checks;
use crate::qa::config::QaConfig;
use crate::qa::models::{QaResult, QaStatus, ValidationReport};

/// Timeout applied to each application endpoint check
const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the validation stages against the backend and the application.
///
/// Stages always run in the same order and none short-circuits the others:
/// `Connectivity → IndexHealth → APIEndpoints → SearchFunctionality →
/// DataIntegrity → Performance`. A run never returns an error; failures are
/// recorded as `fail` results.
pub struct QaEngine {
    client: Arc<ElasticClient>,
    http: reqwest::Client,
    config: QaConfig,
}

impl QaEngine {
    pub fn new(client: Arc<ElasticClient>, config: QaConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(ENDPOINT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build endpoint client, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            http,
            config,
        }
    }

    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Run every stage and aggregate the results.
    ///
    /// `environment` overrides the configured environment label.
    #[instrument(skip_all, fields(environment = tracing::field::Empty))]
    pub async fn run_full_validation(&self, environment: Option<&str>) -> ValidationReport {
        let environment = environment.unwrap_or(&self.config.environment).to_string();
        tracing::Span::current().record("environment", environment.as_str());
        info!("Starting QA validation");

        let start = Instant::now();
        let mut results: Vec<QaResult> = Vec::new();

        results.extend(checks::check_connectivity(&self.client).await);
        results.extend(checks::check_index_health(&self.client, &self.config).await);
        results.extend(checks::check_endpoints(&self.http, &self.config).await);
        results.extend(checks::check_search_functionality(&self.client).await);
        results.extend(checks::check_data_integrity(&self.client, &self.config).await);
        results.extend(checks::check_performance(&self.client, &self.config).await);

        let elapsed = start.elapsed();
        for result in &results {
            QA_CHECKS_TOTAL
                .with_label_values(&[result.status.to_string().as_str()])
                .inc();
            if result.status == QaStatus::Fail {
                info!(check = %result.name, message = %result.message, "QA check failed");
            }
        }
        QA_RUN_DURATION_SECONDS.observe(elapsed.as_secs_f64());

        let report = ValidationReport::aggregate(results, environment, elapsed.as_millis() as u64);
        info!(
            overall_status = %report.overall_status,
            total = report.total_tests,
            passed = report.passed_tests,
            failed = report.failed_tests,
            warnings = report.warning_tests,
            duration_ms = report.duration_ms,
            "QA validation completed"
        );
        report
    }
}
