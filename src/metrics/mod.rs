//! Prometheus metrics for search traffic and QA runs.
//!
//! # Example
//! ```no_run
//! use health_plan_search::metrics::SEARCH_REQUESTS_TOTAL;
//!
//! SEARCH_REQUESTS_TOTAL
//!     .with_label_values(&["semantic", "success"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "health_plan_search";

lazy_static! {
    /// Registry served at `/metrics`
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Search requests
    ///
    /// Labels: mode, outcome
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["mode", "outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// End-to-end search latency, including configuration reads and curation
    pub static ref SEARCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("search_duration_seconds", "Search latency in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");

    /// Times relevance configuration was unavailable and defaults were used
    ///
    /// Labels: kind (boosts, curation, embedding)
    pub static ref CONFIG_FALLBACKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("config_fallbacks_total", "Relevance configuration fallbacks")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create CONFIG_FALLBACKS_TOTAL metric");

    /// QA check results
    ///
    /// Labels: status (pass, warning, fail)
    pub static ref QA_CHECKS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("qa_checks_total", "QA check results by status")
            .namespace(NAMESPACE),
        &["status"]
    ).expect("Failed to create QA_CHECKS_TOTAL metric");

    /// Wall-clock duration of full QA runs
    pub static ref QA_RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("qa_run_duration_seconds", "QA validation run duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0])
    ).expect("Failed to create QA_RUN_DURATION_SECONDS metric");
}

/// Register all metrics with [`PROMETHEUS_REGISTRY`]. Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SEARCH_REQUESTS_TOTAL.clone()),
        Box::new(SEARCH_DURATION_SECONDS.clone()),
        Box::new(CONFIG_FALLBACKS_TOTAL.clone()),
        Box::new(QA_CHECKS_TOTAL.clone()),
        Box::new(QA_RUN_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Text exposition of every registered metric
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_includes_search_metrics() {
        init_metrics().unwrap();
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&["keyword", "success"])
            .inc();
        CONFIG_FALLBACKS_TOTAL.with_label_values(&["boosts"]).inc();

        let output = gather_metrics();
        assert!(output.contains("health_plan_search_search_requests_total"));
        assert!(output.contains("health_plan_search_config_fallbacks_total"));
    }
}
