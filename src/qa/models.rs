use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Outcome of one check, ordered by severity: `Pass < Warning < Fail`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QaStatus {
    Pass,
    Warning,
    Fail,
}

impl QaStatus {
    pub fn glyph(&self) -> &'static str {
        match self {
            QaStatus::Pass => "✅",
            QaStatus::Warning => "⚠️",
            QaStatus::Fail => "❌",
        }
    }
}

/// Result of a single named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResult {
    pub name: String,
    pub status: QaStatus,
    pub message: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl QaResult {
    pub fn new(
        name: impl Into<String>,
        status: QaStatus,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            duration_ms,
            details: None,
        }
    }

    pub fn pass(name: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(name, QaStatus::Pass, message, duration_ms)
    }

    pub fn warning(name: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(name, QaStatus::Warning, message, duration_ms)
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(name, QaStatus::Fail, message, duration_ms)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Aggregated outcome of a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Assigned when the report is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub version: String,
    pub overall_status: QaStatus,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub warning_tests: usize,
    pub duration_ms: u64,
    pub results: Vec<QaResult>,
}

impl ValidationReport {
    /// Tally results; the overall status is the worst one, `pass` when empty
    pub fn aggregate(results: Vec<QaResult>, environment: impl Into<String>, duration_ms: u64) -> Self {
        let count = |status: QaStatus| results.iter().filter(|r| r.status == status).count();
        let overall_status = results
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(QaStatus::Pass);

        Self {
            id: None,
            timestamp: Utc::now(),
            environment: environment.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            overall_status,
            total_tests: results.len(),
            passed_tests: count(QaStatus::Pass),
            failed_tests: count(QaStatus::Fail),
            warning_tests: count(QaStatus::Warning),
            duration_ms,
            results,
        }
    }
}

/// Summary row of a persisted report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub overall_status: QaStatus,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub warning_tests: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: QaStatus) -> QaResult {
        QaResult::new("check", status, "msg", 1)
    }

    #[test]
    fn test_severity_order() {
        assert!(QaStatus::Pass < QaStatus::Warning);
        assert!(QaStatus::Warning < QaStatus::Fail);
        assert_eq!("warning".parse::<QaStatus>().unwrap(), QaStatus::Warning);
        assert_eq!(QaStatus::Fail.to_string(), "fail");
    }

    #[test]
    fn test_aggregate_worst_status() {
        let report = ValidationReport::aggregate(
            vec![
                result(QaStatus::Pass),
                result(QaStatus::Warning),
                result(QaStatus::Pass),
            ],
            "test",
            42,
        );
        assert_eq!(report.overall_status, QaStatus::Warning);
        assert_eq!(report.total_tests, 3);
        assert_eq!(report.passed_tests, 2);
        assert_eq!(report.warning_tests, 1);
        assert_eq!(report.failed_tests, 0);

        let failing = ValidationReport::aggregate(
            vec![result(QaStatus::Warning), result(QaStatus::Fail)],
            "test",
            1,
        );
        assert_eq!(failing.overall_status, QaStatus::Fail);
    }

    #[test]
    fn test_aggregate_ignores_result_order() {
        use QaStatus::{Fail, Pass, Warning};
        let orders = [
            [Pass, Warning, Fail],
            [Pass, Fail, Warning],
            [Warning, Pass, Fail],
            [Warning, Fail, Pass],
            [Fail, Pass, Warning],
            [Fail, Warning, Pass],
        ];
        for order in orders {
            let report =
                ValidationReport::aggregate(order.into_iter().map(result).collect(), "test", 1);
            assert_eq!(report.overall_status, Fail, "order {:?}", order);
            assert_eq!(
                (report.passed_tests, report.warning_tests, report.failed_tests),
                (1, 1, 1),
                "order {:?}",
                order
            );
            let kept: Vec<QaStatus> = report.results.iter().map(|r| r.status).collect();
            assert_eq!(kept, order.to_vec());
        }
    }

    #[test]
    fn test_aggregate_empty_is_pass() {
        let report = ValidationReport::aggregate(vec![], "test", 0);
        assert_eq!(report.overall_status, QaStatus::Pass);
        assert_eq!(report.total_tests, 0);
    }

    #[test]
    fn test_tallies_sum_to_total() {
        let results: Vec<QaResult> = [QaStatus::Pass, QaStatus::Fail, QaStatus::Warning, QaStatus::Fail]
            .into_iter()
            .map(result)
            .collect();
        let report = ValidationReport::aggregate(results, "test", 5);
        assert_eq!(
            report.passed_tests + report.failed_tests + report.warning_tests,
            report.total_tests
        );
    }
}
