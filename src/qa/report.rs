use std::fmt::Write;

use crate::qa::models::ValidationReport;

/// Render a report as markdown.
///
/// The layout is stable: header, summary tallies, then one section per check
/// in run order.
pub fn render_markdown(report: &ValidationReport) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "# QA Validation Report\n");
    let _ = writeln!(out, "**Timestamp:** {}", report.timestamp.to_rfc3339());
    let _ = writeln!(out, "**Environment:** {}", report.environment);
    let _ = writeln!(
        out,
        "**Overall Status:** {} {}",
        report.overall_status.glyph(),
        report.overall_status.to_string().to_uppercase()
    );
    let _ = writeln!(out, "**Duration:** {}ms\n", report.duration_ms);

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- **Total Tests:** {}", report.total_tests);
    let _ = writeln!(out, "- **Passed:** {} ✅", report.passed_tests);
    let _ = writeln!(out, "- **Failed:** {} ❌", report.failed_tests);
    let _ = writeln!(out, "- **Warnings:** {} ⚠️\n", report.warning_tests);

    let _ = writeln!(out, "## Test Results\n");
    for result in &report.results {
        let _ = writeln!(out, "### {} {}\n", result.status.glyph(), result.name);
        let _ = writeln!(out, "**Status:** {}", result.status.to_string().to_uppercase());
        let _ = writeln!(out, "**Message:** {}", result.message);
        let _ = writeln!(out, "**Duration:** {}ms", result.duration_ms);
        if let Some(details) = &result.details {
            let pretty = serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string());
            let _ = writeln!(out, "**Details:**\n```json\n{}\n```", pretty);
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::models::{QaResult, QaStatus};
    use serde_json::json;

    fn sample() -> ValidationReport {
        ValidationReport::aggregate(
            vec![
                QaResult::pass("Elasticsearch Connection", "Connected to prod-cluster", 12),
                QaResult::warning(
                    "Data Integrity",
                    "6/10 documents have required fields (60.0%)",
                    30,
                )
                .with_details(json!({ "valid_documents": 6 })),
            ],
            "staging",
            42,
        )
    }

    #[test]
    fn test_header_and_summary() {
        let markdown = render_markdown(&sample());
        assert!(markdown.starts_with("# QA Validation Report\n"));
        assert!(markdown.contains("**Environment:** staging"));
        assert!(markdown.contains("**Overall Status:** ⚠️ WARNING"));
        assert!(markdown.contains("**Duration:** 42ms"));
        assert!(markdown.contains("- **Total Tests:** 2"));
        assert!(markdown.contains("- **Passed:** 1 ✅"));
        assert!(markdown.contains("- **Warnings:** 1 ⚠️"));
    }

    #[test]
    fn test_results_in_run_order_with_details() {
        let markdown = render_markdown(&sample());
        let connection = markdown.find("### ✅ Elasticsearch Connection").unwrap();
        let integrity = markdown.find("### ⚠️ Data Integrity").unwrap();
        assert!(connection < integrity);
        assert!(markdown.contains("\"valid_documents\": 6"));
        assert_eq!(markdown.matches("**Details:**").count(), 1);
    }

    #[test]
    fn test_empty_report_passes() {
        let report = ValidationReport::aggregate(vec![], "test", 0);
        let markdown = render_markdown(&report);
        assert!(markdown.contains(&format!("{} PASS", QaStatus::Pass.glyph())));
        assert!(!markdown.contains("### "));
    }
}
