//! Rendering run reports for the terminal and for CI systems.

use crate::case::CaseOutcome;
use crate::engine::RunReport;
use crate::error::FAILURE_BANNER;
use clap::ValueEnum;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with checkmarks
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
    /// JUnit XML output for CI systems
    Junit,
}

/// Renders `report` for the suite named `suite`.
pub fn render(report: &RunReport, suite: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report, suite),
        OutputFormat::Json => format_json(report, suite),
        OutputFormat::Junit => format_junit_xml(report, suite),
    }
}

fn format_human(report: &RunReport, suite: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{suite}");
    for case in &report.cases {
        match &case.outcome {
            CaseOutcome::Passed => {
                let _ = writeln!(out, "  ✓ {} ({:.2?})", case.display_name, case.duration);
            }
            CaseOutcome::Aborted { reason } => {
                let _ = writeln!(out, "  - {} (skipped: {reason})", case.display_name);
            }
            CaseOutcome::Failed(err) => {
                let _ = writeln!(out, "  ✗ {} ({:.2?})", case.display_name, case.duration);
                for line in err.to_string().lines() {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }
    }

    let summary = report.summary();
    let _ = writeln!(
        out,
        "\n{} passed, {} skipped, {} failed",
        summary.passed, summary.aborted, summary.failed
    );
    if summary.failed > 0 {
        let noun = if summary.failed == 1 { "failure" } else { "failures" };
        let _ = writeln!(out, "{FAILURE_BANNER} ({} {noun})", summary.failed);
    }
    out
}

fn format_json(report: &RunReport, suite: &str) -> String {
    let summary = report.summary();
    let cases: Vec<_> = report
        .cases
        .iter()
        .map(|case| {
            let mut entry = serde_json::json!({
                "name": case.display_name,
                "outcome": case.outcome.label(),
                "duration_ms": case.duration.as_millis() as u64,
            });
            match &case.outcome {
                CaseOutcome::Aborted { reason } => entry["reason"] = reason.clone().into(),
                CaseOutcome::Failed(err) => entry["error"] = err.to_string().into(),
                CaseOutcome::Passed => {}
            }
            entry
        })
        .collect();

    let output = serde_json::json!({
        "suite": suite,
        "passed": summary.passed,
        "skipped": summary.aborted,
        "failed": summary.failed,
        "cases": cases,
    });
    // A `Value` built from strings and numbers always serializes.
    serde_json::to_string_pretty(&output).unwrap_or_default()
}

fn format_junit_xml(report: &RunReport, suite: &str) -> String {
    let summary = report.summary();
    let total_time = report.total_time.as_secs_f64();
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let _ = writeln!(
        xml,
        "<testsuites tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{total_time:.3}\">",
        summary.total(),
        summary.failed,
        summary.aborted
    );
    let _ = writeln!(
        xml,
        "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{total_time:.3}\">",
        escape_xml(suite),
        summary.total(),
        summary.failed,
        summary.aborted
    );

    for case in &report.cases {
        let _ = writeln!(
            xml,
            "    <testcase name=\"{}\" time=\"{:.3}\">",
            escape_xml(&case.display_name),
            case.duration.as_secs_f64()
        );
        match &case.outcome {
            CaseOutcome::Passed => {}
            CaseOutcome::Aborted { reason } => {
                let _ = writeln!(xml, "      <skipped message=\"{}\"/>", escape_xml(reason));
            }
            CaseOutcome::Failed(err) => {
                let detail = err.to_string();
                let message = detail.lines().next().unwrap_or("Scenario failed");
                let _ = writeln!(xml, "      <failure message=\"{}\">", escape_xml(message));
                let _ = writeln!(xml, "{}", escape_xml(&detail));
                xml.push_str("      </failure>\n");
            }
        }
        xml.push_str("    </testcase>\n");
    }

    xml.push_str("  </testsuite>\n");
    xml.push_str("</testsuites>\n");
    xml
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
