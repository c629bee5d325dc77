//! Crawl report rendering
//!
//! Turns a [`CrawlReport`] into the summary printed at the end of a crawl or
//! import.

use crate::crawler::CrawlReport;
use crate::FailureKind;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Number of individual failures listed before the rest is elided
const MAX_LISTED_FAILURES: usize = 20;

/// Formats a crawl report
///
/// # Arguments
///
/// * `title` - Heading, e.g. "Crawl Rechtbank since 2024-01-01"
/// * `report` - The report to format
///
/// # Returns
///
/// A multi-line plain-text summary
pub fn format_report(title: &str, report: &CrawlReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== {} ===\n", title);
    if let Some(run_id) = report.run_id {
        let _ = writeln!(out, "Run ID: {}", run_id);
    }
    let _ = writeln!(out, "Discovered: {}", report.discovered);
    let _ = writeln!(
        out,
        "Stored:     {} ({} new, {} updated)",
        report.stored(),
        report.created,
        report.updated
    );
    let _ = writeln!(out, "Skipped:    {}", report.skipped);
    let _ = writeln!(out, "Failed:     {}", report.failed());
    if report.parse_warnings > 0 {
        let _ = writeln!(out, "Parser warnings: {}", report.parse_warnings);
    }

    if !report.authority_fallbacks.is_empty() {
        let _ = writeln!(
            out,
            "\nStored under the placeholder authority ({}):",
            report.authority_fallbacks.len()
        );
        for ecli in &report.authority_fallbacks {
            let _ = writeln!(out, "  - {}", ecli);
        }
    }

    if !report.failures.is_empty() {
        let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
        for failure in &report.failures {
            *by_kind.entry(kind_label(failure.kind)).or_default() += 1;
        }

        let _ = writeln!(out, "\nFailures by kind:");
        for (kind, count) in &by_kind {
            let _ = writeln!(out, "  {}: {}", kind, count);
        }

        let _ = writeln!(out, "\nFailed items:");
        for failure in report.failures.iter().take(MAX_LISTED_FAILURES) {
            let _ = writeln!(out, "  - {}: {}", failure.ecli, failure.reason);
        }
        if report.failures.len() > MAX_LISTED_FAILURES {
            let _ = writeln!(
                out,
                "  ... and {} more",
                report.failures.len() - MAX_LISTED_FAILURES
            );
        }
    }

    if !report.discovery_failures.is_empty() {
        let _ = writeln!(out, "\nDiscovery failed for:");
        for failure in &report.discovery_failures {
            let _ = writeln!(out, "  - {}: {}", failure.authority, failure.reason);
        }
    }

    out
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Network => "network",
        FailureKind::MalformedDocument => "malformed document",
        FailureKind::NotFound => "unknown reference",
        FailureKind::Storage => "storage",
        FailureKind::Other => "other",
    }
}

/// Prints a crawl report to stdout
pub fn print_report(title: &str, report: &CrawlReport) {
    print!("{}", format_report(title, report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{DiscoveryFailure, ItemFailure};

    #[test]
    fn test_format_counts() {
        let report = CrawlReport {
            run_id: Some(7),
            discovered: 2,
            created: 1,
            skipped: 1,
            ..CrawlReport::default()
        };

        let text = format_report("Crawl Rechtbank", &report);
        assert!(text.contains("=== Crawl Rechtbank ==="));
        assert!(text.contains("Run ID: 7"));
        assert!(text.contains("Discovered: 2"));
        assert!(text.contains("Stored:     1 (1 new, 0 updated)"));
        assert!(text.contains("Skipped:    1"));
        assert!(!text.contains("Failures by kind"));
    }

    #[test]
    fn test_format_failures() {
        let report = CrawlReport {
            discovered: 3,
            failures: vec![
                ItemFailure {
                    ecli: "ECLI:NL:RBAMS:2024:1".to_string(),
                    kind: FailureKind::Network,
                    reason: "HTTP 503".to_string(),
                },
                ItemFailure {
                    ecli: "ECLI:NL:RBAMS:2024:2".to_string(),
                    kind: FailureKind::Network,
                    reason: "HTTP 502".to_string(),
                },
            ],
            authority_fallbacks: vec!["ECLI:NL:XX:2024:3".to_string()],
            discovery_failures: vec![DiscoveryFailure {
                authority: "Rechtbank Noord-Holland".to_string(),
                reason: "HTTP 500".to_string(),
            }],
            ..CrawlReport::default()
        };

        let text = format_report("Crawl", &report);
        assert!(text.contains("network: 2"));
        assert!(text.contains("ECLI:NL:RBAMS:2024:2: HTTP 502"));
        assert!(text.contains("placeholder authority (1)"));
        assert!(text.contains("Rechtbank Noord-Holland: HTTP 500"));
    }
}
