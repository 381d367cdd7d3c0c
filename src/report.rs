//! Reporter
//!
//! Pure aggregation and rendering of assertion results.

use crate::assertion::AssertionResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// Exit status when every assertion passed
pub const EXIT_PASSED: i32 = 0;
/// Exit status when at least one assertion failed
pub const EXIT_FAILED: i32 = 1;
/// Exit status when loading failed before any assertion ran
pub const EXIT_LOAD_ERROR: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub exit_code: i32,
}

pub fn summarize(results: &[AssertionResult]) -> Summary {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    Summary {
        total: results.len(),
        passed,
        failed,
        exit_code: if failed == 0 { EXIT_PASSED } else { EXIT_FAILED },
    }
}

/// One line per result followed by the summary counts
pub fn render_text(results: &[AssertionResult], summary: &Summary) -> String {
    let mut out = String::new();
    for result in results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        match &result.detail {
            Some(detail) => {
                let _ = writeln!(out, "{status}  {} ({detail})", result.description);
            }
            None => {
                let _ = writeln!(out, "{status}  {}", result.description);
            }
        }
    }
    let _ = writeln!(
        out,
        "\n{} assertions, {} passed, {} failed",
        summary.total, summary.passed, summary.failed
    );
    out
}

/// Machine-readable form of a run
#[derive(Debug, Clone, Serialize)]
pub struct Report<'a> {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub provider: &'a str,
    pub summary: Summary,
    pub results: &'a [AssertionResult],
}

pub fn render_json(report: &Report<'_>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
