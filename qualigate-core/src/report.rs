//! Report extraction from raw engine output.
//!
//! Everything here is a pure function of the engine result: no I/O, no
//! locking, no clocks.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::{
    CheckCounts, CheckOutcome, CheckResult, ExecutionId, FailedRowSample, RawEngineResult,
    ScanStatus, ValidationReport,
};

/// Rows taken from a single failing or warning check.
pub const MAX_FAILED_ROWS_PER_CHECK: usize = 10;

/// Rows kept across all checks.
pub const MAX_FAILED_ROWS_TOTAL: usize = 50;

/// Exit code reported when the engine does not supply one and checks failed.
pub const DERIVED_FAILURE_EXIT_CODE: i32 = 2;

/// Everything about one run that does not come from the engine result.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// Execution identifier
    pub execution_id: ExecutionId,
    /// Exit code returned by the engine's run, if any
    pub exit_code: Option<i32>,
    /// When configuration started
    pub started_at: DateTime<Utc>,
    /// Configuration-to-completion wall clock
    pub duration: Duration,
    /// Engine log text
    pub logs: String,
}

/// Counts outcomes. Unknown outcomes only count toward the total.
pub fn count_outcomes(result: &RawEngineResult) -> CheckCounts {
    result
        .checks
        .iter()
        .fold(CheckCounts::default(), |mut counts, check| {
            match check.outcome {
                CheckOutcome::Pass => counts.passed = counts.passed.saturating_add(1),
                CheckOutcome::Fail => counts.failed = counts.failed.saturating_add(1),
                CheckOutcome::Warn => counts.warned = counts.warned.saturating_add(1),
                CheckOutcome::Unknown => {}
            }
            counts.total = counts.total.saturating_add(1);
            counts
        })
}

/// passed / total, or exactly 0.0 when there are no checks.
#[allow(clippy::cast_precision_loss)]
pub fn quality_score(counts: &CheckCounts) -> f64 {
    if counts.total == 0 {
        0.0
    } else {
        counts.passed as f64 / counts.total as f64
    }
}

/// Failed dominates warn dominates pass.
pub const fn derive_status(counts: &CheckCounts) -> ScanStatus {
    if counts.failed > 0 {
        ScanStatus::Failed
    } else if counts.warned > 0 {
        ScanStatus::PassedWithWarnings
    } else {
        ScanStatus::Passed
    }
}

/// Samples failing rows: up to 10 per fail/warn check, at most 50 overall,
/// in check order then row order.
pub fn sample_failed_rows(result: &RawEngineResult) -> Vec<FailedRowSample> {
    result
        .checks
        .iter()
        .filter(|check| check.outcome.is_problem())
        .flat_map(|check| {
            check
                .failed_rows()
                .take(MAX_FAILED_ROWS_PER_CHECK)
                .map(move |row| FailedRowSample {
                    check_name: check.display_name().to_string(),
                    table: check.table.clone(),
                    failed_row: row.clone(),
                })
        })
        .take(MAX_FAILED_ROWS_TOTAL)
        .collect()
}

/// Builds the immutable report for one run.
///
/// The engine exit code is advisory. When it is absent the code is derived
/// from the failed count; the status always is.
pub fn extract_report(result: &RawEngineResult, meta: RunMetadata) -> ValidationReport {
    let counts = count_outcomes(result);
    let exit_code = meta.exit_code.unwrap_or(if counts.failed == 0 {
        0
    } else {
        DERIVED_FAILURE_EXIT_CODE
    });

    ValidationReport {
        execution_id: meta.execution_id,
        status: derive_status(&counts),
        exit_code,
        quality_score: quality_score(&counts),
        counts,
        check_results: result.checks.iter().map(CheckResult::from).collect(),
        failed_rows_sample: sample_failed_rows(result),
        duration: meta.duration,
        started_at: meta.started_at,
        logs: meta.logs,
    }
}
