//! Wire shape of a successful validation.

use qualigate_core::{CheckResult, FailedRowSample, ScanStatus, ValidationReport};
use serde::{Deserialize, Serialize};

/// Response body of `POST /validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    /// Execution identifier
    pub scan_id: String,
    /// Overall status
    pub status: ScanStatus,
    /// Advisory engine exit code
    pub exit_code: i32,
    /// Passed checks over total checks
    pub data_quality_score: f64,
    /// Checks with outcome `pass`
    pub passed_checks: usize,
    /// Checks with outcome `fail`
    pub failed_checks: usize,
    /// Checks with outcome `warn`
    pub warning_checks: usize,
    /// All checks
    pub total_checks: usize,
    /// Per-check results in engine order
    pub check_results: Vec<CheckResult>,
    /// Capped sample of failing rows
    pub failed_rows_sample: Vec<FailedRowSample>,
    /// Engine wall-clock time
    pub execution_time_seconds: f64,
    /// Engine log text
    pub logs: String,
}

impl From<ValidationReport> for ValidationResponse {
    fn from(report: ValidationReport) -> Self {
        Self {
            scan_id: report.execution_id.to_string(),
            status: report.status,
            exit_code: report.exit_code,
            data_quality_score: report.quality_score,
            passed_checks: report.counts.passed,
            failed_checks: report.counts.failed,
            warning_checks: report.counts.warned,
            total_checks: report.counts.total,
            check_results: report.check_results,
            failed_rows_sample: report.failed_rows_sample,
            execution_time_seconds: report.duration.as_secs_f64(),
            logs: report.logs,
        }
    }
}
