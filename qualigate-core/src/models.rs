//! Data structures shared between the executor, engines and transports.
//!
//! Raw types mirror what a rule engine reports and are only ever read by the
//! core. Normalized types are built once per execution and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Process-unique identifier for one validation execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Mints a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome tag of one evaluated check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    /// Check passed
    Pass,
    /// Check failed
    Fail,
    /// Check crossed a warning threshold
    Warn,
    /// Engine did not report a recognizable outcome
    #[default]
    Unknown,
}

impl CheckOutcome {
    /// Parses an engine outcome tag; anything unrecognized is `Unknown`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "pass" => Self::Pass,
            "fail" => Self::Fail,
            "warn" => Self::Warn,
            _ => Self::Unknown,
        }
    }

    /// Whether this check contributes failed-row samples.
    pub const fn is_problem(self) -> bool {
        matches!(self, Self::Fail | Self::Warn)
    }
}

impl<'de> Deserialize<'de> for CheckOutcome {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag.as_deref().map_or(Self::Unknown, Self::from_tag))
    }
}

/// One block of engine diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticBlock {
    /// Sample rows that violated the check, in engine order
    #[serde(rename = "failedRows", default)]
    pub failed_rows: Option<Vec<Value>>,
}

/// Diagnostics attached to a raw check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Diagnostic blocks in engine order
    #[serde(default)]
    pub blocks: Vec<DiagnosticBlock>,
}

/// One check exactly as the rule engine reported it.
///
/// The measured value is read from `checkValue`, falling back to `value`
/// when only that key is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCheckRecord")]
pub struct RawCheck {
    /// Check name
    pub name: Option<String>,
    /// Rule definition text, used when the engine omits a name
    pub definition: Option<String>,
    /// Checked table or dataset
    pub table: Option<String>,
    /// Checked column
    pub column: Option<String>,
    /// Outcome tag
    pub outcome: CheckOutcome,
    /// Measured value
    #[serde(rename = "checkValue")]
    pub value: Option<Value>,
    /// Engine message
    pub message: Option<String>,
    /// Optional diagnostic row samples
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Deserialize)]
struct RawCheckRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    column: Option<String>,
    #[serde(default)]
    outcome: CheckOutcome,
    #[serde(rename = "checkValue", default)]
    check_value: Option<Value>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    diagnostics: Option<Diagnostics>,
}

impl From<RawCheckRecord> for RawCheck {
    fn from(record: RawCheckRecord) -> Self {
        Self {
            name: record.name,
            definition: record.definition,
            table: record.table,
            column: record.column,
            outcome: record.outcome,
            value: record.check_value.or(record.value),
            message: record.message,
            diagnostics: record.diagnostics,
        }
    }
}

impl RawCheck {
    /// Creates a raw check with the given name and outcome.
    pub fn new(name: impl Into<String>, outcome: CheckOutcome) -> Self {
        Self {
            name: Some(name.into()),
            outcome,
            ..Default::default()
        }
    }

    /// Builder method to set the table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Builder method to set the column.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Builder method to set the measured value.
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Builder method to append a diagnostic block of failed rows.
    #[must_use]
    pub fn with_failed_rows(mut self, rows: Vec<Value>) -> Self {
        self.diagnostics
            .get_or_insert_with(Diagnostics::default)
            .blocks
            .push(DiagnosticBlock {
                failed_rows: Some(rows),
            });
        self
    }

    /// Name shown to callers: name, then definition, then `unnamed`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.definition.as_deref())
            .unwrap_or("unnamed")
    }

    /// Failed rows across all diagnostic blocks, in block order.
    pub fn failed_rows(&self) -> impl Iterator<Item = &Value> {
        self.diagnostics
            .iter()
            .flat_map(|d| d.blocks.iter())
            .filter_map(|block| block.failed_rows.as_ref())
            .flatten()
    }
}

/// Unmodified output of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEngineResult {
    /// Checks in engine order
    #[serde(default)]
    pub checks: Vec<RawCheck>,
}

impl RawEngineResult {
    /// Wraps an ordered list of checks.
    pub const fn new(checks: Vec<RawCheck>) -> Self {
        Self { checks }
    }
}

/// Normalized per-check result returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Checked table
    pub table: Option<String>,
    /// Checked column
    pub column: Option<String>,
    /// Outcome tag
    pub outcome: CheckOutcome,
    /// Measured value
    pub value: Option<Value>,
    /// Engine message
    pub message: Option<String>,
}

impl From<&RawCheck> for CheckResult {
    fn from(check: &RawCheck) -> Self {
        Self {
            name: check.display_name().to_string(),
            table: check.table.clone(),
            column: check.column.clone(),
            outcome: check.outcome,
            value: check.value.clone(),
            message: check.message.clone(),
        }
    }
}

/// One sampled failing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRowSample {
    /// Name of the check that produced the row
    pub check_name: String,
    /// Table of that check
    pub table: Option<String>,
    /// The row itself
    pub failed_row: Value,
}

/// Overall status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// No failed and no warning checks
    Passed,
    /// No failed checks, at least one warning
    PassedWithWarnings,
    /// At least one failed check
    Failed,
}

impl ScanStatus {
    /// Wire name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::PassedWithWarnings => "passed_with_warnings",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome counts for one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCounts {
    /// Checks with outcome `pass`
    pub passed: usize,
    /// Checks with outcome `fail`
    pub failed: usize,
    /// Checks with outcome `warn`
    pub warned: usize,
    /// All checks, including unknown outcomes
    pub total: usize,
}

/// Immutable summary of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Execution identifier
    pub execution_id: ExecutionId,
    /// Derived status
    pub status: ScanStatus,
    /// Advisory engine exit code
    pub exit_code: i32,
    /// passed / total, or 0.0 when there are no checks
    pub quality_score: f64,
    /// Outcome counts
    pub counts: CheckCounts,
    /// Per-check results in engine order
    pub check_results: Vec<CheckResult>,
    /// Capped sample of failing rows
    pub failed_rows_sample: Vec<FailedRowSample>,
    /// Wall-clock time from configuration to run completion
    pub duration: Duration,
    /// When configuration started
    pub started_at: DateTime<Utc>,
    /// Raw engine log text
    pub logs: String,
}
