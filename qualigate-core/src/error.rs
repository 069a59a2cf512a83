//! Error taxonomy with credential sanitization.
//!
//! Every failure that crosses the executor boundary is one of four kinds.
//! Transport layers map on [`ErrorKind`] and never see raw engine errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request is structurally invalid; the caller can correct it.
    ConfigurationError,
    /// The caller-visible wait bound expired.
    Timeout,
    /// The rule engine raised during session setup or run.
    ScanExecutionError,
    /// Any other unexpected failure.
    ExecutionError,
}

impl ErrorKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::Timeout => "timeout",
            Self::ScanExecutionError => "scan_execution_error",
            Self::ExecutionError => "execution_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for Qualigate operations.
///
/// # Security
/// Messages built from engine output pass through [`redact_secret`] before
/// they are stored here, so a request password never reaches a response body.
#[derive(Debug, Error)]
pub enum QualigateError {
    /// Invalid request or service configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Caller stopped waiting for the execution
    #[error("Validation execution timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    /// Rule engine failure
    #[error("Scan execution failed: {message}")]
    ScanExecution { message: String },

    /// Unexpected failure outside the engine
    #[error("Validation failed: {message}")]
    Execution {
        message: String,
        details: Map<String, Value>,
    },
}

/// Convenience type alias for Results with QualigateError
pub type Result<T> = std::result::Result<T, QualigateError>;

impl QualigateError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a timeout error for the given bound
    pub const fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    /// Creates a scan execution error
    pub fn scan_execution(message: impl Into<String>) -> Self {
        Self::ScanExecution {
            message: message.into(),
        }
    }

    /// Creates an execution error carrying a backtrace captured at the call site.
    pub fn execution(message: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert(
            "traceback".to_string(),
            Value::String(std::backtrace::Backtrace::force_capture().to_string()),
        );
        Self::Execution {
            message: message.into(),
            details,
        }
    }

    /// Returns the machine-readable kind.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::ConfigurationError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ScanExecution { .. } => ErrorKind::ScanExecutionError,
            Self::Execution { .. } => ErrorKind::ExecutionError,
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration { message }
            | Self::ScanExecution { message }
            | Self::Execution { message, .. } => message.clone(),
            Self::Timeout { after } => {
                format!("Validation request timed out after {}s", after.as_secs())
            }
        }
    }

    /// Optional structured details for diagnostics.
    pub fn details(&self) -> Map<String, Value> {
        match self {
            Self::Execution { details, .. } => details.clone(),
            Self::Timeout { after } => {
                let mut details = Map::new();
                details.insert("timeout_seconds".to_string(), Value::from(after.as_secs()));
                details
            }
            Self::Configuration { .. } | Self::ScanExecution { .. } => Map::new(),
        }
    }
}

/// Masks every occurrence of `secret` in `text`.
///
/// Engine logs and error messages can echo connection settings back. Empty
/// secrets leave the text untouched.
///
/// # Example
///
/// ```rust
/// use qualigate_core::error::redact_secret;
///
/// let sanitized = redact_secret("login failed for password hunter2", "hunter2");
/// assert_eq!(sanitized, "login failed for password ****");
/// ```
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "****")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            QualigateError::configuration("x").kind().as_str(),
            "configuration_error"
        );
        assert_eq!(
            QualigateError::timeout(Duration::from_secs(1)).kind().as_str(),
            "timeout"
        );
        assert_eq!(
            QualigateError::scan_execution("x").kind().as_str(),
            "scan_execution_error"
        );
        assert_eq!(
            QualigateError::execution("x").kind().as_str(),
            "execution_error"
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ScanExecutionError).unwrap();
        assert_eq!(json, "\"scan_execution_error\"");
    }

    #[test]
    fn test_execution_error_captures_traceback() {
        let error = QualigateError::execution("worker vanished");
        let details = error.details();
        let traceback = details.get("traceback").and_then(Value::as_str).unwrap();
        assert!(!traceback.is_empty());
        assert_eq!(error.message(), "worker vanished");
    }

    #[test]
    fn test_timeout_message_and_details() {
        let error = QualigateError::timeout(Duration::from_secs(300));
        assert!(error.to_string().contains("300s"));
        assert_eq!(error.details()["timeout_seconds"], Value::from(300));
    }

    #[test]
    fn test_redact_secret() {
        let redacted = redact_secret("user=admin password=s3cret; retry s3cret", "s3cret");
        assert!(!redacted.contains("s3cret"));
        assert_eq!(redacted.matches("****").count(), 2);
    }

    #[test]
    fn test_redact_empty_secret_is_noop() {
        assert_eq!(redact_secret("nothing to hide", ""), "nothing to hide");
    }
}
