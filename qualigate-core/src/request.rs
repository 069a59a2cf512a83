//! Validation requests and checks-document assembly.

use serde::{Deserialize, Serialize};

use crate::connection::SnowflakeConfig;
use crate::error::{QualigateError, Result};

/// Run name used when the caller does not supply one.
pub const DEFAULT_SCAN_NAME: &str = "api_validation";

/// Longest accepted run name, in characters.
pub const MAX_SCAN_NAME_LEN: usize = 256;

fn default_scan_name() -> String {
    DEFAULT_SCAN_NAME.to_string()
}

/// A request to run quality rules against one query or table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Warehouse connection settings
    pub snowflake_config: SnowflakeConfig,
    /// Free-form SQL query to validate
    #[serde(default)]
    pub custom_sql_query: Option<String>,
    /// Table to validate
    #[serde(default)]
    pub table_name: Option<String>,
    /// Rule-language text, opaque to the service
    pub validation_rules: String,
    /// Human-readable run name
    #[serde(default = "default_scan_name")]
    pub scan_name: String,
}

/// What the rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// Free-form SQL, wrapped in parentheses in the checks document
    Query(String),
    /// Table reference, used verbatim
    Table(String),
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

impl ValidationRequest {
    /// Creates a table validation request with the default run name.
    pub fn for_table(
        snowflake_config: SnowflakeConfig,
        table_name: impl Into<String>,
        validation_rules: impl Into<String>,
    ) -> Self {
        Self {
            snowflake_config,
            custom_sql_query: None,
            table_name: Some(table_name.into()),
            validation_rules: validation_rules.into(),
            scan_name: default_scan_name(),
        }
    }

    /// Creates a query validation request with the default run name.
    pub fn for_query(
        snowflake_config: SnowflakeConfig,
        query: impl Into<String>,
        validation_rules: impl Into<String>,
    ) -> Self {
        Self {
            snowflake_config,
            custom_sql_query: Some(query.into()),
            table_name: None,
            validation_rules: validation_rules.into(),
            scan_name: default_scan_name(),
        }
    }

    /// Builder method to set the run name.
    #[must_use]
    pub fn with_scan_name(mut self, scan_name: impl Into<String>) -> Self {
        self.scan_name = scan_name.into();
        self
    }

    /// Resolves the scan target.
    ///
    /// Exactly one of query and table must be present; blank strings count as
    /// absent.
    ///
    /// # Errors
    /// Returns a configuration error when both or neither are present.
    pub fn target(&self) -> Result<ScanTarget> {
        match (
            present(self.custom_sql_query.as_ref()),
            present(self.table_name.as_ref()),
        ) {
            (Some(query), None) => Ok(ScanTarget::Query(query.to_string())),
            (None, Some(table)) => Ok(ScanTarget::Table(table.to_string())),
            (None, None) => Err(QualigateError::configuration(
                "Either custom_sql_query or table_name must be provided",
            )),
            (Some(_), Some(_)) => Err(QualigateError::configuration(
                "Only one of custom_sql_query or table_name may be provided",
            )),
        }
    }

    /// Validates the request and returns its target.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid target or run name.
    pub fn validate(&self) -> Result<ScanTarget> {
        let target = self.target()?;

        let name = self.scan_name.trim();
        if name.is_empty() {
            return Err(QualigateError::configuration("scan_name cannot be empty"));
        }
        if name.chars().count() > MAX_SCAN_NAME_LEN {
            return Err(QualigateError::configuration(format!(
                "scan_name must not exceed {MAX_SCAN_NAME_LEN} characters"
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(QualigateError::configuration(
                "scan_name cannot contain control characters",
            ));
        }

        Ok(target)
    }
}

/// Builds the checks document handed to the engine.
///
/// A query target yields `checks for (<query>):`, a table target yields
/// `checks for <table>:`, each followed by the rules unchanged. Without a
/// target the rules are returned as-is, for callers that assemble the full
/// document themselves.
///
/// # Example
/// ```rust
/// use qualigate_core::request::{ScanTarget, build_checks_document};
///
/// let doc = build_checks_document(
///     Some(&ScanTarget::Table("CUSTOMERS".to_string())),
///     "- row_count > 0",
/// );
/// assert!(doc.contains("checks for CUSTOMERS:\n- row_count > 0"));
/// ```
pub fn build_checks_document(target: Option<&ScanTarget>, rules: &str) -> String {
    match target {
        Some(ScanTarget::Query(query)) => {
            format!("\n# Custom SQL query validation\nchecks for ({query}):\n{rules}\n")
        }
        Some(ScanTarget::Table(table)) => {
            format!("\n# Table validation\nchecks for {table}:\n{rules}\n")
        }
        None => rules.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> SnowflakeConfig {
        SnowflakeConfig::new(
            "test.snowflakecomputing.com",
            "testuser",
            "testpass",
            "TESTDB",
            "TESTWH",
            "PUBLIC",
        )
    }

    #[test]
    fn test_neither_target_is_configuration_error() {
        let mut request = ValidationRequest::for_table(config(), "CUSTOMERS", "- row_count > 0");
        request.table_name = None;

        let error = request.validate().unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::ConfigurationError);
        assert!(error.message().contains("custom_sql_query or table_name"));
    }

    #[test]
    fn test_blank_target_counts_as_absent() {
        let mut request = ValidationRequest::for_table(config(), "   ", "- row_count > 0");
        request.custom_sql_query = Some(String::new());

        assert!(request.target().is_err());
    }

    #[test]
    fn test_both_targets_rejected() {
        let mut request = ValidationRequest::for_table(config(), "CUSTOMERS", "- row_count > 0");
        request.custom_sql_query = Some("SELECT 1".to_string());

        let error = request.target().unwrap_err();
        assert_eq!(error.kind(), crate::ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_scan_name_validation() {
        let request = ValidationRequest::for_table(config(), "T", "- row_count > 0");
        assert!(request.clone().with_scan_name("nightly orders").validate().is_ok());
        assert!(request.clone().with_scan_name("  ").validate().is_err());
        assert!(request.clone().with_scan_name("bad\nname").validate().is_err());
        assert!(
            request
                .with_scan_name("x".repeat(MAX_SCAN_NAME_LEN + 1))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let request: ValidationRequest = serde_json::from_value(serde_json::json!({
            "snowflake_config": {
                "account": "a", "username": "u", "password": "p",
                "database": "d", "warehouse": "w", "schema": "s"
            },
            "table_name": "CUSTOMERS",
            "validation_rules": "- row_count > 0"
        }))
        .unwrap();

        assert_eq!(request.scan_name, DEFAULT_SCAN_NAME);
        assert!(request.custom_sql_query.is_none());
        assert_eq!(request.target().unwrap(), ScanTarget::Table("CUSTOMERS".into()));
    }

    #[test]
    fn test_table_document() {
        let doc = build_checks_document(
            Some(&ScanTarget::Table("CUSTOMERS".to_string())),
            "- row_count > 0",
        );

        assert!(doc.contains("checks for CUSTOMERS:\n- row_count > 0\n"));
    }

    #[test]
    fn test_query_document_parenthesized_once() {
        let query = "SELECT * FROM customers WHERE active = 1";
        let rules = "- row_count > 0\n- missing_count(email) = 0";
        let doc = build_checks_document(Some(&ScanTarget::Query(query.to_string())), rules);

        assert!(doc.contains(&format!("checks for ({query}):\n{rules}")));
        assert_eq!(doc.matches("((").count(), 0);
        assert_eq!(doc.matches("checks for (").count(), 1);
    }

    #[test]
    fn test_no_target_passes_rules_through() {
        let rules = "checks for ORDERS:\n  - row_count > 0\n";
        assert_eq!(build_checks_document(None, rules), rules);
    }
}
