//! Warehouse connection descriptor.
//!
//! The core never interprets these fields. It only renders them into the
//! configuration document the rule engine expects.
//!
//! # Security
//! The password lives in a `Zeroizing` container, is cleared on drop, and is
//! omitted from `Debug` and `Display` output.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use zeroize::Zeroizing;

/// Data-source name bound into every engine session unless configured otherwise.
pub const DEFAULT_DATA_SOURCE_NAME: &str = "snowflake_api";

/// Query tag attached to every warehouse session opened by the engine.
pub const QUERY_TAG: &str = "soda-data-quality-api";

fn default_role() -> Option<String> {
    Some("PUBLIC".to_string())
}

#[allow(clippy::unnecessary_wraps)]
const fn default_connection_timeout() -> Option<u64> {
    Some(240)
}

/// Snowflake connection settings supplied with a validation request.
///
/// # Example
/// ```rust
/// use qualigate_core::connection::SnowflakeConfig;
///
/// let config = SnowflakeConfig::new(
///     "acme.snowflakecomputing.com",
///     "analyst",
///     "secret",
///     "SALES",
///     "COMPUTE_WH",
///     "PUBLIC",
/// );
/// assert_eq!(config.role.as_deref(), Some("PUBLIC"));
/// assert!(!format!("{config:?}").contains("secret"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    /// Account identifier
    pub account: String,
    /// Login name
    pub username: String,
    /// Login password, zeroized on drop
    #[serde(serialize_with = "serialize_redacted")]
    pub password: Zeroizing<String>,
    /// Database name
    pub database: String,
    /// Warehouse name
    pub warehouse: String,
    /// Schema name
    pub schema: String,
    /// Role, `PUBLIC` when omitted
    #[serde(default = "default_role")]
    pub role: Option<String>,
    /// Connection timeout in seconds, 240 when omitted
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: Option<u64>,
}

fn serialize_redacted<S>(_: &Zeroizing<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("****")
}

impl std::fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("database", &self.database)
            .field("warehouse", &self.warehouse)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("connection_timeout", &self.connection_timeout)
            .finish_non_exhaustive()
        // Intentionally omit username and password
    }
}

impl std::fmt::Display for SnowflakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "snowflake://{}/{}/{}?warehouse={}",
            self.account, self.database, self.schema, self.warehouse
        )
    }
}

impl SnowflakeConfig {
    /// Creates a descriptor with the default role and timeout.
    pub fn new(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        warehouse: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            password: Zeroizing::new(password.into()),
            database: database.into(),
            warehouse: warehouse.into(),
            schema: schema.into(),
            role: default_role(),
            connection_timeout: default_connection_timeout(),
        }
    }

    /// Builder method to set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Builder method to set the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout(mut self, seconds: u64) -> Self {
        self.connection_timeout = Some(seconds);
        self
    }

    /// Password, for rendering and redaction only.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Renders the engine configuration document for `data_source_name`.
    ///
    /// Every connection value is written as a double-quoted scalar, so the
    /// engine reads it verbatim. The result contains the plain password and
    /// must never be logged.
    pub fn to_configuration_yaml(&self, data_source_name: &str) -> Zeroizing<String> {
        let mut doc = Zeroizing::new(String::new());
        // Writing into a String cannot fail.
        let _ = write!(
            doc,
            "\ndata_source {data_source_name}:\n  type: snowflake\n  account: {}\n  username: {}\n  password: {}\n  database: {}\n  warehouse: {}\n  schema: {}\n",
            *yaml_scalar(&self.account),
            *yaml_scalar(&self.username),
            *yaml_scalar(&self.password),
            *yaml_scalar(&self.database),
            *yaml_scalar(&self.warehouse),
            *yaml_scalar(&self.schema),
        );
        if let Some(role) = &self.role {
            let _ = writeln!(doc, "  role: {}", *yaml_scalar(role));
        }
        if let Some(timeout) = self.connection_timeout {
            let _ = writeln!(doc, "  connection_timeout: {timeout}");
        }
        let _ = write!(
            doc,
            "  client_session_keep_alive: true\n  session_parameters:\n    QUERY_TAG: {QUERY_TAG}\n"
        );
        doc
    }
}

/// Quotes `value` as a double-quoted YAML scalar.
///
/// JSON string syntax is a subset of YAML's double-quoted style.
fn yaml_scalar(value: &str) -> Zeroizing<String> {
    Zeroizing::new(serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string()))
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
    fn test_defaults() {
        let config = config();
        assert_eq!(config.role.as_deref(), Some("PUBLIC"));
        assert_eq!(config.connection_timeout, Some(240));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SnowflakeConfig = serde_json::from_value(serde_json::json!({
            "account": "a",
            "username": "u",
            "password": "p",
            "database": "d",
            "warehouse": "w",
            "schema": "s"
        }))
        .unwrap();
        assert_eq!(config.role.as_deref(), Some("PUBLIC"));
        assert_eq!(config.connection_timeout, Some(240));
        assert_eq!(config.password(), "p");
    }

    #[test]
    fn test_deserialize_missing_required_fails() {
        let result: Result<SnowflakeConfig, _> = serde_json::from_value(serde_json::json!({
            "account": "test.snowflakecomputing.com",
            "username": "testuser"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_configuration_yaml() {
        let yaml = config()
            .with_role("ANALYST")
            .to_configuration_yaml("test_source");

        assert!(yaml.contains("data_source test_source:"));
        assert!(yaml.contains("type: snowflake"));
        assert!(yaml.contains("account: \"test.snowflakecomputing.com\""));
        assert!(yaml.contains("username: \"testuser\""));
        assert!(yaml.contains("password: \"testpass\""));
        assert!(yaml.contains("role: \"ANALYST\""));
        assert!(yaml.contains("connection_timeout: 240"));
        assert!(yaml.contains("client_session_keep_alive: true"));
        assert!(yaml.contains("QUERY_TAG: soda-data-quality-api"));
    }

    #[test]
    fn test_configuration_yaml_quotes_special_characters() {
        let config = SnowflakeConfig::new(
            "acct: eu-west",
            "user\n  role: ACCOUNTADMIN",
            "pa ss #42",
            "TESTDB",
            "TESTWH",
            "PUBLIC",
        );
        let yaml = config.to_configuration_yaml(DEFAULT_DATA_SOURCE_NAME);

        assert!(yaml.contains("  password: \"pa ss #42\"\n"));
        assert!(yaml.contains("  account: \"acct: eu-west\"\n"));
        assert!(yaml.contains("  username: \"user\\n  role: ACCOUNTADMIN\"\n"));
        let role_keys = yaml.lines().filter(|line| line.starts_with("  role:")).count();
        assert_eq!(role_keys, 1);
    }

    #[test]
    fn test_configuration_yaml_without_optional_fields() {
        let mut config = config();
        config.role = None;
        config.connection_timeout = None;
        let yaml = config.to_configuration_yaml(DEFAULT_DATA_SOURCE_NAME);

        assert!(!yaml.contains("role:"));
        assert!(!yaml.contains("connection_timeout:"));
        assert!(yaml.contains("data_source snowflake_api:"));
    }

    #[test]
    fn test_debug_and_display_hide_credentials() {
        let config = config();
        let debug = format!("{config:?}");
        let display = config.to_string();

        for rendered in [&debug, &display] {
            assert!(!rendered.contains("testpass"));
            assert!(!rendered.contains("testuser"));
        }
        assert!(display.contains("TESTDB"));
    }

    #[test]
    fn test_serialize_redacts_password() {
        let json = serde_json::to_string(&config()).unwrap();
        assert!(!json.contains("testpass"));
        assert!(json.contains("****"));
    }
}
