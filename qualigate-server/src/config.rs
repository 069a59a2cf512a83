//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, ValueEnum};
use qualigate_core::{
    ExecutorConfig, LogFormat, connection::DEFAULT_DATA_SOURCE_NAME,
    executor::DEFAULT_WORKERS,
};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Qualigate server command line.
#[derive(Debug, Parser)]
#[command(name = "qualigate-server")]
#[command(about = "Data-quality validation service")]
#[command(version)]
#[command(long_about = "
Qualigate - data-quality validation over HTTP

Accepts a Snowflake connection, a table or SQL query and a block of quality
rules, runs them through the soda rule engine and returns a quality report.

Engine sessions are serialized process-wide; concurrent requests queue for a
bounded number of scan slots.

ENDPOINTS:
  GET  /                           health check
  GET  /validation-rules-examples  sample rule blocks
  POST /validate                   run a validation

EXAMPLES:
  qualigate-server --bind 127.0.0.1:8000
  QUALIGATE_WORKERS=2 QUALIGATE_TIMEOUT_SECS=120 qualigate-server -v
")]
pub struct Cli {
    /// Logging flags
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Listen address
    #[arg(long, env = "QUALIGATE_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Scan jobs admitted at once
    #[arg(long, env = "QUALIGATE_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Bound on each request's wait, queueing included
    #[arg(long, env = "QUALIGATE_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Path to the soda executable
    #[arg(long, env = "QUALIGATE_SODA_BIN", default_value = "soda")]
    pub soda_bin: PathBuf,

    /// Data-source name bound into every scan
    #[arg(long, env = "QUALIGATE_DATA_SOURCE", default_value = DEFAULT_DATA_SOURCE_NAME)]
    pub data_source: String,

    /// Do not pass the verbose flag to the rule engine
    #[arg(long)]
    pub quiet_engine: bool,
}

/// Flags shared by every Qualigate binary.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log line encoding
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

/// CLI spelling of [`LogFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

impl Cli {
    /// Executor settings derived from the flags. Call
    /// [`ExecutorConfig::validate`] (or build the executor) to check them.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new()
            .with_workers(self.workers)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_data_source_name(self.data_source.clone())
            .with_verbose(!self.quiet_engine)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["qualigate-server"]).unwrap();
        assert_eq!(cli.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(cli.global.log_format, LogFormatArg::Text);

        let config = cli.executor_config();
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.data_source_name, "snowflake_api");
        assert!(config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "qualigate-server",
            "-vv",
            "--workers",
            "2",
            "--timeout-secs",
            "30",
            "--data-source",
            "warehouse_eu",
            "--quiet-engine",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 2);
        assert_eq!(LogFormat::from(cli.global.log_format), LogFormat::Json);

        let config = cli.executor_config();
        assert_eq!(config.workers, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.data_source_name, "warehouse_eu");
        assert!(!config.verbose);
    }

    #[test]
    fn test_invalid_worker_count_rejected_by_executor_config() {
        let cli = Cli::try_parse_from(["qualigate-server", "--workers", "0"]).unwrap();
        assert!(cli.executor_config().validate().is_err());
    }

    #[test]
    fn test_quiet_engine_help_matches_behavior() {
        use clap::CommandFactory;

        let command = Cli::command();
        let quiet = command
            .get_arguments()
            .find(|arg| arg.get_id() == "quiet_engine")
            .unwrap();
        assert_eq!(
            quiet.get_help().unwrap().to_string(),
            "Do not pass the verbose flag to the rule engine"
        );
        command.debug_assert();
    }
}
