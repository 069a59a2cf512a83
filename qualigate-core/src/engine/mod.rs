//! Rule-engine traits.
//!
//! The rule engine is an external collaborator: it parses the quality-check
//! language, runs the compiled checks against the warehouse and aggregates
//! outcomes. This module only defines the seam the executor drives.
//!
//! # Reentrancy
//! Engine sessions are not safe to use concurrently, even across distinct
//! sessions. Every trait method that creates or runs a session therefore
//! takes a [`ScanPermit`], which can only be obtained by holding the
//! process-wide scan section.
//!
//! # Module Structure
//! - `soda_cli`: adapter driving the external `soda` command-line tool

use zeroize::Zeroizing;

use crate::executor::ScanPermit;
use crate::models::RawEngineResult;

pub mod soda_cli;

pub use soda_cli::SodaCliEngine;

/// Errors raised by an engine while building or running a session.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine rejected a configuration or checks document
    #[error("engine configuration rejected: {0}")]
    Configuration(String),

    /// The run itself failed
    #[error("engine run failed: {0}")]
    Run(String),

    /// The run was stopped because the caller abandoned the execution
    #[error("engine run cancelled")]
    Cancelled,

    /// Local I/O failed (scratch files, process spawn)
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine output could not be decoded
    #[error("{context}: {source}")]
    Results {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Everything bound into a session before it runs.
#[derive(Clone)]
pub struct SessionConfig {
    /// Data-source name referenced by the configuration document
    pub data_source_name: String,
    /// Run name
    pub scan_definition_name: String,
    /// Connection configuration document (contains the password)
    pub configuration: Zeroizing<String>,
    /// Checks document
    pub checks: String,
    /// Ask the engine for verbose logs
    pub verbose: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("data_source_name", &self.data_source_name)
            .field("scan_definition_name", &self.scan_definition_name)
            .field("checks", &self.checks)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// Factory for engine sessions.
///
/// # Object Safety
/// This trait is object-safe; the executor holds it as `Arc<dyn ScanEngine>`.
pub trait ScanEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Constructs a fresh session. Sessions are never reused.
    ///
    /// # Errors
    /// Returns an error if the engine cannot allocate a session.
    fn new_session(&self, permit: &ScanPermit<'_>) -> Result<Box<dyn EngineSession>, EngineError>;
}

/// One non-reentrant engine session.
pub trait EngineSession {
    /// Binds the data source, run name, configuration and checks.
    ///
    /// # Errors
    /// Returns an error if the engine rejects either document.
    fn configure(&mut self, config: &SessionConfig) -> Result<(), EngineError>;

    /// Runs the configured checks once, returning the engine exit code if it
    /// reports one.
    ///
    /// # Errors
    /// Returns an error if the run cannot complete.
    fn run(&mut self, permit: &ScanPermit<'_>) -> Result<Option<i32>, EngineError>;

    /// Results of the last run.
    fn results(&self) -> RawEngineResult;

    /// Log text accumulated by the session.
    fn logs_text(&self) -> String;

    /// Releases engine-held resources. Called exactly once, on every path.
    fn close(&mut self) {}
}
