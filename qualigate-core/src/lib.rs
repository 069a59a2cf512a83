//! Core data structures and execution for Qualigate.
//!
//! This crate turns a validation request (warehouse connection, query or
//! table, quality rules) into a quality report by driving an external rule
//! engine. The engine is treated as an opaque collaborator; this crate owns
//! request validation, document assembly, serialization of engine sessions,
//! report shaping and error translation.
//!
//! # Guarantees
//! - At most one engine session runs per process at any time
//! - Engine teardown happens on every exit path before the section is freed
//! - Connection passwords are zeroized and redacted from logs and errors
//!
//! # Architecture
//! - `request` validates input and builds the engine documents
//! - `executor` queues work onto a bounded pool and serializes sessions
//! - `engine` defines the collaborator seam and the `soda` CLI adapter
//! - `report` derives the immutable report from raw engine output

pub mod connection;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod report;
pub mod request;

// Re-export commonly used types
pub use connection::SnowflakeConfig;
pub use engine::{EngineError, EngineSession, ScanEngine, SessionConfig, SodaCliEngine};
pub use error::{ErrorKind, QualigateError, Result};
pub use executor::{ExecutorConfig, ScanExecutor, ScanPermit};
pub use logging::{LogFormat, init_logging};
pub use models::{
    CheckCounts, CheckOutcome, CheckResult, ExecutionId, FailedRowSample, RawCheck,
    RawEngineResult, ScanStatus, ValidationReport,
};
pub use request::{ScanTarget, ValidationRequest, build_checks_document};
