//! Serialized scan executor.
//!
//! Validation requests arrive concurrently from the HTTP front end, but the
//! rule engine must never run two sessions at once in one process. The
//! executor reconciles the two:
//!
//! - A request first waits for one of a fixed number of job slots (a tokio
//!   semaphore, granted in arrival order), then runs on the blocking thread
//!   pool; the caller awaits it without blocking a runtime thread.
//! - The blocking job takes the [`ScanSection`] for the whole construct,
//!   configure, run and teardown span of one session. Teardown runs on every
//!   exit path, including panics, before the section is released.
//! - The caller's wait is bounded. When it expires the job's cancellation
//!   token fires: a job that has not reached the section yet is skipped, and
//!   a running engine may stop early if it watches its permit.

mod section;

pub use section::{ScanPermit, ScanSection};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::connection::DEFAULT_DATA_SOURCE_NAME;
use crate::engine::{EngineError, EngineSession, ScanEngine, SessionConfig};
use crate::error::{QualigateError, Result, redact_secret};
use crate::models::{ExecutionId, ValidationReport};
use crate::report::{RunMetadata, extract_report};
use crate::request::{ScanTarget, ValidationRequest, build_checks_document};

/// Default number of concurrent scan jobs.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on concurrent scan jobs.
pub const MAX_WORKERS: usize = 64;

/// Default caller-visible wait bound.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Jobs allowed past the queue at once; the section still admits one
    pub workers: usize,
    /// Bound on the caller's total wait, queueing included
    pub timeout: Duration,
    /// Data-source name bound into every session
    pub data_source_name: String,
    /// Ask the engine for verbose logs
    pub verbose: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: DEFAULT_TIMEOUT,
            data_source_name: DEFAULT_DATA_SOURCE_NAME.to_string(),
            verbose: true,
        }
    }
}

impl ExecutorConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder method to set the wait bound.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the data-source name.
    #[must_use]
    pub fn with_data_source_name(mut self, name: impl Into<String>) -> Self {
        self.data_source_name = name.into();
        self
    }

    /// Builder method to toggle verbose engine logs.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validates executor settings.
    ///
    /// # Errors
    /// Returns a configuration error if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(QualigateError::configuration(
                "workers must be greater than 0",
            ));
        }

        if self.workers > MAX_WORKERS {
            return Err(QualigateError::configuration(format!(
                "workers should not exceed {MAX_WORKERS}"
            )));
        }

        if self.timeout.is_zero() {
            return Err(QualigateError::configuration(
                "timeout must be greater than 0",
            ));
        }

        let identifier = Regex::new(r"^[A-Za-z0-9_]+$").map_err(|e| {
            QualigateError::configuration(format!("Invalid identifier pattern: {e}"))
        })?;
        if !identifier.is_match(&self.data_source_name) {
            return Err(QualigateError::configuration(
                "data_source_name must contain only letters, digits and underscores",
            ));
        }

        Ok(())
    }
}

/// Runs validation requests one engine session at a time.
///
/// Construct one per process and share it by `Arc`.
pub struct ScanExecutor {
    engine: Arc<dyn ScanEngine>,
    section: Arc<ScanSection>,
    slots: Arc<Semaphore>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for ScanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanExecutor")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScanExecutor {
    /// Validates `config` and sizes the job slots.
    ///
    /// # Errors
    /// Returns a configuration error for invalid settings.
    pub fn new(engine: Arc<dyn ScanEngine>, config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        info!(
            engine = engine.name(),
            workers = config.workers,
            timeout_secs = config.timeout.as_secs(),
            "Scan executor started"
        );

        Ok(Self {
            engine,
            section: Arc::new(ScanSection::new()),
            slots: Arc::new(Semaphore::new(config.workers)),
            config,
        })
    }

    /// Active settings.
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The section serializing engine sessions.
    pub fn section(&self) -> &ScanSection {
        &self.section
    }

    /// Runs `request` under a freshly minted execution id.
    ///
    /// # Errors
    /// See [`ScanExecutor::execute_with_id`].
    pub async fn execute(&self, request: ValidationRequest) -> Result<ValidationReport> {
        self.execute_with_id(ExecutionId::new(), request).await
    }

    /// Runs `request` and waits for its report.
    ///
    /// Dropping the returned future abandons the wait exactly like a timeout.
    ///
    /// # Errors
    /// - `configuration_error` if the request is invalid (nothing is queued)
    /// - `timeout` if the report is not ready within the configured bound
    /// - `scan_execution_error` if the engine fails
    /// - `execution_error` for job panics or a shut-down executor
    pub async fn execute_with_id(
        &self,
        execution_id: ExecutionId,
        request: ValidationRequest,
    ) -> Result<ValidationReport> {
        let target = request.validate()?;
        let target_kind = match &target {
            ScanTarget::Query(_) => "query",
            ScanTarget::Table(_) => "table",
        };

        info!(
            execution_id = %execution_id,
            scan_name = %request.scan_name,
            target_kind,
            "Starting validation scan"
        );

        let cancel = CancellationToken::new();
        let job = ScanJob {
            engine: Arc::clone(&self.engine),
            section: Arc::clone(&self.section),
            execution_id,
            session_config: SessionConfig {
                data_source_name: self.config.data_source_name.clone(),
                scan_definition_name: request.scan_name.clone(),
                configuration: request
                    .snowflake_config
                    .to_configuration_yaml(&self.config.data_source_name),
                checks: build_checks_document(Some(&target), &request.validation_rules),
                verbose: self.config.verbose,
            },
            password: Zeroizing::new(request.snowflake_config.password().to_string()),
            cancel: cancel.clone(),
        };

        let _abandon_on_exit = cancel.drop_guard();

        let work = async {
            let slot = Arc::clone(&self.slots)
                .acquire_owned()
                .await
                .map_err(|_| QualigateError::execution("Scan executor is shut down"))?;

            let handle = tokio::task::spawn_blocking(move || {
                let _slot = slot;
                job.run()
            });

            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic().as_ref());
                    error!(execution_id = %execution_id, "Scan job panicked: {}", message);
                    Err(QualigateError::execution(format!(
                        "Scan worker panicked: {message}"
                    )))
                }
                Err(e) => Err(QualigateError::execution(format!(
                    "Scan job did not complete: {e}"
                ))),
            }
        };

        match tokio::time::timeout(self.config.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    execution_id = %execution_id,
                    timeout_secs = self.config.timeout.as_secs(),
                    "Validation timed out"
                );
                Err(QualigateError::timeout(self.config.timeout))
            }
        }
    }

    /// Waits for queued and in-flight jobs to finish, then stops accepting
    /// work. Later calls to [`ScanExecutor::execute`] fail with
    /// `execution_error`.
    pub async fn shutdown(&self) {
        info!("Shutting down scan executor");
        let width = u32::try_from(self.config.workers).unwrap_or(u32::MAX);
        match self.slots.acquire_many(width).await {
            Ok(drained) => {
                self.slots.close();
                drop(drained);
            }
            Err(_) => debug!("Scan executor already shut down"),
        }
    }
}

/// Everything a worker needs to run one request.
struct ScanJob {
    engine: Arc<dyn ScanEngine>,
    section: Arc<ScanSection>,
    execution_id: ExecutionId,
    session_config: SessionConfig,
    password: Zeroizing<String>,
    cancel: CancellationToken,
}

/// Closes the session when dropped, so teardown happens on every exit path.
struct SessionGuard(Box<dyn EngineSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl ScanJob {
    fn run(self) -> Result<ValidationReport> {
        let id = self.execution_id;

        if self.cancel.is_cancelled() {
            debug!(execution_id = %id, "Skipping abandoned validation before it started");
            return Err(QualigateError::execution("Validation abandoned before it started"));
        }

        let permit = self.section.acquire(id, self.cancel.clone());
        if permit.is_cancelled() {
            debug!(execution_id = %id, "Skipping abandoned validation at the scan section");
            return Err(QualigateError::execution("Validation abandoned before it started"));
        }
        debug!(execution_id = %id, "Acquired scan section");

        let started_at = Utc::now();
        let clock = Instant::now();

        // Declared after the permit so it drops, and closes, first.
        let mut session = SessionGuard(
            self.engine
                .new_session(&permit)
                .map_err(|e| self.scan_failed(&e))?,
        );

        session
            .0
            .configure(&self.session_config)
            .map_err(|e| self.scan_failed(&e))?;
        let exit_code = session.0.run(&permit).map_err(|e| self.scan_failed(&e))?;
        let duration = clock.elapsed();

        let raw = session.0.results();
        let logs = redact_secret(&session.0.logs_text(), &self.password);
        drop(session);
        drop(permit);
        debug!(execution_id = %id, "Released scan section");

        let report = extract_report(
            &raw,
            RunMetadata {
                execution_id: id,
                exit_code,
                started_at,
                duration,
                logs,
            },
        );

        info!(
            execution_id = %id,
            status = %report.status,
            total = report.counts.total,
            duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            "Validation scan completed"
        );

        Ok(report)
    }

    fn scan_failed(&self, error: &EngineError) -> QualigateError {
        let message = redact_secret(&error.to_string(), &self.password);
        error!(execution_id = %self.execution_id, "Scan execution failed: {}", message);
        QualigateError::scan_execution(message)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
