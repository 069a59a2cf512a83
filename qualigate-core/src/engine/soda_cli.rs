//! Engine adapter for the `soda` command-line tool.
//!
//! Each session gets a private scratch directory holding the configuration
//! document, the checks document, the combined process output and the
//! results file. The directory is removed when the session closes.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{EngineError, EngineSession, ScanEngine, SessionConfig};
use crate::executor::ScanPermit;
use crate::models::{RawCheck, RawEngineResult};

const CONFIGURATION_FILE: &str = "configuration.yml";
const CHECKS_FILE: &str = "checks.yml";
const RESULTS_FILE: &str = "scan_results.json";
const OUTPUT_FILE: &str = "scan_output.log";

/// Lines of process output quoted when a run produces no results file.
const OUTPUT_TAIL_LINES: usize = 20;

/// Shape of the results file written by `soda scan -srf`.
#[derive(Debug, Deserialize)]
struct ScanResultsFile {
    #[serde(default)]
    checks: Vec<RawCheck>,
}

/// Runs scans by spawning the `soda` executable.
#[derive(Debug, Clone)]
pub struct SodaCliEngine {
    program: PathBuf,
    poll_interval: Duration,
}

impl SodaCliEngine {
    /// Creates an engine that invokes `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Builder method to set how often a running process is polled for
    /// completion and cancellation.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The executable this engine spawns.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for SodaCliEngine {
    fn default() -> Self {
        Self::new("soda")
    }
}

impl ScanEngine for SodaCliEngine {
    fn name(&self) -> &'static str {
        "soda-cli"
    }

    fn new_session(&self, permit: &ScanPermit<'_>) -> Result<Box<dyn EngineSession>, EngineError> {
        // tempfile creates the directory with owner-only permissions.
        let workdir = tempfile::Builder::new()
            .prefix("qualigate-scan-")
            .tempdir()
            .map_err(|e| EngineError::io("Failed to create scan directory", e))?;

        debug!(
            execution_id = %permit.execution_id(),
            workdir = %workdir.path().display(),
            "Created soda session"
        );

        Ok(Box::new(SodaCliSession {
            program: self.program.clone(),
            poll_interval: self.poll_interval,
            workdir: Some(workdir),
            config: None,
            results: RawEngineResult::default(),
            logs: String::new(),
        }))
    }
}

struct SodaCliSession {
    program: PathBuf,
    poll_interval: Duration,
    workdir: Option<TempDir>,
    config: Option<SessionConfig>,
    results: RawEngineResult,
    logs: String,
}

impl SodaCliSession {
    fn workdir(&self) -> Result<&Path, EngineError> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| EngineError::Run("session already closed".to_string()))
    }

    fn build_command(&self, dir: &Path, config: &SessionConfig) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("scan")
            .arg("-d")
            .arg(&config.data_source_name)
            .arg("-c")
            .arg(dir.join(CONFIGURATION_FILE))
            .arg("-s")
            .arg(&config.scan_definition_name)
            .arg("-srf")
            .arg(dir.join(RESULTS_FILE));
        if config.verbose {
            command.arg("-V");
        }
        command.arg(dir.join(CHECKS_FILE)).current_dir(dir);
        command
    }

    fn read_output(dir: &Path) -> String {
        std::fs::read(dir.join(OUTPUT_FILE))
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }

    fn output_tail(&self) -> String {
        let lines: Vec<&str> = self.logs.lines().collect();
        let skip = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
        lines[skip..].join("\n")
    }
}

impl EngineSession for SodaCliSession {
    fn configure(&mut self, config: &SessionConfig) -> Result<(), EngineError> {
        let dir = self.workdir()?.to_path_buf();

        std::fs::write(dir.join(CONFIGURATION_FILE), config.configuration.as_bytes())
            .map_err(|e| EngineError::io("Failed to write configuration document", e))?;
        std::fs::write(dir.join(CHECKS_FILE), config.checks.as_bytes())
            .map_err(|e| EngineError::io("Failed to write checks document", e))?;

        self.config = Some(config.clone());
        Ok(())
    }

    fn run(&mut self, permit: &ScanPermit<'_>) -> Result<Option<i32>, EngineError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| EngineError::Configuration("session was not configured".to_string()))?;
        let dir = self.workdir()?.to_path_buf();

        let output = File::create(dir.join(OUTPUT_FILE))
            .map_err(|e| EngineError::io("Failed to create output log", e))?;
        let stderr = output
            .try_clone()
            .map_err(|e| EngineError::io("Failed to share output log", e))?;

        let mut child = self
            .build_command(&dir, config)
            .stdin(Stdio::null())
            .stdout(Stdio::from(output))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                EngineError::io(format!("Failed to start {}", self.program.display()), e)
            })?;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if permit.is_cancelled() => {
                    warn!(
                        execution_id = %permit.execution_id(),
                        "Execution abandoned by caller, stopping soda process"
                    );
                    if let Err(e) = child.kill() {
                        warn!("Failed to kill soda process: {}", e);
                    }
                    let _ = child.wait();
                    self.logs = Self::read_output(&dir);
                    return Err(EngineError::Cancelled);
                }
                Ok(None) => std::thread::sleep(self.poll_interval),
                Err(e) => return Err(EngineError::io("Failed to poll soda process", e)),
            }
        };

        self.logs = Self::read_output(&dir);

        let Some(exit_code) = status.code() else {
            return Err(EngineError::Run(format!(
                "soda terminated by signal\n{}",
                self.output_tail()
            )));
        };

        let results_path = dir.join(RESULTS_FILE);
        if !results_path.exists() {
            return Err(EngineError::Run(format!(
                "soda exited with code {exit_code} without writing results\n{}",
                self.output_tail()
            )));
        }

        let bytes = std::fs::read(&results_path)
            .map_err(|e| EngineError::io("Failed to read scan results", e))?;
        let parsed: ScanResultsFile =
            serde_json::from_slice(&bytes).map_err(|e| EngineError::Results {
                context: "Failed to parse scan results".to_string(),
                source: e,
            })?;

        self.results = RawEngineResult::new(parsed.checks);
        Ok(Some(exit_code))
    }

    fn results(&self) -> RawEngineResult {
        self.results.clone()
    }

    fn logs_text(&self) -> String {
        self.logs.clone()
    }

    fn close(&mut self) {
        self.config = None;
        if let Some(workdir) = self.workdir.take()
            && let Err(e) = workdir.close()
        {
            warn!("Failed to remove scan directory: {}", e);
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::executor::ScanSection;
    use crate::models::{CheckOutcome, ExecutionId};
    use std::os::unix::fs::PermissionsExt;
    use tokio_util::sync::CancellationToken;
    use zeroize::Zeroizing;

    /// Writes an executable shell script standing in for `soda`.
    fn fake_soda(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("soda");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            data_source_name: "snowflake_api".to_string(),
            scan_definition_name: "nightly".to_string(),
            configuration: Zeroizing::new("data_source snowflake_api:\n".to_string()),
            checks: "checks for ORDERS:\n- row_count > 0\n".to_string(),
            verbose: true,
        }
    }

    // Locates the results-file argument following -srf and writes to it.
    const WRITE_RESULTS: &str = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-srf" ]; then out="$arg"; fi
  prev="$arg"
done
echo "args: $*"
cat > "$out" <<'JSON'
{"checks": [
  {"name": "row_count > 0", "table": "ORDERS", "outcome": "pass", "checkValue": 42, "value": 42},
  {"name": "missing_count(id) = 0", "table": "ORDERS", "column": "id", "outcome": "fail",
   "diagnostics": {"blocks": [{"failedRows": [{"id": null}]}]}}
]}
JSON
echo "scan done" 1>&2
exit 2
"#;

    #[test]
    fn test_run_parses_results_and_captures_output() {
        let bin = tempfile::tempdir().unwrap();
        let engine = SodaCliEngine::new(fake_soda(bin.path(), WRITE_RESULTS))
            .with_poll_interval(Duration::from_millis(10));
        let section = ScanSection::new();
        let permit = section.acquire(ExecutionId::new(), CancellationToken::new());

        let mut session = engine.new_session(&permit).unwrap();
        session.configure(&session_config()).unwrap();
        let exit_code = session.run(&permit).unwrap();

        assert_eq!(exit_code, Some(2));
        let results = session.results();
        assert_eq!(results.checks.len(), 2);
        assert_eq!(results.checks[0].value, Some(serde_json::json!(42)));
        assert_eq!(results.checks[1].outcome, CheckOutcome::Fail);
        assert_eq!(results.checks[1].failed_rows().count(), 1);

        let logs = session.logs_text();
        assert!(logs.contains("scan done"));
        assert!(logs.contains("-d snowflake_api"));
        assert!(logs.contains("-s nightly"));
        assert!(logs.contains("-V"));
        session.close();
    }

    #[test]
    fn test_missing_results_file_is_run_error() {
        let bin = tempfile::tempdir().unwrap();
        let engine = SodaCliEngine::new(fake_soda(bin.path(), "echo 'connection refused'\nexit 3"))
            .with_poll_interval(Duration::from_millis(10));
        let section = ScanSection::new();
        let permit = section.acquire(ExecutionId::new(), CancellationToken::new());

        let mut session = engine.new_session(&permit).unwrap();
        session.configure(&session_config()).unwrap();
        let error = session.run(&permit).unwrap_err();

        let message = error.to_string();
        assert!(message.contains("code 3"));
        assert!(message.contains("connection refused"));
    }

    #[test]
    fn test_cancelled_run_kills_process() {
        let bin = tempfile::tempdir().unwrap();
        let engine = SodaCliEngine::new(fake_soda(bin.path(), "sleep 30"))
            .with_poll_interval(Duration::from_millis(10));
        let section = ScanSection::new();
        let cancel = CancellationToken::new();
        let permit = section.acquire(ExecutionId::new(), cancel.clone());

        let mut session = engine.new_session(&permit).unwrap();
        session.configure(&session_config()).unwrap();
        cancel.cancel();

        let started = std::time::Instant::now();
        let error = session.run(&permit).unwrap_err();
        assert!(matches!(error, EngineError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_close_removes_scratch_directory() {
        let engine = SodaCliEngine::default();
        let section = ScanSection::new();
        let permit = section.acquire(ExecutionId::new(), CancellationToken::new());

        let mut session = engine.new_session(&permit).unwrap();
        session.configure(&session_config()).unwrap();
        session.close();
        assert!(session.configure(&session_config()).is_err());
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let engine = SodaCliEngine::new("/nonexistent/qualigate-soda");
        let section = ScanSection::new();
        let permit = section.acquire(ExecutionId::new(), CancellationToken::new());

        let mut session = engine.new_session(&permit).unwrap();
        session.configure(&session_config()).unwrap();
        assert!(matches!(
            session.run(&permit).unwrap_err(),
            EngineError::Io { .. }
        ));
    }
}
