//! Process-based runtime

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use replcap_common::{ErrorKind, ErrorRecord, ExecutionResult};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Process-based runtime - one engine process per invocation.
///
/// The code is written to the child's stdin and the child is expected to
/// print exactly one result document on stdout. A child that outlives the
/// deadline is killed.
pub struct ProcessRuntime {
    program: PathBuf,
    args: Vec<String>,
    deadline: Duration,
}

impl ProcessRuntime {
    /// Spawn `program run -`, waiting at most `deadline` for it
    pub fn new(program: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            args: vec!["run".to_string(), "-".to_string()],
            deadline,
        }
    }

    /// Build from config: the child gets the configured budget and is allowed
    /// `grace` on top of it for startup and shutdown.
    pub fn from_config(config: &EngineConfig) -> Self {
        let budget = config.limits.budget;
        Self {
            program: config.host.engine_program.clone(),
            args: vec![
                "run".to_string(),
                "--budget-ms".to_string(),
                budget.as_millis().to_string(),
                "-".to_string(),
            ],
            deadline: budget + config.host.grace,
        }
    }

    /// Replace the arguments passed to the engine program
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl super::Runtime for ProcessRuntime {
    async fn execute(&self, code: String) -> EngineResult<ExecutionResult> {
        let program = self.program.display().to_string();

        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .env("RUST_LOG", "error")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(program = %program, "engine binary not found");
                return Ok(ExecutionResult::failed(
                    format!("Error: engine binary `{}` not found. Is it installed and on PATH?", program),
                    ErrorRecord::new(ErrorKind::SystemError, "Engine not found"),
                ));
            }
            Err(source) => return Err(EngineError::Spawn { program, source }),
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(code.as_bytes()).await?;
            // Dropping closes the pipe so the engine sees EOF
        }

        // The child moves into the future; on timeout the future is dropped
        // and kill_on_drop reaps the process.
        let output = match tokio::time::timeout(self.deadline, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(
                    program = %program,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "engine process exceeded deadline, killed"
                );
                return Ok(ExecutionResult::failed(
                    "",
                    ErrorRecord::new(
                        ErrorKind::TimeoutError,
                        format!(
                            "Engine process did not finish within {}ms",
                            self.deadline.as_millis()
                        ),
                    ),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            status = ?output.status.code(),
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "engine process exited"
        );
        Ok(interpret_output(&stdout, &stderr))
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Turn an engine process's stdout and stderr into a result document.
///
/// Stdout that is not a result document is passed through as output with an
/// `ExecutionError`. Anything on stderr is appended to the output.
pub fn interpret_output(stdout: &str, stderr: &str) -> ExecutionResult {
    let mut result = match serde_json::from_str::<ExecutionResult>(stdout.trim()) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(error = %e, "engine stdout is not a result document");
            ExecutionResult::failed(
                stdout,
                ErrorRecord::new(ErrorKind::ExecutionError, "Invalid JSON output from engine"),
            )
        }
    };

    let stderr = stderr.trim_end();
    if !stderr.is_empty() {
        if !result.output.is_empty() && !result.output.ends_with('\n') {
            result.output.push('\n');
        }
        result.output.push_str("Engine stderr: ");
        result.output.push_str(stderr);
    }
    result
}
