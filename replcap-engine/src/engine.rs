//! Invocation boundary
//!
//! [`Engine::run`] is the one entry point: source text in, exactly one
//! [`ExecutionResult`] out. Script failures are reported inside the result;
//! the call itself cannot fail.

use crate::config::EngineConfig;
use crate::instrument::instrument_mapped;
use crate::limits::ExecutionLimits;
use crate::normalize;
use crate::sandbox::Sandbox;
use replcap_common::{ErrorKind, ErrorRecord, ExecutionId, ExecutionResult};
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Debug, Clone, Default)]
pub struct Engine {
    sandbox: Sandbox,
}

impl Engine {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            sandbox: Sandbox::new(limits),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.limits.clone())
    }

    pub fn limits(&self) -> &ExecutionLimits {
        self.sandbox.limits()
    }

    /// Instrument, execute and normalize one script
    pub fn run(&self, source: &str) -> ExecutionResult {
        let id = ExecutionId::new();
        let span = tracing::debug_span!("run", execution_id = %id, code_len = source.len());
        let _guard = span.enter();

        let result = match catch_unwind(AssertUnwindSafe(|| self.run_stages(source))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(%message, "engine panicked");
                ExecutionResult::failed(
                    "",
                    ErrorRecord::new(
                        ErrorKind::RuntimeError,
                        format!("Engine failure: {}", message),
                    ),
                )
            }
        };

        match &result.error {
            None => tracing::debug!(output_len = result.output.len(), "script completed"),
            Some(error) => tracing::debug!(
                kind = %error.kind,
                line = ?error.line,
                column = ?error.column,
                "script failed"
            ),
        }
        result
    }

    fn run_stages(&self, source: &str) -> ExecutionResult {
        let instrumented = match instrument_mapped(source) {
            Ok(instrumented) => instrumented,
            Err(failure) => {
                return ExecutionResult::failed("", normalize::from_parse_failure(&failure));
            }
        };

        let outcome = self.sandbox.run(instrumented.code);
        let output = outcome.output.flush();
        match outcome.failure {
            None => ExecutionResult::completed(output),
            Some(failure) => {
                let mut error = normalize::from_raw_failure(&failure);
                // Locations come from the instrumented script; report them
                // against what the user wrote.
                if let (Some(line), Some(column)) = (error.line, error.column) {
                    error.column = Some(instrumented.columns.source_column(line, column));
                }
                ExecutionResult::failed(output, error)
            }
        }
    }
}
