//! Result document types
//!
//! Every invocation of the engine produces exactly one [`ExecutionResult`].
//! Its JSON form is the wire document handed back to the host:
//!
//! ```json
//! { "output": "=> 2\n", "error": null }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique invocation identifier, used to correlate log lines of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure category reported in the `type` field of the error document.
///
/// The engine only ever produces `SyntaxError`, `RuntimeError` and
/// `TimeoutError`. The remaining kinds are reserved for hosts that run the
/// engine out of process and need to report that the engine itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SyntaxError,
    RuntimeError,
    TimeoutError,
    /// The engine produced something that was not a result document
    ExecutionError,
    /// The engine could not be started at all
    SystemError,
    /// Any other host-side failure
    BackendError,
    #[serde(other)]
    Unknown,
}

impl ErrorKind {
    /// Whether this kind describes a failure of the script rather than of the engine
    pub fn is_script_error(self) -> bool {
        matches!(
            self,
            ErrorKind::SyntaxError | ErrorKind::RuntimeError | ErrorKind::TimeoutError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::ExecutionError => "ExecutionError",
            ErrorKind::SystemError => "SystemError",
            ErrorKind::BackendError => "BackendError",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform description of a parse failure, thrown fault or timeout.
///
/// `line` and `column` are both 1-based. They are best-effort and serialize
/// as `null` when no location could be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    pub message: String,

    #[serde(default)]
    pub stack: String,

    #[serde(default)]
    pub line: Option<u32>,

    #[serde(default)]
    pub column: Option<u32>,
}

impl ErrorRecord {
    /// Create a record without stack or location
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: String::new(),
            line: None,
            column: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " ({}:{})", line, column)?;
        }
        Ok(())
    }
}

/// Everything one invocation produced: captured output plus an optional error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub output: String,

    #[serde(default)]
    pub error: Option<ErrorRecord>,
}

impl ExecutionResult {
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(output: impl Into<String>, error: ErrorRecord) -> Self {
        Self {
            output: output.into(),
            error: Some(error),
        }
    }

    /// Check if the script parsed and ran to completion
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Serialize to the single-line wire document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
