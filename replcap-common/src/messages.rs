//! Messages exchanged with the host messaging layer
//!
//! The host relays editor changes to the engine as `code_change` events and
//! relays each result back as a `code_output` event tagged with the tab that
//! produced it.

use crate::types::{ErrorRecord, ExecutionResult};
use serde::{Deserialize, Serialize};

/// An editor tab changed and its contents should be run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub code: String,
    pub tab_id: String,
}

/// The result of running one `CodeChange`, tagged with the originating tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOutput {
    pub output: String,
    pub error: Option<ErrorRecord>,
    pub tab_id: String,
}

impl CodeOutput {
    pub fn new(tab_id: impl Into<String>, result: ExecutionResult) -> Self {
        Self {
            output: result.output,
            error: result.error,
            tab_id: tab_id.into(),
        }
    }

    /// Drop the tab tag and recover the plain result document
    pub fn into_result(self) -> ExecutionResult {
        ExecutionResult {
            output: self.output,
            error: self.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HostMessage {
    // Host -> engine
    CodeChange(CodeChange),

    // Engine -> host
    CodeOutput(CodeOutput),
}
