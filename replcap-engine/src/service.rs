//! Repl service - turns host `code_change` events into `code_output` events

use crate::runtime::Runtime;
use replcap_common::{CodeChange, CodeOutput, ErrorKind, ErrorRecord, ExecutionResult, HostMessage};
use std::sync::Arc;

/// Runs each code change through a runtime and tags the result with its tab
#[derive(Clone)]
pub struct ReplService {
    runtime: Arc<dyn Runtime>,
}

impl ReplService {
    /// Create a new service with the given runtime
    pub fn new(runtime: impl Runtime + 'static) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Run one change. Always produces an output event, even when the
    /// runtime itself failed.
    pub async fn handle(&self, change: CodeChange) -> CodeOutput {
        let CodeChange { code, tab_id } = change;
        tracing::info!(
            tab_id = %tab_id,
            runtime = self.runtime.name(),
            code_len = code.len(),
            "Executing code"
        );

        let result = match self.runtime.execute(code).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(tab_id = %tab_id, error = %e, "runtime failed");
                ExecutionResult::failed(
                    format!("Backend error: {}", e),
                    ErrorRecord::new(ErrorKind::BackendError, e.to_string()),
                )
            }
        };

        CodeOutput::new(tab_id, result)
    }

    /// Dispatch a host message. Only `code_change` expects a reply.
    pub async fn handle_message(&self, message: HostMessage) -> Option<HostMessage> {
        match message {
            HostMessage::CodeChange(change) => {
                Some(HostMessage::CodeOutput(self.handle(change).await))
            }
            HostMessage::CodeOutput(output) => {
                tracing::debug!(tab_id = %output.tab_id, "ignoring code_output sent to engine");
                None
            }
        }
    }
}
