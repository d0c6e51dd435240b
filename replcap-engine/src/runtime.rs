//! Runtime trait and implementations
//!
//! Hosts that serve many editor sessions talk to the engine through
//! [`Runtime`]. Each call is one independent invocation: either a child
//! process ([`ProcessRuntime`]) or a dedicated thread with its own isolate
//! ([`InProcessRuntime`]).

mod in_process;
mod process;

use crate::error::EngineResult;
use async_trait::async_trait;
use replcap_common::ExecutionResult;

pub use in_process::InProcessRuntime;
pub use process::{interpret_output, ProcessRuntime};

/// Runtime abstraction for executing code
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run one script and return its result document.
    ///
    /// Script failures are `Ok` with the error inside the result; `Err` means
    /// the runtime itself could not produce a result.
    async fn execute(&self, code: String) -> EngineResult<ExecutionResult>;

    /// Get runtime name
    fn name(&self) -> &str;
}
