//! In-process runtime

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use replcap_common::ExecutionResult;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Runs the engine on a dedicated OS thread per invocation.
///
/// V8 isolates are `!Send` and a run blocks until the script finishes, so
/// each invocation gets its own thread and its own isolate. The async caller
/// only waits on a oneshot channel.
#[derive(Clone, Default)]
pub struct InProcessRuntime {
    engine: Arc<Engine>,
}

impl InProcessRuntime {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

#[async_trait]
impl super::Runtime for InProcessRuntime {
    async fn execute(&self, code: String) -> EngineResult<ExecutionResult> {
        let engine = self.engine.clone();
        let (result_tx, result_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("replcap-run".to_string())
            .spawn(move || {
                let result = engine.run(&code);
                if result_tx.send(result).is_err() {
                    tracing::warn!("result receiver dropped before run finished");
                }
            })?;

        result_rx
            .await
            .map_err(|_| EngineError::Join("execution thread exited without a result".to_string()))
    }

    fn name(&self) -> &str {
        "in-process"
    }
}
