//! Execution limits for one sandboxed run

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock budget for one script
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(5000);

/// Resource limits applied to every execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Wall-clock time after which the script is terminated
    #[serde(with = "humantime_serde", default = "default_budget")]
    pub budget: Duration,

    /// V8 heap ceiling in bytes. `None` leaves V8's own limit in place.
    #[serde(default)]
    pub max_heap_bytes: Option<usize>,
}

fn default_budget() -> Duration {
    DEFAULT_BUDGET
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            max_heap_bytes: None,
        }
    }
}

impl ExecutionLimits {
    /// Tight limits for snippets typed into a shared editor
    pub fn strict() -> Self {
        Self {
            budget: Duration::from_secs(1),
            max_heap_bytes: Some(16 * 1024 * 1024),
        }
    }

    /// Generous limits for longer-running experiments
    pub fn permissive() -> Self {
        Self {
            budget: Duration::from_secs(30),
            max_heap_bytes: Some(256 * 1024 * 1024),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_max_heap_bytes(mut self, max_heap_bytes: Option<usize>) -> Self {
        self.max_heap_bytes = max_heap_bytes;
        self
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget.as_millis() as u64
    }
}
