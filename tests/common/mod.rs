//! Common test utilities shared across integration and E2E tests

use replcap_engine::{Engine, ExecutionLimits, ExecutionResult, InProcessRuntime};
use std::time::Duration;

/// Common test configuration
pub struct TestConfig {
    pub budget: Duration,
    pub log_level: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(2000),
            log_level: "debug".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_budget_ms(mut self, ms: u64) -> Self {
        self.budget = Duration::from_millis(ms);
        self
    }

    pub fn engine(&self) -> Engine {
        Engine::new(ExecutionLimits::default().with_budget(self.budget))
    }

    pub fn runtime(&self) -> InProcessRuntime {
        InProcessRuntime::new(self.engine())
    }
}

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(TestConfig::default().log_level)
        .with_test_writer()
        .try_init();
}

/// Run a script with the default test budget
pub fn run(source: &str) -> ExecutionResult {
    TestConfig::default().engine().run(source)
}
