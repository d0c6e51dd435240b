//! Configuration management
//!
//! Looked up in `~/.config/replcap/config.toml`. A missing file means
//! defaults. Environment variables win over the file:
//!
//! - `REPLCAP_BUDGET_MS`: execution budget in milliseconds
//! - `REPLCAP_MAX_HEAP_BYTES`: heap ceiling in bytes, `0` removes it
//! - `REPLCAP_ENGINE`: engine binary used by out-of-process hosts
//!
//! ```toml
//! [limits]
//! budget = "5s"
//! max_heap_bytes = 67108864
//!
//! [host]
//! engine_program = "/usr/local/bin/replcap"
//! ```

use crate::error::{EngineError, EngineResult};
use crate::limits::ExecutionLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BUDGET_ENV: &str = "REPLCAP_BUDGET_MS";
pub const MAX_HEAP_ENV: &str = "REPLCAP_MAX_HEAP_BYTES";
pub const ENGINE_PROGRAM_ENV: &str = "REPLCAP_ENGINE";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub limits: ExecutionLimits,

    #[serde(default)]
    pub host: HostConfig,
}

/// Settings for hosts that run the engine out of process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Engine binary to spawn, resolved through `PATH` when relative
    #[serde(default = "HostConfig::default_engine_program")]
    pub engine_program: PathBuf,

    /// Extra time granted to the engine process on top of the script budget
    #[serde(with = "humantime_serde", default = "HostConfig::default_grace")]
    pub grace: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            engine_program: Self::default_engine_program(),
            grace: Self::default_grace(),
        }
    }
}

impl HostConfig {
    fn default_engine_program() -> PathBuf {
        PathBuf::from("replcap")
    }

    fn default_grace() -> Duration {
        Duration::from_secs(2)
    }
}

impl EngineConfig {
    /// Load configuration from the default location, then apply the environment
    pub fn load() -> EngineResult<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from an explicit file, without environment overrides
    pub fn load_from(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: EngineConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("replcap").join("config.toml"))
    }

    /// Apply overrides from any key/value source (the process environment in practice)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> EngineResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(BUDGET_ENV) {
            let ms = parse_number(BUDGET_ENV, &value)?;
            self.limits.budget = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(MAX_HEAP_ENV) {
            let bytes = parse_number(MAX_HEAP_ENV, &value)? as usize;
            self.limits.max_heap_bytes = (bytes > 0).then_some(bytes);
        }
        if let Some(value) = lookup(ENGINE_PROGRAM_ENV) {
            let value = value.trim();
            if !value.is_empty() {
                self.host.engine_program = PathBuf::from(value);
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.limits.budget.is_zero() {
            return Err(EngineError::Config(
                "Execution budget must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> EngineResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| EngineError::Config(format!("Invalid {}={:?}: {}", key, value, e)))
}
