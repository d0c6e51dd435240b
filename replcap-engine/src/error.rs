use thiserror::Error;

/// Engine-level failures.
///
/// Script failures never show up here: they are reported in-band inside the
/// `ExecutionResult`. These are failures of the machinery around the script.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start engine process `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Execution thread failed: {0}")]
    Join(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(format!("Failed to parse config: {}", e))
    }
}
