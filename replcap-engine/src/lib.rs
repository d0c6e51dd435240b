//! replcap engine - REPL-style capture for JavaScript snippets
//!
//! Takes a script, rewrites its bare top-level expressions so their values are
//! captured, runs it in a fresh V8 isolate under a wall-clock budget and
//! returns everything it printed plus at most one normalized error.
//!
//! ```no_run
//! use replcap_engine::Engine;
//!
//! let result = Engine::default().run("let x = 5; x + 1;");
//! assert_eq!(result.output, "=> 6\n");
//! ```

mod config;
mod engine;
mod error;
mod instrument;
mod limits;
mod normalize;
mod runtime;
mod sandbox;
mod service;
mod shim;

pub use config::{EngineConfig, HostConfig, BUDGET_ENV, ENGINE_PROGRAM_ENV, MAX_HEAP_ENV};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use instrument::{
    instrument, instrument_mapped, line_column, ColumnMap, Instrumented, ParseFailure, CAPTURE_HOOK,
};
pub use limits::{ExecutionLimits, DEFAULT_BUDGET};
pub use normalize::{from_js_error, from_parse_failure, from_raw_failure};
pub use runtime::{interpret_output, InProcessRuntime, ProcessRuntime, Runtime};
pub use sandbox::{RawFailure, Sandbox, SandboxOutcome, SCRIPT_NAME};
pub use service::ReplService;
pub use shim::OutputBuffer;

pub use replcap_common::{
    CodeChange, CodeOutput, ErrorKind, ErrorRecord, ExecutionId, ExecutionResult, HostMessage,
};
