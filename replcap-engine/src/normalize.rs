//! Error normalization
//!
//! Every way a run can fail ends up as one [`ErrorRecord`]. Locations are
//! 1-based for both line and column, whichever stage produced them.
//!
//! For thrown faults the location comes from the structured stack frames V8
//! attaches to the exception. Only when no frame points into the user script
//! is the textual stack scanned for `<repl>:<line>:<column>`.

use crate::instrument::ParseFailure;
use crate::sandbox::{RawFailure, SCRIPT_NAME};
use deno_core::error::{JsError, JsStackFrame};
use regex::Regex;
use replcap_common::{ErrorKind, ErrorRecord};
use std::sync::OnceLock;

const FALLBACK_NAME: &str = "Error";

/// Error for source the instrumenter could not parse
pub fn from_parse_failure(failure: &ParseFailure) -> ErrorRecord {
    ErrorRecord::new(ErrorKind::SyntaxError, failure.message.clone())
        .with_stack(format!(
            "SyntaxError: {} ({}:{})",
            failure.message, failure.line, failure.column
        ))
        .with_location(failure.line, failure.column)
}

/// Error for a run that did not complete
pub fn from_raw_failure(failure: &RawFailure) -> ErrorRecord {
    match failure {
        RawFailure::Thrown(error) => from_js_error(error),
        RawFailure::Timeout { budget } => ErrorRecord::new(
            ErrorKind::TimeoutError,
            format!(
                "Script execution timed out after {}ms",
                budget.as_millis()
            ),
        ),
        RawFailure::HeapLimit { max_heap_bytes } => ErrorRecord::new(
            ErrorKind::RuntimeError,
            format!("Script exceeded the heap limit of {} bytes", max_heap_bytes),
        ),
        RawFailure::Engine(message) => ErrorRecord::new(ErrorKind::RuntimeError, message.clone()),
    }
}

/// Error for an exception thrown out of the script
pub fn from_js_error(error: &JsError) -> ErrorRecord {
    let name = error
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_NAME);
    let message = error
        .message
        .clone()
        .unwrap_or_else(|| uncaught_text(&error.exception_message));
    let stack = error
        .stack
        .clone()
        .filter(|stack| !stack.is_empty())
        .unwrap_or_else(|| format!("{}: {}", name, message));

    let kind = if is_compile_error(name, &stack) {
        ErrorKind::SyntaxError
    } else {
        ErrorKind::RuntimeError
    };

    let (line, column) = match location_from_frames(&error.frames) {
        Some((line, column)) => (Some(line), column),
        None => match location_from_stack(&stack) {
            Some((line, column)) => (Some(line), Some(column)),
            None => (None, None),
        },
    };

    ErrorRecord {
        kind,
        message,
        stack,
        line,
        column,
    }
}

/// A SyntaxError raised while V8 compiled the script has no call frames.
/// One thrown at run time (`JSON.parse`, `new Function`) always has some.
fn is_compile_error(name: &str, stack: &str) -> bool {
    name == "SyntaxError" && !stack.contains("\n    at ")
}

/// `Uncaught boom` -> `boom`
fn uncaught_text(exception_message: &str) -> String {
    exception_message
        .strip_prefix("Uncaught ")
        .unwrap_or(exception_message)
        .to_string()
}

/// First frame that points into the user script
pub fn location_from_frames(frames: &[JsStackFrame]) -> Option<(u32, Option<u32>)> {
    frames
        .iter()
        .filter(|frame| frame.file_name.as_deref() == Some(SCRIPT_NAME))
        .find_map(|frame| {
            let line = frame.line_number.and_then(|n| u32::try_from(n).ok())?;
            let column = frame.column_number.and_then(|n| u32::try_from(n).ok());
            Some((line, column))
        })
}

/// Last resort: pattern-match `<repl>:<line>:<column>` in the stack text
pub fn location_from_stack(stack: &str) -> Option<(u32, u32)> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(&format!(r"{}:(\d+):(\d+)", regex::escape(SCRIPT_NAME))).ok())
        .as_ref()?;

    let captures = pattern.captures(stack)?;
    let line = captures.get(1)?.as_str().parse().ok()?;
    let column = captures.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}
