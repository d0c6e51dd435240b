//! Sandbox executor on a fresh V8 isolate
//!
//! Each call to [`Sandbox::run`] builds a brand new `JsRuntime`, installs the
//! console shim and capture hook, runs the instrumented script and throws the
//! runtime away. Nothing survives between runs.
//!
//! The budget is enforced by a watchdog thread holding the isolate's
//! thread-safe handle. When the budget elapses it calls
//! `terminate_execution`, which also stops CPU-bound loops that never yield.

use crate::limits::ExecutionLimits;
use crate::shim::{create_repl_extension, OutputBuffer, BOOTSTRAP_JS};
use deno_core::error::{CoreError, JsError};
use deno_core::{v8, JsRuntime, RuntimeOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Resource name the instrumented script runs under. Stack frames that point
/// into user code carry this name.
pub const SCRIPT_NAME: &str = "<repl>";

const BOOTSTRAP_NAME: &str = "[replcap:bootstrap]";

/// Why a run did not complete
#[derive(Debug)]
pub enum RawFailure {
    /// The script threw (or failed to compile inside V8)
    Thrown(Box<JsError>),
    /// The wall-clock budget elapsed and the isolate was terminated
    Timeout { budget: Duration },
    /// V8 approached the configured heap ceiling and the isolate was terminated
    HeapLimit { max_heap_bytes: usize },
    /// The engine itself failed before user code could run
    Engine(String),
}

/// Everything a run produced
#[derive(Debug)]
pub struct SandboxOutcome {
    /// Lines printed before completion or failure
    pub output: OutputBuffer,
    pub failure: Option<RawFailure>,
    pub elapsed: Duration,
}

impl SandboxOutcome {
    pub fn completed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs instrumented scripts under fixed limits
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    limits: ExecutionLimits,
}

impl Sandbox {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Run `source` to completion, failure or budget expiry.
    ///
    /// Blocks the calling thread. Must not be called from inside an async
    /// task that other work depends on.
    pub fn run(&self, source: String) -> SandboxOutcome {
        let start = Instant::now();
        let mut runtime = create_runtime(&self.limits);

        // Registered before the bootstrap so a cap reached at any point ends
        // in termination, never in a fatal V8 out-of-memory.
        let heap_state = self.limits.max_heap_bytes.map(|_| {
            let state = Box::new(HeapLimitState {
                handle: runtime.v8_isolate().thread_safe_handle(),
                triggered: AtomicBool::new(false),
            });
            runtime.v8_isolate().add_near_heap_limit_callback(
                near_heap_limit_callback,
                &*state as *const HeapLimitState as *mut std::ffi::c_void,
            );
            state
        });

        if let Err(e) = runtime.execute_script(BOOTSTRAP_NAME, BOOTSTRAP_JS) {
            tracing::error!(error = %e, "sandbox bootstrap failed");
            let output = take_output(&mut runtime);
            drop(runtime);
            drop(heap_state);
            return SandboxOutcome {
                output,
                failure: Some(RawFailure::Engine(format!("Sandbox bootstrap failed: {}", e))),
                elapsed: start.elapsed(),
            };
        }

        let watchdog = Watchdog::arm(
            runtime.v8_isolate().thread_safe_handle(),
            self.limits.budget,
        );
        let result = runtime.execute_script(SCRIPT_NAME, source);
        let timed_out = watchdog.disarm();
        let heap_exceeded = heap_state
            .as_ref()
            .is_some_and(|state| state.triggered.load(Ordering::SeqCst));

        // A watchdog firing after the script already returned is not a timeout.
        let failure = match result {
            Ok(value) => {
                drop(value);
                None
            }
            Err(_) if timed_out => Some(RawFailure::Timeout {
                budget: self.limits.budget,
            }),
            Err(_) if heap_exceeded => Some(RawFailure::HeapLimit {
                max_heap_bytes: self.limits.max_heap_bytes.unwrap_or_default(),
            }),
            Err(CoreError::Js(js_error)) => Some(RawFailure::Thrown(Box::new(js_error))),
            Err(other) => Some(RawFailure::Engine(other.to_string())),
        };

        let output = take_output(&mut runtime);

        // The heap callback points into `heap_state`; the isolate goes first.
        drop(runtime);
        drop(heap_state);

        let elapsed = start.elapsed();
        tracing::debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            lines = output.lines().len(),
            fallbacks = output.fallbacks(),
            timed_out,
            heap_exceeded,
            "sandbox run finished"
        );

        SandboxOutcome {
            output,
            failure,
            elapsed,
        }
    }
}

fn create_runtime(limits: &ExecutionLimits) -> JsRuntime {
    let create_params = limits
        .max_heap_bytes
        .map(|max_bytes| v8::CreateParams::default().heap_limits(0, max_bytes));

    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![create_repl_extension()],
        create_params,
        ..Default::default()
    });
    runtime.op_state().borrow_mut().put(OutputBuffer::default());
    runtime
}

fn take_output(runtime: &mut JsRuntime) -> OutputBuffer {
    runtime
        .op_state()
        .borrow_mut()
        .try_take::<OutputBuffer>()
        .unwrap_or_default()
}

/// Terminates the isolate once the budget elapses unless disarmed first
struct Watchdog {
    cancel: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    fn arm(handle: v8::IsolateHandle, budget: Duration) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let thread = std::thread::spawn(move || {
            if let Err(mpsc::RecvTimeoutError::Timeout) = cancelled.recv_timeout(budget) {
                flag.store(true, Ordering::SeqCst);
                handle.terminate_execution();
            }
        });

        Self {
            cancel,
            thread,
            fired,
        }
    }

    /// Stop the watchdog and report whether it terminated the isolate.
    /// Joins the thread so the isolate handle is never used after the runtime drops.
    fn disarm(self) -> bool {
        let _ = self.cancel.send(());
        if self.thread.join().is_err() {
            tracing::warn!("watchdog thread panicked");
        }
        self.fired.load(Ordering::SeqCst)
    }
}

struct HeapLimitState {
    handle: v8::IsolateHandle,
    triggered: AtomicBool,
}

/// V8 near-heap-limit callback. Terminates execution and grants 1MB grace
/// for the termination to propagate.
extern "C" fn near_heap_limit_callback(
    data: *mut std::ffi::c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    // SAFETY: `data` points to the boxed `HeapLimitState` registered in
    // `Sandbox::run`, which is dropped only after the runtime owning the
    // isolate has been dropped. Only atomics are touched through it.
    let state = unsafe { &*(data as *const HeapLimitState) };
    if !state.triggered.swap(true, Ordering::SeqCst) {
        state.handle.terminate_execution();
    }
    current_heap_limit + 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sandbox(budget_ms: u64) -> Sandbox {
        Sandbox::new(ExecutionLimits::default().with_budget(Duration::from_millis(budget_ms)))
    }

    #[test]
    fn test_console_and_hook_are_installed() {
        let outcome = sandbox(2000).run(
            "console.log('hi', {a: 1}); console.error('bad'); __captureResult(1 + 1);".to_string(),
        );
        assert!(outcome.completed());
        assert_eq!(
            outcome.output.flush(),
            "hi\n{\n  \"a\": 1\n}\nError: bad\n=> 2\n"
        );
    }

    #[test]
    fn test_host_bindings_removed() {
        let outcome = sandbox(2000).run(
            "console.log(typeof Deno, typeof setTimeout, typeof queueMicrotask, typeof JSON);"
                .to_string(),
        );
        assert!(outcome.completed());
        assert_eq!(
            outcome.output.flush(),
            "undefined\nundefined\nundefined\nobject\n"
        );
    }

    #[test]
    fn test_partial_output_survives_throw() {
        let outcome = sandbox(2000).run("console.log('before'); null.x; console.log('after');".to_string());
        assert_eq!(outcome.output.flush(), "before\n");
        assert_matches!(outcome.failure, Some(RawFailure::Thrown(_)));
    }

    #[test]
    fn test_unknown_console_method_throws() {
        let outcome = sandbox(2000).run("console.warn('x');".to_string());
        assert_matches!(outcome.failure, Some(RawFailure::Thrown(ref e)) if e.name.as_deref() == Some("TypeError"));
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let outcome = sandbox(200).run("console.log('start'); while (true) {}".to_string());
        assert_matches!(outcome.failure, Some(RawFailure::Timeout { budget }) if budget == Duration::from_millis(200));
        assert_eq!(outcome.output.flush(), "start\n");
        assert!(outcome.elapsed >= Duration::from_millis(200));
        assert!(outcome.elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_heap_cap_terminates_allocation_loop() {
        let sandbox = Sandbox::new(
            ExecutionLimits::default()
                .with_budget(Duration::from_secs(20))
                .with_max_heap_bytes(Some(16 << 20)),
        );
        let outcome = sandbox.run(
            "console.log('allocating'); const keep = []; while (true) { keep.push(new Array(50000).fill(0)); }"
                .to_string(),
        );
        assert_matches!(
            outcome.failure,
            Some(RawFailure::HeapLimit { max_heap_bytes }) if max_heap_bytes == 16 << 20
        );
        assert_eq!(outcome.output.flush(), "allocating\n");
        assert!(outcome.elapsed < Duration::from_secs(10));
    }

    #[test]
    fn test_heap_cap_leaves_small_scripts_alone() {
        let sandbox = Sandbox::new(ExecutionLimits::default().with_max_heap_bytes(Some(16 << 20)));
        let outcome = sandbox.run("__captureResult([1, 2, 3].length);".to_string());
        assert!(outcome.completed());
        assert_eq!(outcome.output.flush(), "=> 3\n");
    }

    #[test]
    fn test_large_structure_completes_without_cap() {
        let outcome = sandbox(20000).run(
            "const a = []; for (let i = 0; i < 3e6; i++) a.push({ i }); __captureResult(a.length);"
                .to_string(),
        );
        assert!(outcome.completed(), "{:?}", outcome.failure);
        assert_eq!(outcome.output.flush(), "=> 3000000\n");
    }

    #[test]
    fn test_console_prints_undefined_serialization() {
        let outcome = sandbox(2000).run(
            "console.log({ toJSON() {} }); console.error({ toJSON: () => undefined });".to_string(),
        );
        assert!(outcome.completed());
        assert_eq!(outcome.output.flush(), "undefined\nError: undefined\n");
        assert_eq!(outcome.output.fallbacks(), 0);
    }

    #[test]
    fn test_serialization_fallback_counted() {
        let outcome = sandbox(2000).run(
            "const a = {}; a.self = a; console.log(a); __captureResult(10n);".to_string(),
        );
        assert!(outcome.completed());
        assert_eq!(outcome.output.flush(), "[object Object]\n=> 10\n");
        assert_eq!(outcome.output.fallbacks(), 2);
    }

    #[test]
    fn test_globals_do_not_leak_between_runs() {
        let sandbox = sandbox(2000);
        let first = sandbox.run("var leaked = 1; __captureResult(typeof leaked);".to_string());
        let second = sandbox.run("__captureResult(typeof leaked);".to_string());
        assert_eq!(first.output.flush(), "=> \"number\"\n");
        assert_eq!(second.output.flush(), "=> \"undefined\"\n");
    }
}
