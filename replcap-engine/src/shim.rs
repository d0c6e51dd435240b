//! Console shim and capture hook
//!
//! Both are plain JavaScript closures installed by [`BOOTSTRAP_JS`]. They
//! format values inside the isolate and push finished lines into an
//! [`OutputBuffer`] living in the runtime's `OpState`, so whatever was printed
//! before a throw or a forced termination is still there afterwards.

use deno_core::{op2, Extension, OpState};

/// Ordered, append-only lines printed during one execution
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    lines: Vec<String>,
    fallbacks: usize,
}

impl OutputBuffer {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of values that could not be serialized and were printed with `String()`
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Concatenate every line, each terminated by `\n`
    pub fn flush(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[op2(fast)]
fn op_repl_write(state: &mut OpState, #[string] line: &str) {
    state.borrow_mut::<OutputBuffer>().push(line);
}

#[op2(fast)]
fn op_repl_fallback(state: &mut OpState) {
    state.borrow_mut::<OutputBuffer>().fallbacks += 1;
}

/// Extension carrying the two output ops
pub fn create_repl_extension() -> Extension {
    let ops = vec![op_repl_write(), op_repl_fallback()];

    Extension {
        name: "replcap_output",
        ops: std::borrow::Cow::Owned(ops),
        ..Default::default()
    }
}

/// Installs `console.log`, `console.error` and `__captureResult`, then removes
/// every host binding so the script only sees the language built-ins plus
/// those three entry points.
pub const BOOTSTRAP_JS: &str = r#"
((ops) => {
    const write = (line) => ops.op_repl_write(line);
    const fallback = () => ops.op_repl_fallback();

    const plain = (value) => {
        try {
            return String(value);
        } catch (_) {
            return Object.prototype.toString.call(value);
        }
    };

    const degrade = (value) => {
        fallback();
        return plain(value);
    };

    const printable = (arg) => {
        if (typeof arg === 'object') {
            let json;
            try {
                json = JSON.stringify(arg, null, 2);
            } catch (_) {
                return degrade(arg);
            }
            // `toJSON` may return undefined
            return json === undefined ? String(json) : json;
        }
        return plain(arg);
    };

    const console = Object.freeze({
        log: (...args) => {
            for (const arg of args) {
                write(printable(arg));
            }
        },
        error: (...args) => {
            for (const arg of args) {
                write('Error: ' + printable(arg));
            }
        },
    });

    const captureResult = (value) => {
        if (value === undefined) {
            return;
        }
        let display;
        if (typeof value === 'function') {
            display = value.name ? `[Function: ${value.name}]` : '[Function]';
        } else {
            try {
                display = JSON.stringify(value);
            } catch (_) {
                display = degrade(value);
            }
        }
        write(`=> ${display}`);
    };

    Object.defineProperty(globalThis, 'console', {
        value: console, writable: true, configurable: true, enumerable: false,
    });
    Object.defineProperty(globalThis, '__captureResult', {
        value: captureResult, writable: true, configurable: true, enumerable: false,
    });

    for (const name of [
        'Deno', 'setTimeout', 'setInterval', 'clearTimeout', 'clearInterval',
        'queueMicrotask', 'reportError', 'structuredClone', '__bootstrap',
    ]) {
        delete globalThis[name];
    }
})(Deno.core.ops);
"#;
