//! Integration tests for the engine's observable behavior
//!
//! These tests drive `Engine::run` end to end and check:
//! - which values are captured and how they are formatted
//! - that failures are reported in-band with a location
//! - that runs never share state and always terminate

use assert_matches::assert_matches;
use replcap_engine::{ErrorKind, ExecutionResult};
use replcap_tests::{run, setup_test_logging, TestConfig};
use std::time::{Duration, Instant};

#[test]
fn completed_scripts_have_no_error() {
    setup_test_logging();
    for source in [
        "",
        "// only a comment",
        "let a = 1;",
        "function f() { return 1 }",
        "if (true) { 42; }",
        "class A {}; new A();",
    ] {
        let result = run(source);
        assert!(result.success(), "{:?} failed: {:?}", source, result.error);
    }
}

#[test]
fn reference_scenarios() {
    assert_eq!(run("1+1;"), ExecutionResult::completed("=> 2\n"));
    assert_eq!(run("console.log('hi');"), ExecutionResult::completed("hi\n"));
    assert_eq!(run("let x = 5; x+1;"), ExecutionResult::completed("=> 6\n"));
}

#[test]
fn value_formatting() {
    let result = run(concat!(
        "'text';\n",
        "null;\n",
        "({ a: [1, { b: true }] });\n",
        "NaN;\n",
        "Symbol('s');\n",
        "function named() {}\n",
        "named;\n",
        "(function () {});\n",
        "Math.max;\n",
        "new Date(0);\n",
        "void 0;\n",
    ));
    assert!(result.success(), "{:?}", result.error);
    assert_eq!(
        result.output,
        concat!(
            "=> \"text\"\n",
            "=> null\n",
            "=> {\"a\":[1,{\"b\":true}]}\n",
            "=> null\n",
            "=> undefined\n",
            "=> [Function: named]\n",
            "=> [Function]\n",
            "=> [Function: max]\n",
            "=> \"1970-01-01T00:00:00.000Z\"\n",
        )
    );
}

#[test]
fn console_formatting() {
    let result = run(concat!(
        "console.log(1, 'two', [3], null, undefined);\n",
        "console.error('bad', { code: 1 });\n",
    ));
    assert_eq!(
        result.output,
        concat!(
            "1\n",
            "two\n",
            "[\n  3\n]\n",
            "null\n",
            "undefined\n",
            "Error: bad\n",
            "Error: {\n  \"code\": 1\n}\n",
        )
    );
}

#[test]
fn serialization_fallback_does_not_fail() {
    let result = run("const o = {}; o.o = o; o; console.log(o); 2n ** 64n;");
    assert!(result.success(), "{:?}", result.error);
    assert_eq!(
        result.output,
        "=> [object Object]\n=> [object Object]\n[object Object]\n=> 18446744073709551616\n"
    );
}

#[test]
fn syntax_error_has_location() {
    let result = run("let ok = 1;\n\nlet x = (");
    assert!(result.output.is_empty());
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::SyntaxError);
    assert_eq!(error.line, Some(3));
    assert!(error.column.is_some());
    assert!(!error.message.is_empty());
}

#[test]
fn syntax_error_runs_nothing() {
    let result = run("console.log('never');\nlet = ;");
    assert_eq!(result.error.unwrap().kind, ErrorKind::SyntaxError);
    assert!(result.output.is_empty());
}

#[test]
fn runtime_error_keeps_partial_output() {
    let result = run("1;\nconsole.log('two');\nmissing();\nconsole.log('four');");
    assert_eq!(result.output, "=> 1\ntwo\n");
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert_eq!(error.line, Some(3));
    assert!(error.message.contains("missing"));
    assert!(error.stack.contains("ReferenceError"));
}

#[test]
fn error_inside_function_points_at_throw() {
    let result = run("function boom() {\n  throw new Error('kaboom');\n}\nboom();\n");
    let error = result.error.unwrap();
    assert_eq!(error.message, "kaboom");
    assert_eq!(error.line, Some(2));
    assert_eq!(error.column, Some(9));
}

#[test]
fn unimplemented_console_method_is_runtime_error() {
    let result = run("console.info('x');");
    assert_matches!(result.error, Some(ref e) if e.kind == ErrorKind::RuntimeError);
}

#[test]
fn no_host_access() {
    let result = run(
        "[typeof Deno, typeof process, typeof require, typeof fetch, typeof setTimeout].join(',');",
    );
    assert_eq!(
        result.output,
        "=> \"undefined,undefined,undefined,undefined,undefined\"\n"
    );
}

#[test]
fn infinite_loop_times_out() {
    let engine = TestConfig::default().with_budget_ms(300).engine();
    let started = Instant::now();
    let result = engine.run("console.log('spinning');\nwhile(true){}");
    let elapsed = started.elapsed();

    assert_eq!(result.output, "spinning\n");
    let error = result.error.unwrap();
    assert_eq!(error.kind, ErrorKind::TimeoutError);
    assert!(error.message.contains("300ms"));
    assert!(error.line.is_none() && error.column.is_none());
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(10));
}

#[test]
fn independent_runs_are_identical() {
    let source = "globalThis.counter = (globalThis.counter || 0) + 1; counter;";
    let first = run(source);
    let second = run(source);
    assert_eq!(first, second);
    // The assignment is a bare expression too
    assert_eq!(first.output, "=> 1\n=> 1\n");
}

#[test]
fn result_document_shape() {
    let value = serde_json::to_value(run("throw new TypeError('nope');")).unwrap();
    let error = value["error"].as_object().unwrap();
    let mut keys: Vec<_> = error.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["column", "line", "message", "stack", "type"]);
    assert_eq!(value["error"]["type"], "RuntimeError");
    assert_eq!(value["output"], "");
}
