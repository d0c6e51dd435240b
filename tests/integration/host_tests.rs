//! Integration tests for the host-side runtimes and the repl service

use replcap_engine::{
    CodeChange, ErrorKind, HostMessage, ProcessRuntime, ReplService, Runtime,
};
use replcap_tests::{setup_test_logging, TestConfig};
use std::time::Duration;

fn change(code: &str, tab_id: &str) -> CodeChange {
    CodeChange {
        code: code.to_string(),
        tab_id: tab_id.to_string(),
    }
}

#[tokio::test]
async fn in_process_runtime_runs_script() {
    setup_test_logging();
    let runtime = TestConfig::default().runtime();
    assert_eq!(runtime.name(), "in-process");

    let result = runtime.execute("let x = 5; x+1;".to_string()).await.unwrap();
    assert_eq!(result.output, "=> 6\n");
}

#[tokio::test]
async fn tabs_do_not_see_each_other() {
    let service = ReplService::new(TestConfig::default().runtime());
    let (one, two) = tokio::join!(
        service.handle(change("var owner = 'one'; owner;", "tab-1")),
        service.handle(change("typeof owner;", "tab-2")),
    );
    assert_eq!(one.tab_id, "tab-1");
    assert_eq!(one.output, "=> \"one\"\n");
    assert_eq!(two.tab_id, "tab-2");
    assert_eq!(two.output, "=> \"undefined\"\n");
}

#[tokio::test]
async fn script_errors_are_in_band() {
    let service = ReplService::new(TestConfig::default().runtime());
    let output = service.handle(change("nope();", "tab-9")).await;
    let error = output.error.unwrap();
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert_eq!(error.line, Some(1));
}

#[tokio::test]
async fn missing_engine_binary_reported_as_system_error() {
    let service = ReplService::new(ProcessRuntime::new(
        "/definitely/not/replcap",
        Duration::from_secs(1),
    ));
    let output = service.handle(change("1;", "tab-1")).await;
    assert_eq!(output.error.unwrap().kind, ErrorKind::SystemError);
}

#[tokio::test]
async fn wire_round_trip_through_service() {
    let service = ReplService::new(TestConfig::default().runtime());
    let inbound = r#"{"event":"code_change","data":{"code":"[1,2].length;","tab_id":"a"}}"#;
    let message: HostMessage = serde_json::from_str(inbound).unwrap();

    let reply = service.handle_message(message).await.unwrap();
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["event"], "code_output");
    assert_eq!(value["data"]["output"], "=> 2\n");
    assert!(value["data"]["error"].is_null());
}
