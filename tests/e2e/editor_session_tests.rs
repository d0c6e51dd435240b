//! End-to-end tests replaying what an editor session sends while a user types
//!
//! Each keystroke batch produces a `code_change`; most intermediate states do
//! not parse. Every one of them must still produce exactly one reply, and a
//! runaway script in one tab must not hold up the others.

use replcap_engine::{CodeChange, ErrorKind, ReplService};
use replcap_tests::{setup_test_logging, TestConfig};
use std::time::{Duration, Instant};

#[tokio::test]
async fn every_keystroke_gets_a_reply() {
    setup_test_logging();
    let service = ReplService::new(TestConfig::default().runtime());
    let typed = "let total = [1, 2, 3].reduce((a, b) => a + b, 0);\ntotal * 2;";

    let mut kinds = Vec::new();
    for end in (1..=typed.len()).filter(|i| typed.is_char_boundary(*i)) {
        let output = service
            .handle(CodeChange {
                code: typed[..end].to_string(),
                tab_id: "tab-1".to_string(),
            })
            .await;
        assert_eq!(output.tab_id, "tab-1");
        kinds.push(output.error.map(|e| e.kind));
    }

    // Intermediate states only ever fail as syntax or runtime errors
    assert!(kinds.iter().flatten().all(|kind| matches!(
        kind,
        ErrorKind::SyntaxError | ErrorKind::RuntimeError
    )));
    assert_eq!(kinds.last(), Some(&None));
}

#[tokio::test]
async fn runaway_tab_does_not_block_others() {
    let service = ReplService::new(TestConfig::default().with_budget_ms(3000).runtime());
    let started = Instant::now();

    let runaway = service.handle(CodeChange {
        code: "for (;;) {}".to_string(),
        tab_id: "stuck".to_string(),
    });
    let quick = async {
        let output = service
            .handle(CodeChange {
                code: "'fast';".to_string(),
                tab_id: "quick".to_string(),
            })
            .await;
        (output, started.elapsed())
    };

    let (stuck, (fast, fast_elapsed)) = tokio::join!(runaway, quick);
    assert_eq!(stuck.error.unwrap().kind, ErrorKind::TimeoutError);
    assert_eq!(fast.output, "=> \"fast\"\n");
    assert!(fast_elapsed < Duration::from_millis(2000));
}
