//! Tests for the registry, runner and report working together
//!
//! Tests cover:
//! - One outcome per registered test, in order
//! - Passed / Failed / Errored classification, panics included
//! - Run timeout cancelling the remaining queue
//! - Diagnostics attached to failing outcomes
//! - Report exit code

use octa_e2e::{
    check, CommandError, E2EError, E2EResult, Report, Runner, TestContext, TestRegistry,
    TestStatus,
};
use parking_lot::Mutex;
use std::time::Duration;

/// Context recording which tests ran and offering canned diagnostics
#[derive(Default)]
struct Recorder {
    ran: Mutex<Vec<String>>,
    diagnostics: Mutex<Option<String>>,
}

impl TestContext for Recorder {
    fn take_diagnostics(&self) -> Option<String> {
        self.diagnostics.lock().take()
    }
}

impl Recorder {
    fn visit(&self, name: &str) {
        self.ran.lock().push(name.to_string());
    }
}

fn passes(ctx: &Recorder, name: &str) -> E2EResult<()> {
    ctx.visit(name);
    Ok(())
}

fn fails(ctx: &Recorder, name: &str) -> E2EResult<()> {
    ctx.visit(name);
    *ctx.diagnostics.lock() = Some("$ aptos move compile\n(exit code 1)".to_string());
    check!(1 + 1 == 3, "arithmetic is broken in {}", name);
    Ok(())
}

fn errors(ctx: &Recorder, name: &str) -> E2EResult<()> {
    ctx.visit(name);
    Err(CommandError::EmptyCommand.into())
}

fn panics(ctx: &Recorder, name: &str) -> E2EResult<()> {
    ctx.visit(name);
    panic!("unexpected state in {}", name);
}

fn command_fails(ctx: &Recorder, name: &str) -> E2EResult<()> {
    ctx.visit(name);
    Err(E2EError::CommandFailed {
        command: "aptos account create".to_string(),
        exit_code: 1,
        stderr: "already exists".to_string(),
    })
}

fn sleeps(ctx: &Recorder, name: &str) -> E2EResult<()> {
    ctx.visit(name);
    std::thread::sleep(Duration::from_millis(200));
    Ok(())
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn every_test_yields_one_outcome_in_order() {
    let registry = TestRegistry::<Recorder>::new()
        .with("test_pass", passes)
        .and_then(|r| r.with("test_fail", fails))
        .and_then(|r| r.with("test_error", errors))
        .and_then(|r| r.with("test_panic", panics))
        .and_then(|r| r.with("test_command", command_fails))
        .and_then(|r| r.with("test_after", passes))
        .unwrap();
    let ctx = Recorder::default();

    let outcomes = Runner::new().run(&registry, &ctx);

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, registry.names());
    assert_eq!(*ctx.ran.lock(), registry.names());

    let statuses: Vec<TestStatus> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Errored,
            TestStatus::Errored,
            TestStatus::Failed,
            TestStatus::Passed,
        ]
    );
}

#[test]
fn failure_messages_and_diagnostics() {
    let registry = TestRegistry::<Recorder>::new()
        .with("test_fail", fails)
        .and_then(|r| r.with("test_panic", panics))
        .unwrap();
    let outcomes = Runner::new().run(&registry, &Recorder::default());

    let failed = &outcomes[0];
    assert_eq!(
        failed.message.as_deref(),
        Some("assertion failed: arithmetic is broken in test_fail")
    );
    assert!(failed.output.as_deref().unwrap().contains("aptos move compile"));

    let panicked = &outcomes[1];
    assert_eq!(
        panicked.message.as_deref(),
        Some("panicked: unexpected state in test_panic")
    );
    // Consumed by the previous test
    assert!(panicked.output.is_none());
}

#[test]
fn passing_test_carries_no_output() {
    let registry = TestRegistry::<Recorder>::new()
        .with("test_pass", passes)
        .unwrap();
    let ctx = Recorder::default();
    *ctx.diagnostics.lock() = Some("stale".to_string());

    let outcomes = Runner::new().run(&registry, &ctx);
    assert_eq!(outcomes[0].status, TestStatus::Passed);
    assert!(outcomes[0].message.is_none());
    assert!(outcomes[0].output.is_none());
}

// ============================================================================
// Run timeout
// ============================================================================

#[test]
fn run_timeout_cancels_remaining_tests() {
    let registry = TestRegistry::<Recorder>::new()
        .with("test_slow", sleeps)
        .and_then(|r| r.with("test_next", passes))
        .and_then(|r| r.with("test_last", passes))
        .unwrap();
    let ctx = Recorder::default();

    let outcomes = Runner::new()
        .with_run_timeout(Duration::from_millis(50))
        .run(&registry, &ctx);

    assert_eq!(outcomes.len(), 3);
    // Already started, so it finishes and keeps its outcome
    assert_eq!(outcomes[0].status, TestStatus::Passed);
    assert_eq!(outcomes[1].status, TestStatus::Cancelled);
    assert_eq!(outcomes[2].status, TestStatus::Cancelled);
    assert_eq!(*ctx.ran.lock(), vec!["test_slow".to_string()]);
}

#[test]
fn generous_run_timeout_runs_everything() {
    let registry = TestRegistry::<Recorder>::new()
        .with("a", passes)
        .and_then(|r| r.with("b", passes))
        .unwrap();
    let outcomes = Runner::new()
        .with_run_timeout(Duration::from_secs(60))
        .run(&registry, &Recorder::default());
    assert!(outcomes.iter().all(|o| o.status == TestStatus::Passed));
}

// ============================================================================
// Report
// ============================================================================

#[test]
fn report_exit_code_follows_outcomes() {
    let passing = TestRegistry::<Recorder>::new()
        .with("a", passes)
        .and_then(|r| r.with("b", passes))
        .unwrap();
    let outcomes = Runner::new().run(&passing, &Recorder::default());
    assert_eq!(Report::from_outcomes(&outcomes).exit_code(), 0);

    let failing = TestRegistry::<Recorder>::new()
        .with("a", passes)
        .and_then(|r| r.with("b", errors))
        .unwrap();
    let outcomes = Runner::new().run(&failing, &Recorder::default());
    let report = Report::from_outcomes(&outcomes);
    assert_eq!(report.exit_code(), 1);
    assert_eq!((report.passed, report.errored), (1, 1));
}

#[test]
fn bundled_registry_filters_by_name() {
    let mut registry = octa_e2e::cases::registry().unwrap();
    registry
        .retain_named(&["test_move_compile", "test_account_create"])
        .unwrap();
    assert_eq!(
        registry.names(),
        vec!["test_account_create", "test_move_compile"]
    );
    assert!(registry.retain_named(&["test_nope"]).is_err());
}
