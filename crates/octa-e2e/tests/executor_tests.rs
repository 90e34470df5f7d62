//! Tests for the command executor against real subprocesses
//!
//! Tests cover:
//! - Output capture on both streams, including large output
//! - Nonzero and signal exits reported as data
//! - Timeouts killing the whole process group, including after the child exits
//! - Timeouts too large to form a deadline
//! - Environment and program substitution

#![cfg(unix)]

use octa_e2e::{CommandError, CommandExecutor, CommandSpec};
use std::time::{Duration, Instant};

fn sh(script: &str, dir: &std::path::Path) -> CommandSpec {
    CommandSpec::new(["sh", "-c", script], dir)
}

fn executor() -> CommandExecutor {
    CommandExecutor::new(Duration::from_secs(30))
}

// ============================================================================
// Capture
// ============================================================================

#[test]
fn captures_stdout_and_stderr_separately() {
    let dir = tempfile::tempdir().unwrap();
    let result = executor()
        .run_default(&sh("echo out; echo err >&2", dir.path()))
        .unwrap();

    assert!(result.success());
    assert_eq!(result.stdout, "out\n");
    assert_eq!(result.stderr, "err\n");
    assert_eq!(result.command_line, "sh -c 'echo out; echo err >&2'");
}

#[test]
fn runs_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

    let result = executor()
        .run_default(&sh("cat marker.txt", dir.path()))
        .unwrap();
    assert_eq!(result.stdout, "here");
}

#[test]
fn large_output_does_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    // Well past a pipe buffer on both streams
    let script = "i=0; while [ $i -lt 20000 ]; do echo line-$i; echo err-$i >&2; i=$((i+1)); done";

    let result = executor().run_default(&sh(script, dir.path())).unwrap();
    assert!(result.success());
    assert_eq!(result.stdout.lines().count(), 20000);
    assert_eq!(result.stderr.lines().count(), 20000);
    assert_eq!(result.stdout.lines().last(), Some("line-19999"));
}

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn nonzero_exit_is_data() {
    let dir = tempfile::tempdir().unwrap();
    let result = executor()
        .run_default(&sh("echo failing >&2; exit 42", dir.path()))
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.exit_code, 42);
    assert_eq!(result.stderr, "failing\n");
}

#[test]
fn signal_exit_maps_to_128_plus_signal() {
    let dir = tempfile::tempdir().unwrap();
    let result = executor()
        .run_default(&sh("kill -9 $$", dir.path()))
        .unwrap();
    assert_eq!(result.exit_code, 128 + 9);
}

// ============================================================================
// Timeouts
// ============================================================================

#[test]
fn timeout_kills_process_group() {
    let dir = tempfile::tempdir().unwrap();
    // Background grandchild holds the pipes open; only a group kill ends it
    let spec = sh("echo started; sleep 30 & wait", dir.path());

    let start = Instant::now();
    let err = executor()
        .run(&spec, Duration::from_millis(500))
        .unwrap_err();
    let elapsed = start.elapsed();

    match err {
        CommandError::Timeout {
            timeout, stdout, ..
        } => {
            assert_eq!(timeout, Duration::from_millis(500));
            assert_eq!(stdout, "started\n");
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
}

#[test]
fn timeout_covers_background_process_holding_pipes() {
    let dir = tempfile::tempdir().unwrap();
    // The shell exits at once; the backgrounded sleep keeps stdout open
    let spec = sh("sleep 6 & echo hi", dir.path());

    let start = Instant::now();
    let err = executor()
        .run(&spec, Duration::from_millis(500))
        .unwrap_err();
    let elapsed = start.elapsed();

    match err {
        CommandError::Timeout { stdout, .. } => assert_eq!(stdout, "hi\n"),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
}

#[test]
fn unbounded_timeout_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    for timeout in [Duration::MAX, Duration::from_secs(u64::MAX)] {
        let result = executor().run(&sh("echo done", dir.path()), timeout).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "done\n");
    }
}

#[test]
fn fast_command_beats_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let result = executor()
        .run(&sh("echo quick", dir.path()), Duration::from_secs(5))
        .unwrap();
    assert_eq!(result.stdout, "quick\n");
    assert!(result.duration < Duration::from_secs(5));
}

// ============================================================================
// Environment and program
// ============================================================================

#[test]
fn passes_environment() {
    let dir = tempfile::tempdir().unwrap();
    let spec = sh("printf %s \"$OCTA_E2E_VALUE\"", dir.path()).env("OCTA_E2E_VALUE", "forty two");
    let result = executor().run_default(&spec).unwrap();
    assert_eq!(result.stdout, "forty two");
}

#[test]
fn program_override_replaces_argv0() {
    let dir = tempfile::tempdir().unwrap();
    let executor = executor().with_program("sh");
    let spec = CommandSpec::new(["aptos", "-c", "echo substituted"], dir.path());

    let result = executor.run_default(&spec).unwrap();
    assert_eq!(result.stdout, "substituted\n");
    // Diagnostics keep the argv as written
    assert!(result.command_line.starts_with("aptos -c"));
}
