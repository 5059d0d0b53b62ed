//! Process supervisor tests against `/bin/sh` stubs.

mod common;

use std::time::{Duration, Instant};

use ltesim_agent::supervisor::{ProcessSupervisor, StopOutcome};
use ltesim_common::ErrorKind;
use ltesim_common::models::ProcessState;

use common::{IGNORES_TERM, LONG_RUNNING, stub};

#[tokio::test]
async fn sigterm_stops_cooperative_process() {
    let dir = tempfile::tempdir().unwrap();
    let bin = stub(dir.path(), "srsepc", LONG_RUNNING);
    let log = dir.path().join("epc_process.log");

    let mut sup = ProcessSupervisor::new("srsepc");
    let pid = sup.start(&bin.display().to_string(), &[], &log).unwrap();
    assert!(pid > 0);
    assert_eq!(sup.state(), ProcessState::Running);
    assert!(sup.is_alive());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcome = sup.stop(Duration::from_secs(5)).await;
    assert_eq!(outcome, StopOutcome::Graceful);
    assert_eq!(sup.state(), ProcessState::Stopped);
    assert_eq!(sup.pid(), None);
    assert_eq!(sup.last_exit().and_then(|s| s.code()), Some(0));
}

#[tokio::test]
async fn term_ignoring_process_is_force_killed() {
    let dir = tempfile::tempdir().unwrap();
    let bin = stub(dir.path(), "stubborn", IGNORES_TERM);
    let log = dir.path().join("stubborn.log");

    let mut sup = ProcessSupervisor::new("stubborn");
    let pid = sup.start(&bin.display().to_string(), &[], &log).unwrap();
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let grace = Duration::from_millis(300);
    let started = Instant::now();
    let outcome = sup.stop(grace).await;

    assert_eq!(outcome, StopOutcome::Forced);
    assert!(started.elapsed() >= grace);
    assert_eq!(sup.state(), ProcessState::Stopped);
    assert!(!common::process_exists(pid as i32));
}

#[tokio::test]
async fn crash_is_detected_by_liveness_check() {
    let dir = tempfile::tempdir().unwrap();
    let bin = stub(dir.path(), "crasher", "exit 7");
    let log = dir.path().join("crasher.log");

    let mut sup = ProcessSupervisor::new("crasher");
    sup.start(&bin.display().to_string(), &[], &log).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while sup.is_alive() {
        assert!(Instant::now() < deadline, "process never exited");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(sup.state(), ProcessState::CrashedUnexpectedly);
    assert_eq!(sup.last_exit().and_then(|s| s.code()), Some(7));
    assert_eq!(sup.pid(), None);
    assert_eq!(sup.stop(Duration::from_secs(1)).await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn output_goes_to_truncated_log() {
    let dir = tempfile::tempdir().unwrap();
    let bin = stub(
        dir.path(),
        "chatty",
        &format!("echo \"started with $1\"\necho oops >&2\n{LONG_RUNNING}"),
    );
    let log = dir.path().join("chatty.log");
    std::fs::write(&log, "stale output from last run\n").unwrap();

    let mut sup = ProcessSupervisor::new("chatty");
    sup.start(&bin.display().to_string(), &["/etc/epc.conf".into()], &log)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    sup.stop(Duration::from_secs(5)).await;

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(!text.contains("stale"));
    assert!(text.contains("started with /etc/epc.conf"));
    assert!(text.contains("oops"));
    assert_eq!(sup.log_path(), Some(log.as_path()));
}

#[tokio::test]
async fn missing_executable_is_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("missing.log");

    let mut sup = ProcessSupervisor::new("srsepc");
    let err = sup
        .start("/nonexistent/srsepc", &[], &log)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpawnError);
    assert_eq!(sup.state(), ProcessState::NotStarted);
    assert_eq!(sup.stop(Duration::from_secs(1)).await, StopOutcome::NotRunning);
}
