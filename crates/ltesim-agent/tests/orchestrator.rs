//! Orchestrator lifecycle tests with stub srsEPC/srsENB executables.

mod common;

use std::time::Duration;

use ltesim_agent::orchestrator::NetworkOrchestrator;
use ltesim_common::ErrorKind;
use ltesim_common::models::{NetworkParams, NetworkState, NetworkStatus};

use common::{LONG_RUNNING, pid_recording_stub, process_exists, read_pid, stub, test_settings};

async fn wait_for(
    orchestrator: &NetworkOrchestrator,
    pred: impl Fn(&NetworkStatus) -> bool,
) -> NetworkStatus {
    let mut rx = orchestrator.subscribe();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            {
                let status = rx.borrow_and_update();
                if pred(&status) {
                    return NetworkStatus::clone(&status);
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("status never reached the expected condition")
}

#[tokio::test]
async fn start_and_stop_network() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", LONG_RUNNING);
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let settings = test_settings(dir.path(), &core, &enb);
    let paths = settings.paths.clone();
    let (orchestrator, actor) = NetworkOrchestrator::spawn(settings);

    let config = orchestrator.start(NetworkParams::default()).await.unwrap();
    assert_eq!(config.plmn_id, "45606");

    let status = orchestrator.status();
    assert_eq!(status.state, NetworkState::Running);
    assert!(status.core_alive && status.base_station_alive);
    assert!(status.core_pid.is_some() && status.base_station_pid.is_some());
    assert_eq!(status.config.as_ref(), Some(&config));
    assert!(paths.epc_conf().exists());
    assert!(paths.enb_conf().exists());
    assert!(paths.current_config_json().exists());

    orchestrator.stop().await.unwrap();
    let status = orchestrator.status();
    assert_eq!(status.state, NetworkState::Stopped);
    assert_eq!(status.core_pid, None);
    assert_eq!(status.base_station_pid, None);
    assert_eq!(status.last_error, None);

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", LONG_RUNNING);
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    orchestrator.start(NetworkParams::default()).await.unwrap();
    let before = orchestrator.status();

    let err = orchestrator.start(NetworkParams::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
    let after = orchestrator.status();
    assert_eq!(after.state, NetworkState::Running);
    assert_eq!(after.core_pid, before.core_pid);

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn stop_when_stopped_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", LONG_RUNNING);
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    orchestrator.stop().await.unwrap();
    orchestrator.stop().await.unwrap();
    assert_eq!(orchestrator.status(), NetworkStatus::default());

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn base_station_spawn_failure_rolls_back_core() {
    let dir = tempfile::tempdir().unwrap();
    let (core, pid_file) = pid_recording_stub(dir.path(), "srsepc");
    let enb = dir.path().join("no-such-srsenb");
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    let err = orchestrator.start(NetworkParams::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SpawnError);

    let status = orchestrator.status();
    assert_eq!(status.state, NetworkState::Stopped);
    assert_eq!(status.core_pid, None);
    assert_eq!(status.last_error.map(|f| f.kind), Some(ErrorKind::SpawnError));
    assert!(!process_exists(read_pid(&pid_file)));

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn core_exiting_immediately_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", "echo 'FATAL: cannot bind S1AP'\nexit 1");
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    let err = orchestrator.start(NetworkParams::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VerificationFailure);
    assert!(err.to_string().contains("core network"), "{err}");

    let status = orchestrator.status();
    assert_eq!(status.state, NetworkState::Stopped);
    assert_eq!(status.base_station_pid, None);
    assert!(status.last_error.is_some());

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn error_lines_in_logs_do_not_fail_start() {
    let dir = tempfile::tempdir().unwrap();
    let noisy = format!("echo 'ERROR: recoverable condition'\n{LONG_RUNNING}");
    let core = stub(dir.path(), "srsepc", &noisy);
    let enb = stub(dir.path(), "srsenb", &noisy);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    orchestrator.start(NetworkParams::default()).await.unwrap();
    let status = orchestrator.status();
    assert_eq!(status.state, NetworkState::Running);
    assert_eq!(status.last_error, None);

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn invalid_params_leave_network_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", LONG_RUNNING);
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    let params = NetworkParams {
        mcc: "45x".into(),
        ..NetworkParams::default()
    };
    let err = orchestrator.start(params).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert_eq!(orchestrator.status().state, NetworkState::Stopped);
    assert_eq!(orchestrator.status().core_pid, None);

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn crash_while_running_stops_survivor() {
    let dir = tempfile::tempdir().unwrap();
    let (core, pid_file) = pid_recording_stub(dir.path(), "srsepc");
    let trigger = dir.path().join("crash-now");
    let enb = stub(
        dir.path(),
        "srsenb",
        &format!(
            "while [ ! -f '{}' ]; do sleep 0.05; done\nexit 3",
            trigger.display()
        ),
    );
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    orchestrator.start(NetworkParams::default()).await.unwrap();
    std::fs::write(&trigger, "").unwrap();

    let status = wait_for(&orchestrator, |s| {
        s.state == NetworkState::Stopped && s.last_error.is_some()
    })
    .await;
    let failure = status.last_error.unwrap();
    assert_eq!(failure.kind, ErrorKind::VerificationFailure);
    assert!(failure.message.contains("base station"), "{}", failure.message);
    assert!(!process_exists(read_pid(&pid_file)));

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn stop_sent_during_start_is_applied_after_it() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", LONG_RUNNING);
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    let starter = orchestrator.clone();
    let start = tokio::spawn(async move { starter.start(NetworkParams::default()).await });
    wait_for(&orchestrator, |s| s.state == NetworkState::Starting).await;

    orchestrator.stop().await.unwrap();
    let config = start.await.unwrap().unwrap();
    assert_eq!(config.plmn_id, "45606");
    assert_eq!(orchestrator.status().state, NetworkState::Stopped);

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();
}

#[tokio::test]
async fn dropping_every_handle_stops_network() {
    let dir = tempfile::tempdir().unwrap();
    let (core, pid_file) = pid_recording_stub(dir.path(), "srsepc");
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    orchestrator.start(NetworkParams::default()).await.unwrap();
    let pid = read_pid(&pid_file);
    assert!(process_exists(pid));

    drop(orchestrator);
    actor.await.unwrap();
    assert!(!process_exists(pid));
}

#[tokio::test]
async fn commands_after_shutdown_report_orchestrator_gone() {
    let dir = tempfile::tempdir().unwrap();
    let core = stub(dir.path(), "srsepc", LONG_RUNNING);
    let enb = stub(dir.path(), "srsenb", LONG_RUNNING);
    let (orchestrator, actor) = NetworkOrchestrator::spawn(test_settings(dir.path(), &core, &enb));

    orchestrator.shutdown().await.unwrap();
    actor.await.unwrap();

    let err = orchestrator.stop().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OrchestratorGone);
}
