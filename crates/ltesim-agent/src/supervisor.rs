//! Process supervisor: starts, polls and stops one external process.
//!
//! Each supervised process (srsEPC, srsENB) is spawned in its own process
//! group with stdout and stderr appended to a log file. Stopping is always
//! two-phase: SIGTERM to the group, a bounded wait, then SIGKILL and an
//! unconditional reap.
//!
//! The supervisor only sends signals; it does not tie the child's lifetime
//! to its own. Dropping a supervisor leaves the process running, and if the
//! agent itself crashes the process group is orphaned.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use ltesim_common::models::ProcessState;
use ltesim_common::{Error, Result};

use crate::signal::{Signal, signal_group};

/// Default SIGTERM → SIGKILL escalation delay.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How a [`ProcessSupervisor::stop`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The process had already exited; it was only reaped.
    AlreadyExited,
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Ignored SIGTERM and was killed.
    Forced,
}

/// The live process. Dropping it closes the log file.
struct ProcessHandle {
    pid: u32,
    child: Child,
    /// Parent-side log handle, held until the process is reaped.
    _log: File,
}

pub struct ProcessSupervisor {
    name: String,
    handle: Option<ProcessHandle>,
    state: ProcessState,
    log_path: Option<PathBuf>,
    last_exit: Option<ExitStatus>,
}

impl ProcessSupervisor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: None,
            state: ProcessState::NotStarted,
            log_path: None,
            last_exit: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// PID of the live process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(|h| h.pid)
    }

    /// Log file of the current (or most recent) process.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Exit status of the most recently reaped process.
    pub fn last_exit(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    /// Spawn `program args…` with combined output going to `log_path`.
    ///
    /// The log is truncated first and then opened in append mode. Returns the
    /// PID as soon as the spawn succeeds.
    pub fn start(&mut self, program: &str, args: &[String], log_path: &Path) -> Result<u32> {
        if self.is_alive() {
            return Err(Error::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("{} is already running", self.name),
                ),
            });
        }

        File::create(log_path).map_err(|e| Error::io(log_path, e))?;
        let log = File::options()
            .append(true)
            .open(log_path)
            .map_err(|e| Error::io(log_path, e))?;
        let stdout = log.try_clone().map_err(|e| Error::io(log_path, e))?;
        let stderr = log.try_clone().map_err(|e| Error::io(log_path, e))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::info!(component = %self.name, cmd = ?cmd, "spawning process");
        let child = cmd.spawn().map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();

        self.handle = Some(ProcessHandle {
            pid,
            child,
            _log: log,
        });
        self.state = ProcessState::Running;
        self.log_path = Some(log_path.to_path_buf());
        self.last_exit = None;

        tracing::info!(component = %self.name, pid, log = %log_path.display(), "process started");
        Ok(pid)
    }

    /// Non-blocking liveness check.
    ///
    /// A process found dead while `Running` is marked `CrashedUnexpectedly`
    /// and its handle released.
    pub fn is_alive(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        match handle.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if self.state == ProcessState::Running {
                    tracing::warn!(
                        component = %self.name,
                        pid = handle.pid,
                        exit_code = ?status.code(),
                        "process exited unexpectedly"
                    );
                    self.state = ProcessState::CrashedUnexpectedly;
                }
                self.last_exit = Some(status);
                self.handle = None;
                false
            }
            Err(e) => {
                // Status unknown; treat as alive
                tracing::warn!(component = %self.name, error = %e, "error checking process status");
                true
            }
        }
    }

    /// Stop the process: SIGTERM, wait up to `grace_period`, then SIGKILL.
    ///
    /// Never fails; the forced path is logged. The state is `Stopped`
    /// afterwards whenever a process was present.
    pub async fn stop(&mut self, grace_period: Duration) -> StopOutcome {
        let Some(mut handle) = self.handle.take() else {
            return StopOutcome::NotRunning;
        };

        if let Ok(Some(status)) = handle.child.try_wait() {
            tracing::info!(
                component = %self.name,
                exit_code = ?status.code(),
                "process had already exited"
            );
            self.last_exit = Some(status);
            self.state = ProcessState::Stopped;
            return StopOutcome::AlreadyExited;
        }

        self.state = ProcessState::Terminating;
        tracing::info!(component = %self.name, pid = handle.pid, "sending SIGTERM");
        signal_group(handle.pid, Signal::Terminate);

        let outcome = match tokio::time::timeout(grace_period, handle.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(
                    component = %self.name,
                    exit_code = ?status.code(),
                    "process exited cleanly"
                );
                self.last_exit = Some(status);
                StopOutcome::Graceful
            }
            Ok(Err(e)) => {
                tracing::warn!(component = %self.name, error = %e, "wait failed, killing");
                self.force_kill(&mut handle).await
            }
            Err(_) => {
                tracing::warn!(
                    component = %self.name,
                    grace_ms = grace_period.as_millis() as u64,
                    "process didn't exit within grace period, killing"
                );
                self.force_kill(&mut handle).await
            }
        };

        self.state = ProcessState::Stopped;
        drop(handle);
        outcome
    }

    async fn force_kill(&mut self, handle: &mut ProcessHandle) -> StopOutcome {
        signal_group(handle.pid, Signal::Kill);
        // Covers platforms without process groups; harmless if already dead.
        let _ = handle.child.start_kill();
        match handle.child.wait().await {
            Ok(status) => self.last_exit = Some(status),
            Err(e) => {
                tracing::error!(component = %self.name, error = %e, "failed to reap killed process")
            }
        }
        tracing::warn!(component = %self.name, pid = handle.pid, "process force killed");
        StopOutcome::Forced
    }
}
