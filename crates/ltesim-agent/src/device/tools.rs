//! Bounded invocation of external SDR tools.
//!
//! Every run has a hard deadline enforced here, not by a `timeout(1)`
//! wrapper. At the deadline the process group gets SIGTERM, then SIGKILL if
//! it is still there after [`TOOL_GRACE_PERIOD`]. Combined output goes to a
//! temporary capture file and is read back after the process is reaped; the
//! capture and any sample file are deleted when their guards drop, whichever
//! way the run ends.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

use ltesim_common::{Error, Result};

use crate::signal::{Signal, signal_group};

/// Exit code reported for a run that hit its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// SIGTERM → SIGKILL escalation delay for a tool past its deadline.
pub const TOOL_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Tools that must finish cleanly.
pub const SUCCESS_ONLY: &[i32] = &[0];

/// Tools that may legitimately run until their window closes.
pub const BOUNDED: &[i32] = &[0, TIMEOUT_EXIT_CODE];

/// Result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub program: String,
    /// Exit code as reported by the OS; `None` if killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Combined stdout and stderr.
    pub output: String,
}

impl ToolRun {
    /// Effective exit code; a run killed at its deadline counts as 124.
    pub fn code(&self) -> Option<i32> {
        if self.timed_out {
            Some(TIMEOUT_EXIT_CODE)
        } else {
            self.exit_code
        }
    }

    pub fn accepted(&self, codes: &[i32]) -> bool {
        self.code().is_some_and(|c| codes.contains(&c))
    }
}

/// Runs tools with their output captured under `scratch_dir`.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    scratch_dir: PathBuf,
}

impl ToolRunner {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
        }
    }

    /// A temporary `.bin` path for `--file` sample output.
    pub fn sample_file(&self) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("ltesim-samples-")
            .suffix(".bin")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| Error::io(&self.scratch_dir, e))
    }

    /// Run `program args…`, terminating its process group after `limit`.
    ///
    /// Only a failed spawn is an error; exit codes and timeouts are reported
    /// in the [`ToolRun`].
    pub async fn invoke(
        &self,
        program: &str,
        args: &[String],
        limit: Duration,
    ) -> Result<ToolRun> {
        let capture = tempfile::Builder::new()
            .prefix("ltesim-capture-")
            .suffix(".log")
            .tempfile_in(&self.scratch_dir)
            .map_err(|e| Error::io(&self.scratch_dir, e))?;
        let stdout = capture
            .as_file()
            .try_clone()
            .map_err(|e| Error::io(capture.path(), e))?;
        let stderr = capture
            .as_file()
            .try_clone()
            .map_err(|e| Error::io(capture.path(), e))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(program, ?args, limit_ms = limit.as_millis() as u64, "running tool");
        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();

        let (exit_code, timed_out) = match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => {
                tracing::warn!(program, error = %e, "failed to wait for tool");
                (None, false)
            }
            Err(_) => {
                tracing::warn!(
                    program,
                    limit_ms = limit.as_millis() as u64,
                    "tool exceeded its time limit, terminating"
                );
                if let Some(pid) = pid {
                    signal_group(pid, Signal::Terminate);
                }
                match tokio::time::timeout(TOOL_GRACE_PERIOD, child.wait()).await {
                    Ok(Ok(status)) => (status.code(), true),
                    _ => {
                        tracing::warn!(program, "tool ignored SIGTERM, killing");
                        if let Some(pid) = pid {
                            signal_group(pid, Signal::Kill);
                        }
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        (None, true)
                    }
                }
            }
        };

        let output = match tokio::fs::read(capture.path()).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::debug!(program, error = %e, "could not read tool output");
                String::new()
            }
        };

        let run = ToolRun {
            program: program.to_string(),
            exit_code,
            timed_out,
            output,
        };
        tracing::debug!(program, code = ?run.code(), timed_out, "tool finished");
        Ok(run)
    }
}

/// `--args <device_args>` followed by `rest`.
pub fn with_device_args(device_args: &str, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["--args".to_string(), device_args.to_string()];
    args.extend(rest.iter().map(|s| s.to_string()));
    args
}
