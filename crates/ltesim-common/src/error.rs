//! Error taxonomy shared by the orchestrator and the device layer.
//!
//! Every failure reaching a caller carries an [`ErrorKind`] plus a message;
//! [`Failure`] is the serializable form handed to the portal and kept in the
//! orchestrator status. Timeouts have no kind of their own: they end in a
//! forced kill and a warning, never in an error.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::NetworkState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad user input. Surfaced immediately, never retried.
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("network is not stopped (state: {0})")]
    AlreadyRunning(NetworkState),
    /// The executable could not be launched.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Device probe or smoke test failed; the session is left `Failed`.
    #[error("device connection failed: {0}")]
    Connection(String),
    /// Post-start health check failed.
    #[error("{component} failed health verification: {reason}")]
    Verification { component: String, reason: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The orchestrator task has exited and can no longer take commands.
    #[error("orchestrator is not running")]
    OrchestratorGone,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParameter,
    AlreadyRunning,
    SpawnError,
    ConnectionError,
    VerificationFailure,
    IoError,
    OrchestratorGone,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::AlreadyRunning => "already_running",
            ErrorKind::SpawnError => "spawn_error",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::VerificationFailure => "verification_failure",
            ErrorKind::IoError => "io_error",
            ErrorKind::OrchestratorGone => "orchestrator_gone",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            Error::Spawn { .. } => ErrorKind::SpawnError,
            Error::Connection(_) => ErrorKind::ConnectionError,
            Error::Verification { .. } => ErrorKind::VerificationFailure,
            Error::Io { .. } => ErrorKind::IoError,
            Error::OrchestratorGone => ErrorKind::OrchestratorGone,
        }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Structured outcome for callers that report rather than propagate.
    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable `(kind, message)` pair describing a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        err.to_failure()
    }
}
