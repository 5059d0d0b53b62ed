//! Post-start health verification.
//!
//! Liveness decides pass/fail. Error markers in the process logs are only
//! reported as warnings: srsRAN prints `ERROR` lines for recoverable
//! conditions during attach.

use std::path::Path;

use serde::Serialize;

use ltesim_common::models::Component;

use crate::supervisor::ProcessSupervisor;

/// Substrings that flag a log line.
pub const ERROR_MARKERS: [&str; 2] = ["ERROR", "FATAL"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthFailure {
    pub component: Component,
    pub reason: String,
}

/// First offending line of one process log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogWarning {
    pub component: Component,
    pub marker: &'static str,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub core_alive: bool,
    pub base_station_alive: bool,
    pub failure: Option<HealthFailure>,
    pub warnings: Vec<LogWarning>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.failure.is_none()
    }
}

/// Check both processes. Never errors; the core is checked first.
pub async fn verify(
    core: &mut ProcessSupervisor,
    base_station: &mut ProcessSupervisor,
) -> HealthReport {
    let core_alive = core.is_alive();
    let base_station_alive = base_station.is_alive();

    let failure = if !core_alive {
        Some(HealthFailure {
            component: Component::CoreNetwork,
            reason: exit_reason(core),
        })
    } else if !base_station_alive {
        Some(HealthFailure {
            component: Component::BaseStation,
            reason: exit_reason(base_station),
        })
    } else {
        None
    };

    if failure.is_some() {
        return HealthReport {
            core_alive,
            base_station_alive,
            failure,
            warnings: Vec::new(),
        };
    }

    let mut warnings = Vec::new();
    for (component, sup) in [
        (Component::CoreNetwork, &*core),
        (Component::BaseStation, &*base_station),
    ] {
        let Some(path) = sup.log_path() else { continue };
        if let Some((marker, line)) = scan_log(path).await {
            tracing::warn!(
                component = %component,
                marker,
                line = %line,
                "error marker in process log"
            );
            warnings.push(LogWarning {
                component,
                marker,
                line,
            });
        }
    }

    HealthReport {
        core_alive,
        base_station_alive,
        failure: None,
        warnings,
    }
}

pub(crate) fn exit_reason(sup: &ProcessSupervisor) -> String {
    match sup.last_exit().and_then(|s| s.code()) {
        Some(code) => format!("process exited with code {code}"),
        None if sup.last_exit().is_some() => "process terminated by signal".into(),
        None => "process is not running".into(),
    }
}

/// First line containing an error marker. Missing or unreadable logs have
/// no findings.
pub async fn scan_log(path: &Path) -> Option<(&'static str, String)> {
    let bytes = tokio::fs::read(path).await.ok()?;
    find_marker(&String::from_utf8_lossy(&bytes))
}

fn find_marker(text: &str) -> Option<(&'static str, String)> {
    text.lines().find_map(|line| {
        ERROR_MARKERS
            .iter()
            .find(|m| line.contains(*m))
            .map(|m| (*m, line.trim().to_string()))
    })
}
