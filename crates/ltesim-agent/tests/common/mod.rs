//! Shared helpers: `/bin/sh` stubs standing in for srsRAN and UHD tools.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ltesim_agent::settings::{Paths, Settings};

/// Loops until SIGTERM, then exits 0.
pub const LONG_RUNNING: &str = "trap 'exit 0' TERM\nwhile true; do sleep 0.05; done";

/// Ignores SIGTERM; only SIGKILL stops it.
pub const IGNORES_TERM: &str = "trap '' TERM\nwhile true; do sleep 0.05; done";

/// Write an executable shell script named `name` into `dir`.
pub fn stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Long-running stub that records its pid in `<dir>/<name>.pid`.
pub fn pid_recording_stub(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    let pid_file = dir.join(format!("{name}.pid"));
    let body = format!("echo $$ > '{}'\n{LONG_RUNNING}", pid_file.display());
    (stub(dir, name, &body), pid_file)
}

pub fn read_pid(pid_file: &Path) -> i32 {
    std::fs::read_to_string(pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

/// True while `pid` exists (unreaped processes included).
pub fn process_exists(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Settings rooted in `dir` with short delays.
pub fn test_settings(dir: &Path, core_bin: &Path, base_station_bin: &Path) -> Settings {
    let scratch = dir.join("scratch");
    std::fs::create_dir_all(&scratch).unwrap();

    let mut settings = Settings::default();
    settings.paths = Paths::under(dir.join("lte"));
    settings.network.core_bin = core_bin.display().to_string();
    settings.network.base_station_bin = base_station_bin.display().to_string();
    settings.network.settle_delay = Duration::from_millis(100);
    settings.network.grace_period = Duration::from_secs(1);
    settings.network.monitor_interval = Duration::from_millis(50);
    settings.device.scratch_dir = scratch;
    settings
}
