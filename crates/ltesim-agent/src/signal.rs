//! Process-group signalling.
//!
//! Supervised processes and tool invocations are spawned as leaders of their
//! own process group (pgid == pid), so signals go to the whole group and
//! reach any helpers the process forked.

/// Signals used by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
}

/// Send `signal` to the process group led by `pid`.
///
/// Falls back to signalling the single process when the group is gone.
/// Returns `false` if neither could be signalled (the process already exited).
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: Signal) -> bool {
    let sig = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let pid = pid as libc::pid_t;
    // SAFETY: `pid` is the id of a child we spawned and have not reaped yet
    // (the caller still holds its `Child`), so neither the pid nor the group
    // id can have been recycled. Worst case is ESRCH, which we report.
    unsafe {
        if libc::killpg(pid, sig) == 0 {
            return true;
        }
        libc::kill(pid, sig) == 0
    }
}

#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: Signal) -> bool {
    false
}
