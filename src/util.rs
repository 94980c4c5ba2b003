//! Internal utilities.

/// Checks whether the process with the given PID is still alive.
///
/// Uses `kill(pid, 0)`; signal 0 checks existence without delivering a signal.
#[cfg(unix)]
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: `kill(pid, 0)` is a standard POSIX existence check that does
    // not deliver any signal.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to someone else.
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Without a liveness check every PID is assumed alive, so nothing is reaped.
#[cfg(not(unix))]
#[must_use]
pub const fn is_process_alive(_pid: u32) -> bool {
    true
}
