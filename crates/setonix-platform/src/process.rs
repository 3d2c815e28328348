use std::time::{Duration, Instant};

use log::{debug, info};

const PROBE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitWait {
    Exited,
    Aborted,
}

/// Whether a process with this id currently exists.
#[cfg(unix)]
#[must_use]
pub fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    // SAFETY: signal 0 performs only the existence/permission check and never
    // delivers a signal.
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Whether a process with this id currently exists.
#[cfg(windows)]
#[must_use]
pub fn is_process_running(pid: u32) -> bool {
    use windows_sys::Win32::Foundation::{
        CloseHandle, ERROR_ACCESS_DENIED, GetLastError, WAIT_TIMEOUT,
    };
    use windows_sys::Win32::System::Threading::{
        OpenProcess, PROCESS_SYNCHRONIZE, WaitForSingleObject,
    };

    // SAFETY: the handle returned by `OpenProcess` is checked for null,
    // only used for a zero-timeout wait and closed before returning.
    unsafe {
        let handle = OpenProcess(PROCESS_SYNCHRONIZE, 0, pid);
        if handle.is_null() {
            return GetLastError() == ERROR_ACCESS_DENIED;
        }
        let status = WaitForSingleObject(handle, 0);
        CloseHandle(handle);
        status == WAIT_TIMEOUT
    }
}

/// Block until `pid` has exited or `timeout` elapses. Returns `true` when the
/// process is gone.
#[must_use]
pub fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !is_process_running(pid) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(PROBE_INTERVAL.min(deadline - now));
    }
}

/// Wait for `pid` to exit in slices of `poll_interval`. After every slice in
/// which the process is still alive `keep_waiting` decides whether to go on.
pub fn wait_for_exit_or_abort<F>(pid: u32, poll_interval: Duration, mut keep_waiting: F) -> ExitWait
where
    F: FnMut() -> bool,
{
    loop {
        if wait_for_exit(pid, poll_interval) {
            debug!("Process {pid} has exited");
            return ExitWait::Exited;
        }
        if !keep_waiting() {
            info!("Stopped waiting for process {pid}");
            return ExitWait::Aborted;
        }
    }
}
