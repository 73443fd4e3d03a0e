//! Build-time platform abstraction for socket plumbing.
//!
//! Exactly one backend is compiled in, selected by target:
//!
//! - **Unix**: errno tables, `poll(2)`, `fcntl(2)`, no subsystem startup.
//! - **Windows**: WSA error tables, `WSAPoll`, `ioctlsocket`, and
//!   `WSAStartup`/`WSACleanup` managed through a process-wide usage
//!   counter.
//!
//! Both backends implement the same capability set (non-blocking toggle,
//! last-error retrieval, error-code formatting, readiness polls, and
//! subsystem startup/cleanup), so the socket layer above contains no
//! platform conditionals of its own.
//!
//! The usage counter lives here rather than in either backend: it counts
//! live socket handles on every platform (making lifecycle balance
//! observable via [`subsystem_users`]), and only the startup/cleanup calls
//! it gates are platform-dependent.

use std::io;

use parking_lot::Mutex;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as imp;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as imp;

pub use imp::RawHandle;
pub(crate) use imp::{
    MAX_BACKLOG, SEND_FLAGS, error_text, last_error, poll_read, poll_write, raw_handle,
    set_non_blocking,
};

/// Count of live socket handles holding the subsystem open.
static SUBSYSTEM_USERS: Mutex<usize> = Mutex::new(0);

/// Keeps the platform socket subsystem initialized while a handle is alive.
///
/// Dropping the guard decrements the usage counter; the subsystem is torn
/// down when the counter reaches zero.
pub(crate) struct SubsystemGuard {
    _private: (),
}

/// Register one more live handle, starting the subsystem on the first.
///
/// Safe to call from any thread; the counter is lock-protected so
/// concurrent create/close cycles cannot lose updates.
pub(crate) fn acquire() -> io::Result<SubsystemGuard> {
    let mut users = SUBSYSTEM_USERS.lock();
    if *users == 0 {
        imp::startup()?;
    }
    *users += 1;
    Ok(SubsystemGuard { _private: () })
}

impl Drop for SubsystemGuard {
    fn drop(&mut self) {
        let mut users = SUBSYSTEM_USERS.lock();
        *users -= 1;
        if *users == 0 {
            imp::cleanup();
        }
    }
}

/// Number of live connections currently holding the socket subsystem open.
pub fn subsystem_users() -> usize {
    *SUBSYSTEM_USERS.lock()
}

/// Emit the single diagnostic line for a failed OS call: the operation name,
/// the platform error code, and its formatted text.
pub(crate) fn log_os_error(operation: &str, error: &io::Error) {
    let code = error.raw_os_error().unwrap_or_else(last_error);
    tracing::error!(
        target: "telecast_net::platform",
        "{operation}: ({code}) {}",
        error_text(code)
    );
}
