//! Unix socket backend: errno lookup, `poll(2)` readiness checks, and the
//! non-blocking flag via `fcntl(2)`. No socket-subsystem startup is needed
//! on these platforms.

use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

use socket2::Socket;

/// Raw OS socket handle.
pub type RawHandle = std::os::fd::RawFd;

/// Flags applied to every send so a dead peer surfaces as `EPIPE` instead of
/// killing the process with `SIGPIPE`.
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub(crate) const SEND_FLAGS: i32 = libc::MSG_NOSIGNAL;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) const SEND_FLAGS: i32 = 0;

/// Largest backlog the OS supports.
pub(crate) const MAX_BACKLOG: i32 = libc::SOMAXCONN;

/// errno values paired with diagnostic text for socket operations.
const MESSAGES: &[(i32, &str)] = &[
    (libc::EAGAIN, "EAGAIN: the socket is marked non-blocking and the requested operation would block"),
    (libc::EBADF, "EBADF: an invalid descriptor was specified"),
    (libc::ECONNRESET, "ECONNRESET: connection reset by peer"),
    (libc::EDESTADDRREQ, "EDESTADDRREQ: the socket is not in connection mode and no peer address is set"),
    (libc::EFAULT, "EFAULT: an invalid userspace address was specified for a parameter"),
    (libc::EINTR, "EINTR: a signal occurred before data was transmitted"),
    (libc::EINVAL, "EINVAL: invalid argument passed"),
    (libc::ENOTSOCK, "ENOTSOCK: the argument is not a valid socket"),
    (libc::EMSGSIZE, "EMSGSIZE: the message could not be sent atomically at this size"),
    (libc::ENOBUFS, "ENOBUFS: the output queue for a network interface was full"),
    (libc::ENOMEM, "ENOMEM: no memory available"),
    (libc::EPIPE, "EPIPE: the local end has been shut down on a connection oriented socket"),
    (libc::EPROTONOSUPPORT, "EPROTONOSUPPORT: the protocol type or the specified protocol is not supported within this domain"),
    (libc::EAFNOSUPPORT, "EAFNOSUPPORT: the implementation does not support the specified address family"),
    (libc::ENFILE, "ENFILE: not enough kernel memory to allocate a new socket structure"),
    (libc::EMFILE, "EMFILE: process file table overflow"),
    (libc::EACCES, "EACCES: permission to create a socket of the specified type and/or protocol is denied"),
    (libc::ECONNREFUSED, "ECONNREFUSED: a remote host refused to allow the network connection"),
    (libc::ENOTCONN, "ENOTCONN: the socket has not been connected"),
    (libc::ETIMEDOUT, "ETIMEDOUT: connection timed out"),
    (libc::ENETUNREACH, "ENETUNREACH: network is unreachable"),
    (libc::EADDRINUSE, "EADDRINUSE: address already in use"),
    (libc::EHOSTUNREACH, "EHOSTUNREACH: no route to host"),
];

/// Look up the diagnostic text for an errno value.
pub(crate) fn error_text(code: i32) -> &'static str {
    MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| *text)
        .unwrap_or("unrecognised socket error")
}

/// The errno left behind by the last failed socket call on this thread.
pub(crate) fn last_error() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(-1)
}

/// The raw descriptor backing `socket`.
pub(crate) fn raw_handle(socket: &Socket) -> RawHandle {
    socket.as_raw_fd()
}

/// Set or clear `O_NONBLOCK` on the socket's descriptor.
pub(crate) fn set_non_blocking(socket: &Socket, enabled: bool) -> io::Result<()> {
    let fd = socket.as_raw_fd();

    // SAFETY: `fd` is a descriptor owned by `socket`, which outlives the call.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let flags = if enabled {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };

    // SAFETY: as above; F_SETFL with a flag word derived from F_GETFL.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Zero-timeout poll for writable and exceptional conditions.
///
/// A socket that is merely busy is not an error; only a failure of the poll
/// call itself is reported.
pub(crate) fn poll_write(socket: &Socket) -> io::Result<()> {
    let mut pollfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLOUT | libc::POLLPRI,
        revents: 0,
    };

    // SAFETY: `pollfd` is a valid stack allocation for exactly one entry.
    if unsafe { libc::poll(&mut pollfd, 1, 0) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Poll for readability, waiting up to `timeout`.
pub(crate) fn poll_read(socket: &Socket, timeout: Duration) -> bool {
    let mut pollfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    // SAFETY: `pollfd` is a valid stack allocation for exactly one entry.
    let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    ready > 0 && (pollfd.revents & libc::POLLIN) != 0
}

/// No socket-subsystem startup is required on Unix platforms.
pub(crate) fn startup() -> io::Result<()> {
    Ok(())
}

/// No socket-subsystem teardown is required on Unix platforms.
pub(crate) fn cleanup() {}
