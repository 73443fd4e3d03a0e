//! Winsock backend: WSA error lookup, `WSAPoll` readiness checks, the
//! non-blocking flag via `ioctlsocket`, and explicit subsystem startup and
//! teardown through `WSAStartup`/`WSACleanup`.

use std::io;
use std::os::windows::io::AsRawSocket;
use std::time::Duration;

use socket2::Socket;
use windows::Win32::Networking::WinSock::{
    FIONBIO, POLLRDNORM, POLLWRNORM, SOCKET, WSACleanup, WSADATA, WSAGetLastError, WSAPOLLFD,
    WSAPoll, WSAStartup, ioctlsocket,
};
use windows::Win32::Networking::WinSock::{
    WSA_INVALID_PARAMETER, WSA_NOT_ENOUGH_MEMORY, WSA_OPERATION_ABORTED, WSAEACCES, WSAEADDRINUSE,
    WSAEAFNOSUPPORT, WSAEBADF, WSAECONNREFUSED, WSAECONNRESET, WSAEDESTADDRREQ, WSAEFAULT,
    WSAEINTR, WSAEINVAL, WSAEISCONN, WSAEMSGSIZE, WSAENETDOWN, WSAENOPROTOOPT, WSAENOTSOCK,
    WSAEPFNOSUPPORT, WSAEPROTOTYPE, WSAETIMEDOUT, WSAEWOULDBLOCK, WSAHOST_NOT_FOUND,
    WSANO_DATA, WSANOTINITIALISED, WSATRY_AGAIN,
};

/// Raw OS socket handle.
pub type RawHandle = std::os::windows::io::RawSocket;

/// No extra send flags are needed on Winsock; write failures never raise
/// signals here.
pub(crate) const SEND_FLAGS: i32 = 0;

/// Largest backlog the OS supports (`SOMAXCONN` in winsock2.h).
pub(crate) const MAX_BACKLOG: i32 = 0x7fff_ffff;

/// Winsock 2.2, the version this crate requests and requires.
const REQUESTED_VERSION: u16 = 0x0202;

/// WSA error codes paired with diagnostic text for socket operations.
const MESSAGES: &[(i32, &str)] = &[
    (WSANOTINITIALISED.0, "a successful WSAStartup call must occur before using this function"),
    (WSAENETDOWN.0, "the network subsystem or the associated service provider has failed"),
    (WSA_NOT_ENOUGH_MEMORY.0, "insufficient memory available"),
    (WSA_INVALID_PARAMETER.0, "one or more parameters are invalid"),
    (WSA_OPERATION_ABORTED.0, "overlapped operation aborted"),
    (WSAEINTR.0, "interrupted function call"),
    (WSAEBADF.0, "file handle is not valid"),
    (WSAEACCES.0, "permission denied"),
    (WSAEFAULT.0, "bad address"),
    (WSAEINVAL.0, "invalid argument"),
    (WSAENOTSOCK.0, "socket operation on nonsocket"),
    (WSAEDESTADDRREQ.0, "destination address required"),
    (WSAEMSGSIZE.0, "message too long"),
    (WSAEPROTOTYPE.0, "protocol wrong type for socket"),
    (WSAENOPROTOOPT.0, "bad protocol option"),
    (WSAEPFNOSUPPORT.0, "protocol family not supported"),
    (WSAEAFNOSUPPORT.0, "address family not supported by protocol family"),
    (WSAEADDRINUSE.0, "address already in use"),
    (WSAECONNRESET.0, "connection reset by peer"),
    (WSAHOST_NOT_FOUND.0, "authoritative answer host not found"),
    (WSATRY_AGAIN.0, "nonauthoritative host not found, or server failure"),
    (WSAEISCONN.0, "socket is already connected"),
    (WSAETIMEDOUT.0, "connection timed out"),
    (WSAECONNREFUSED.0, "connection refused"),
    (WSANO_DATA.0, "valid name, no data record of requested type"),
    (WSAEWOULDBLOCK.0, "resource temporarily unavailable"),
];

/// Look up the diagnostic text for a WSA error code.
pub(crate) fn error_text(code: i32) -> &'static str {
    MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, text)| *text)
        .unwrap_or("unrecognised Winsock error")
}

/// The WSA error left behind by the last failed socket call on this thread.
pub(crate) fn last_error() -> i32 {
    // SAFETY: WSAGetLastError reads thread-local state and cannot fail.
    unsafe { WSAGetLastError().0 }
}

/// The raw socket handle backing `socket`.
pub(crate) fn raw_handle(socket: &Socket) -> RawHandle {
    socket.as_raw_socket()
}

/// Set or clear non-blocking mode on the socket via `FIONBIO`.
pub(crate) fn set_non_blocking(socket: &Socket, enabled: bool) -> io::Result<()> {
    let handle = SOCKET(socket.as_raw_socket() as usize);
    let mut mode: u32 = if enabled { 1 } else { 0 };

    // SAFETY: `handle` is a socket owned by `socket`, which outlives the call.
    if unsafe { ioctlsocket(handle, FIONBIO as i32, &mut mode) } != 0 {
        return Err(io::Error::from_raw_os_error(last_error()));
    }
    Ok(())
}

/// Zero-timeout poll for writable and exceptional conditions.
///
/// A socket that is merely busy is not an error; only a failure of the poll
/// call itself is reported.
pub(crate) fn poll_write(socket: &Socket) -> io::Result<()> {
    let mut pollfd = WSAPOLLFD {
        fd: SOCKET(socket.as_raw_socket() as usize),
        events: POLLWRNORM as i16,
        revents: 0,
    };

    // SAFETY: `pollfd` is a valid stack allocation for exactly one entry.
    if unsafe { WSAPoll(&mut pollfd, 1, 0) } < 0 {
        return Err(io::Error::from_raw_os_error(last_error()));
    }
    Ok(())
}

/// Poll for readability, waiting up to `timeout`.
pub(crate) fn poll_read(socket: &Socket, timeout: Duration) -> bool {
    let mut pollfd = WSAPOLLFD {
        fd: SOCKET(socket.as_raw_socket() as usize),
        events: POLLRDNORM as i16,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    // SAFETY: `pollfd` is a valid stack allocation for exactly one entry.
    let ready = unsafe { WSAPoll(&mut pollfd, 1, timeout_ms) };
    ready > 0 && (pollfd.revents & POLLRDNORM as i16) != 0
}

/// Start Winsock and verify the negotiated version is the requested 2.2.
pub(crate) fn startup() -> io::Result<()> {
    let mut data = WSADATA::default();

    // SAFETY: `data` is a valid out-pointer for WSAStartup.
    let status = unsafe { WSAStartup(REQUESTED_VERSION, &mut data) };
    if status != 0 {
        return Err(io::Error::from_raw_os_error(status));
    }

    if data.wVersion != REQUESTED_VERSION {
        // SAFETY: startup above succeeded, so a matching cleanup is owed.
        unsafe { WSACleanup() };
        return Err(io::Error::other("Winsock 2.2 is not available"));
    }
    Ok(())
}

/// Tear Winsock back down. Called only when the last live handle closes.
pub(crate) fn cleanup() {
    // SAFETY: paired with a successful startup by the usage counter.
    unsafe { WSACleanup() };
}
