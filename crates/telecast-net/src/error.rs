//! Error types for the transport crate.

use std::io;
use std::net::SocketAddrV4;

use thiserror::Error;

/// Errors reported by [`Connection`](crate::socket::Connection) operations.
///
/// Transient would-block conditions are never surfaced here; the transfer
/// loops retry them internally. Everything else is returned synchronously to
/// the caller, which owns recovery (usually via
/// [`reconnect`](crate::socket::Connection::reconnect)).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The OS could not allocate a socket of the configured
    /// family/type/protocol, or socket-subsystem startup failed.
    #[error("failed to allocate socket: {0}")]
    Allocation(#[source] io::Error),

    /// Binding the wildcard address to the requested port failed.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// The port that could not be bound.
        port: u16,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The OS refused to put the socket into the listening state.
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    /// Accepting an incoming connection failed.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// A symbolic hostname could not be resolved to an IPv4 address.
    #[error("failed to resolve host {host:?}: {source}")]
    HostResolution {
        /// The hostname that failed to resolve.
        host: String,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The OS connect call failed (refused, unreachable, or timed out).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// The peer address the connect call targeted.
        addr: SocketAddrV4,
        /// The underlying OS error.
        source: io::Error,
    },

    /// Re-establishing a dropped connection failed.
    #[error("reconnect failed: {0}")]
    Reconnect(#[source] Box<TransportError>),

    /// Changing a socket option (non-blocking mode, broadcast, reuse) failed.
    #[error("failed to change socket option: {0}")]
    SocketOption(#[source] io::Error),

    /// A fatal (non-transient) error during data transfer.
    #[error("socket I/O failed: {0}")]
    Io(#[source] io::Error),
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
