//! Network transport for the Telecast PVR backend client.
//!
//! This crate provides the socket layer the backend protocol client is
//! built on:
//!
//! - **Connection lifecycle**: create, bind, listen, accept, connect and
//!   reconnect over a single owned OS handle
//! - **Blocking transfer**: send with a fail-fast readiness check, receive
//!   with minimum-packet-size accumulation and cooperative retry backoff
//! - **Broadcast discovery**: connectionless send/receive used to find
//!   backend servers on the local network
//! - **Platform abstraction**: one capability set (non-blocking toggle,
//!   error retrieval and formatting, subsystem startup/cleanup) with Unix
//!   and Winsock backends selected at build time
//!
//! # Example
//!
//! ```ignore
//! use telecast_net::{Connection, SocketConfig};
//!
//! let mut conn = Connection::new(SocketConfig::new());
//! conn.create()?;
//! conn.connect("pvr.local", 8866)?;
//! conn.send(b"<request method=\"session.initiate\"/>")?;
//! let reply = conn.receive_available()?;
//! ```
//!
//! # Logging
//!
//! Failures are reported through `tracing`; the crate never installs a
//! subscriber. Embedding applications that want the diagnostics install
//! their own:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```

pub mod error;
pub mod platform;
pub mod socket;

pub use error::{Result, TransportError};
pub use platform::subsystem_users;
pub use socket::{
    Connection, ConnectionState, MAX_RECV, SocketConfig, SocketDomain, SocketFamily, SocketKind,
    SocketProtocol,
};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Connection lifecycle and transfer target.
    pub const SOCKET: &str = "telecast_net::socket";
    /// Platform backend target (OS error diagnostics).
    pub const PLATFORM: &str = "telecast_net::platform";
}
