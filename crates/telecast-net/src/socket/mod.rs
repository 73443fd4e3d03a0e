//! Blocking socket endpoint for backend communication.
//!
//! This module provides the transport primitives the protocol layer is
//! built on:
//! - **Connection**: lifecycle (create/bind/listen/accept/connect/
//!   reconnect/close), blocking send/receive with transient-condition
//!   retries, and connectionless broadcast for server discovery
//! - **SocketConfig**: family/type/protocol selection fixed at construction
//! - **ConnectionState**: the Closed/Active/Poisoned handle state machine
//!
//! # Client Example
//!
//! ```ignore
//! use telecast_net::{Connection, SocketConfig};
//!
//! let mut conn = Connection::new(SocketConfig::new());
//! conn.create()?;
//! conn.connect("192.168.1.20", 8866)?;
//!
//! conn.send(request_bytes)?;
//! let reply = conn.receive_exact(reply_len)?;
//! ```
//!
//! # Discovery Example
//!
//! ```ignore
//! use telecast_net::{Connection, SocketConfig};
//!
//! let mut probe = Connection::new(SocketConfig::udp());
//! probe.create()?;
//! probe.set_broadcast(true)?;
//! probe.broadcast_send_to(8866, b"discover")?;
//!
//! let mut reply = [0u8; 512];
//! let (len, server) = probe.broadcast_receive_from(&mut reply)?;
//! ```

mod config;
mod connection;
mod state;

pub use config::{SocketConfig, SocketDomain, SocketFamily, SocketKind, SocketProtocol};
pub use connection::{Connection, MAX_RECV};
pub use state::ConnectionState;
