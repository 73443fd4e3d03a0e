//! Configuration types for connections.

use socket2::{Domain, Protocol, Type};

/// Address family of a connection. The backend protocol is IPv4-only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketFamily {
    /// IPv4 internet addresses.
    #[default]
    Inet,
}

/// Protocol family (domain) of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketDomain {
    /// IPv4 internet protocols.
    #[default]
    Inet,
}

/// Communication style of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketKind {
    /// Sequenced, reliable byte stream.
    #[default]
    Stream,
    /// Connectionless, unreliable datagrams.
    Datagram,
}

/// Transport protocol of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketProtocol {
    /// Transmission Control Protocol.
    #[default]
    Tcp,
    /// User Datagram Protocol.
    Udp,
}

/// Configuration fixed at construction for a [`Connection`].
///
/// Defaults to an IPv4 TCP stream socket, the configuration every backend
/// request connection uses; discovery sockets use [`SocketConfig::udp`].
///
/// [`Connection`]: crate::socket::Connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketConfig {
    /// Address family.
    pub family: SocketFamily,
    /// Protocol family.
    pub domain: SocketDomain,
    /// Communication style.
    pub kind: SocketKind,
    /// Transport protocol.
    pub protocol: SocketProtocol,
}

impl SocketConfig {
    /// Create a configuration with default settings (IPv4 TCP stream).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration for an IPv4 UDP datagram socket.
    pub fn udp() -> Self {
        Self::new()
            .kind(SocketKind::Datagram)
            .protocol(SocketProtocol::Udp)
    }

    /// Set the communication style.
    pub fn kind(mut self, kind: SocketKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the transport protocol.
    pub fn protocol(mut self, protocol: SocketProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub(crate) fn domain(&self) -> Domain {
        match self.domain {
            SocketDomain::Inet => Domain::IPV4,
        }
    }

    pub(crate) fn socket_type(&self) -> Type {
        match self.kind {
            SocketKind::Stream => Type::STREAM,
            SocketKind::Datagram => Type::DGRAM,
        }
    }

    pub(crate) fn socket_protocol(&self) -> Option<Protocol> {
        match self.protocol {
            SocketProtocol::Tcp => Some(Protocol::TCP),
            SocketProtocol::Udp => Some(Protocol::UDP),
        }
    }
}
