//! The blocking connection type used to talk to a backend server.

use std::io::{self, Read};
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::time::Duration;

use socket2::{SockAddr, Socket};

use super::config::SocketConfig;
use super::state::ConnectionState;
use crate::error::{Result, TransportError};
use crate::platform::{self, RawHandle, SubsystemGuard};

/// Buffer bound for [`Connection::receive_available`]. Callers needing more
/// use [`Connection::receive`] with their own buffer.
pub const MAX_RECV: usize = 1024;

/// Sleep between retries when a non-blocking read reports a transient
/// would-block condition. Bounds CPU spin without giving up the blocking
/// contract.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// How long [`Connection::read_ready`] waits for the socket to become
/// readable.
const READ_READY_WAIT: Duration = Duration::from_secs(1);

const ZERO_PEER: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);

fn invalid_handle() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket handle is not valid")
}

/// The OS handle slot. A connection's handle is either absent, open, or
/// poisoned; nothing else.
enum Handle {
    Closed,
    Open(Socket),
    Poisoned(Socket),
}

impl Handle {
    /// The socket, but only while it is usable for I/O.
    fn open(&self) -> Option<&Socket> {
        match self {
            Handle::Open(socket) => Some(socket),
            _ => None,
        }
    }

    /// The socket regardless of poisoning.
    fn any(&self) -> Option<&Socket> {
        match self {
            Handle::Open(socket) | Handle::Poisoned(socket) => Some(socket),
            Handle::Closed => None,
        }
    }

    fn state(&self) -> ConnectionState {
        match self {
            Handle::Closed => ConnectionState::Closed,
            Handle::Open(_) => ConnectionState::Active,
            Handle::Poisoned(_) => ConnectionState::Poisoned,
        }
    }
}

/// One blocking socket endpoint.
///
/// A `Connection` owns at most one OS socket handle plus the peer address
/// used by connect, bind and broadcast operations. All I/O is blocking from
/// the caller's perspective: transient would-block conditions are retried
/// internally and never surfaced.
///
/// A single `Connection` is not internally synchronized; use it from one
/// thread at a time. Independent connections each own a distinct handle and
/// may run concurrently. The only shared state is the platform subsystem
/// usage counter, which is lock-protected.
///
/// # Example
///
/// ```ignore
/// use telecast_net::{Connection, SocketConfig};
///
/// let mut conn = Connection::new(SocketConfig::new());
/// conn.create()?;
/// conn.connect("pvr.local", 8866)?;
/// conn.send(b"<request/>")?;
/// let header = conn.receive_exact(8)?;
/// ```
pub struct Connection {
    config: SocketConfig,
    handle: Handle,
    peer: SocketAddrV4,
    subsystem: Option<SubsystemGuard>,
}

impl Connection {
    /// Create an unconnected endpoint. No OS resources are touched until
    /// [`create`](Self::create) is called.
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            handle: Handle::Closed,
            peer: ZERO_PEER,
            subsystem: None,
        }
    }

    /// The configuration this endpoint was constructed with.
    pub fn config(&self) -> SocketConfig {
        self.config
    }

    /// Current state of the handle.
    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Whether the handle is open and usable for I/O. A poisoned handle is
    /// not valid.
    pub fn is_valid(&self) -> bool {
        matches!(self.handle, Handle::Open(_))
    }

    /// The peer address used by connect, bind and broadcast operations.
    pub fn peer_addr(&self) -> SocketAddrV4 {
        self.peer
    }

    /// The locally bound address, once the socket is bound or connected.
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.handle.open()?.local_addr().ok()?.as_socket_ipv4()
    }

    /// The raw OS handle, while one is held (open or poisoned).
    pub fn raw_handle(&self) -> Option<RawHandle> {
        self.handle.any().map(platform::raw_handle)
    }

    /// Allocate the OS socket handle for the configured
    /// family/type/protocol.
    ///
    /// Idempotent: an existing handle (open or poisoned) is closed first.
    /// On success the platform subsystem usage count is incremented; it is
    /// decremented again by [`close`](Self::close).
    pub fn create(&mut self) -> Result<()> {
        self.close();

        let subsystem = platform::acquire().map_err(|e| {
            platform::log_os_error("Connection::create", &e);
            TransportError::Allocation(e)
        })?;

        let socket = Socket::new(
            self.config.domain(),
            self.config.socket_type(),
            self.config.socket_protocol(),
        )
        .map_err(|e| {
            platform::log_os_error("Connection::create", &e);
            TransportError::Allocation(e)
        })?;

        self.handle = Handle::Open(socket);
        self.subsystem = Some(subsystem);
        Ok(())
    }

    /// Bind the wildcard address on `port`. Requires a valid handle.
    pub fn bind(&mut self, port: u16) -> Result<()> {
        let wildcard = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Bind {
                port,
                source: invalid_handle(),
            });
        };
        if let Err(e) = socket.bind(&SockAddr::from(wildcard)) {
            platform::log_os_error("Connection::bind", &e);
            return Err(TransportError::Bind { port, source: e });
        }
        self.peer = wildcard;
        Ok(())
    }

    /// Start listening with the OS's maximum backlog. Requires a valid,
    /// bound handle.
    pub fn listen(&self) -> Result<()> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Listen(invalid_handle()));
        };
        if let Err(e) = socket.listen(platform::MAX_BACKLOG) {
            platform::log_os_error("Connection::listen", &e);
            return Err(TransportError::Listen(e));
        }
        Ok(())
    }

    /// Block until a peer connects, returning a new `Connection` for it.
    ///
    /// The accepted connection shares this endpoint's configuration, owns
    /// its own handle and subsystem reference, and records the peer's
    /// address.
    pub fn accept(&self) -> Result<Connection> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Accept(invalid_handle()));
        };
        let (accepted, peer) = socket.accept().map_err(|e| {
            platform::log_os_error("Connection::accept", &e);
            TransportError::Accept(e)
        })?;
        let subsystem = platform::acquire().map_err(TransportError::Accept)?;

        Ok(Connection {
            config: self.config,
            handle: Handle::Open(accepted),
            peer: peer.as_socket_ipv4().unwrap_or(ZERO_PEER),
            subsystem: Some(subsystem),
        })
    }

    /// Store `host` as the peer address, resolving symbolic names.
    ///
    /// Dispatch is on the first character: if it is alphabetic the host is
    /// resolved through the OS resolver and the first IPv4 record is taken;
    /// otherwise the string is parsed as a dotted numeric address. The
    /// numeric branch performs no validation: a malformed numeric string
    /// silently stores the unspecified address rather than failing. The
    /// peer address is left unchanged when resolution fails.
    pub fn set_hostname(&mut self, host: &str) -> Result<()> {
        let symbolic = host
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic());
        let address = if symbolic {
            resolve_ipv4(host)?
        } else {
            host.parse().unwrap_or(Ipv4Addr::UNSPECIFIED)
        };
        self.peer.set_ip(address);
        Ok(())
    }

    /// Resolve `host` and connect to it on `port`. Requires a valid handle.
    ///
    /// The resolved peer address is kept for a later
    /// [`reconnect`](Self::reconnect). Blocks until the OS connect resolves
    /// or times out; no application-level timeout is applied.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.handle.open().is_none() {
            return Err(TransportError::Connect {
                addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port),
                source: invalid_handle(),
            });
        }
        self.peer.set_port(port);
        self.set_hostname(host)?;

        let addr = self.peer;
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Connect {
                addr,
                source: invalid_handle(),
            });
        };
        if let Err(e) = socket.connect(&SockAddr::from(addr)) {
            platform::log_os_error("Connection::connect", &e);
            return Err(TransportError::Connect { addr, source: e });
        }
        Ok(())
    }

    /// Re-establish a dropped connection to the previously configured peer.
    ///
    /// A no-op returning success while the handle is valid. From the closed
    /// or poisoned state the handle is re-created and connected to the
    /// stored peer address; the hostname is *not* re-resolved.
    pub fn reconnect(&mut self) -> Result<()> {
        if self.is_valid() {
            return Ok(());
        }

        self.create()
            .map_err(|e| TransportError::Reconnect(Box::new(e)))?;

        let addr = self.peer;
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Reconnect(Box::new(
                TransportError::Connect {
                    addr,
                    source: invalid_handle(),
                },
            )));
        };
        if let Err(e) = socket.connect(&SockAddr::from(addr)) {
            platform::log_os_error("Connection::reconnect", &e);
            return Err(TransportError::Reconnect(Box::new(
                TransportError::Connect { addr, source: e },
            )));
        }
        Ok(())
    }

    /// Release the OS handle and the subsystem reference.
    ///
    /// Idempotent; a no-op when already closed. Closing the last live
    /// connection tears the platform subsystem back down.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.handle, Handle::Closed) {
            Handle::Closed => {}
            Handle::Open(socket) | Handle::Poisoned(socket) => {
                drop(socket);
                self.subsystem = None;
            }
        }
    }

    /// Mark the handle unusable after a fatal send-path failure without
    /// releasing OS resources. Only `close` or `reconnect` leave this state.
    fn poison(&mut self) {
        self.handle = match std::mem::replace(&mut self.handle, Handle::Closed) {
            Handle::Open(socket) | Handle::Poisoned(socket) => Handle::Poisoned(socket),
            Handle::Closed => Handle::Closed,
        };
    }

    /// Send `data`, blocking until the kernel accepts it.
    ///
    /// A zero-timeout readiness poll for writable and exceptional
    /// conditions runs first, so a socket that has already entered an error
    /// state (peer reset) fails fast instead of committing to a write; a
    /// busy socket simply proceeds to the blocking send. Transient
    /// would-block results are retried indefinitely.
    ///
    /// Returns the number of bytes the kernel accepted, which may be less
    /// than `data.len()`. Any fatal failure, including a failure of the
    /// readiness poll, poisons the handle; the caller must
    /// [`reconnect`](Self::reconnect) before further I/O.
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        let outcome = match self.handle.open() {
            None => return Err(TransportError::Io(invalid_handle())),
            Some(socket) => match platform::poll_write(socket) {
                Err(e) => Err(e),
                Ok(()) => loop {
                    match socket.send_with_flags(data, platform::SEND_FLAGS) {
                        Ok(written) => break Ok(written),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => break Err(e),
                    }
                },
            },
        };

        match outcome {
            Ok(written) => Ok(written),
            Err(e) => {
                platform::log_os_error("Connection::send", &e);
                self.poison();
                Err(TransportError::Io(e))
            }
        }
    }

    /// Receive into `buffer`, accumulating until at least `minimum` bytes
    /// arrive or the buffer is full, whichever comes first.
    ///
    /// With `minimum == 0` this returns as soon as any read completes. When
    /// `minimum` exceeds the buffer length, the buffer length is the hard
    /// backstop. Transient would-block conditions sleep 50 ms and retry; a
    /// read of zero bytes (peer shutdown) ends accumulation early; callers
    /// treat a short or zero count as connection failure.
    pub fn receive(&self, buffer: &mut [u8], minimum: usize) -> Result<usize> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Io(invalid_handle()));
        };
        let capacity = buffer.len();
        let mut stream = socket;
        let mut received = 0usize;

        while received < capacity {
            match stream.read(&mut buffer[received..]) {
                Ok(0) => break,
                Ok(count) => {
                    received += count;
                    if received >= minimum {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    platform::log_os_error("Connection::receive", &e);
                    return Err(TransportError::Io(e));
                }
            }
        }
        Ok(received)
    }

    /// Receive whatever is available, up to [`MAX_RECV`] bytes.
    pub fn receive_available(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; MAX_RECV];
        let received = self.receive(&mut buffer, 0)?;
        buffer.truncate(received);
        Ok(buffer)
    }

    /// Receive exactly `len` bytes, for fixed-length protocol headers where
    /// a short read is meaningless. Returns fewer only if the peer shuts
    /// down mid-read.
    pub fn receive_exact(&self, len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; len];
        let received = self.receive(&mut buffer, len)?;
        buffer.truncate(received);
        Ok(buffer)
    }

    /// Send `payload` to the limited broadcast address on `port`.
    ///
    /// Sets the peer address to `255.255.255.255:port`, then performs a
    /// connectionless send. Used to discover backend servers on the local
    /// network; the socket must have broadcast enabled via
    /// [`set_broadcast`](Self::set_broadcast).
    pub fn broadcast_send_to(&mut self, port: u16, payload: &[u8]) -> Result<usize> {
        self.peer = SocketAddrV4::new(Ipv4Addr::BROADCAST, port);
        self.send_to_peer(payload)
    }

    /// Connectionless receive. The sender's address is recorded as the peer
    /// address and returned alongside the byte count.
    pub fn broadcast_receive_from(&mut self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let outcome = {
            let Some(socket) = self.handle.open() else {
                return Err(TransportError::Io(invalid_handle()));
            };
            let mut scratch = vec![MaybeUninit::<u8>::uninit(); buffer.len()];
            socket.recv_from(&mut scratch).map(|(count, sender)| {
                for (dst, src) in buffer.iter_mut().zip(&scratch[..count]) {
                    // SAFETY: recv_from initialised the first `count` bytes.
                    *dst = unsafe { src.assume_init() };
                }
                (count, sender)
            })
        };

        match outcome {
            Ok((count, sender)) => {
                if let Some(v4) = sender.as_socket_ipv4() {
                    self.peer = v4;
                }
                let sender = sender.as_socket().unwrap_or(SocketAddr::V4(self.peer));
                Ok((count, sender))
            }
            Err(e) => {
                platform::log_os_error("Connection::recvfrom", &e);
                Err(TransportError::Io(e))
            }
        }
    }

    /// Connectionless send of the whole payload to the stored peer address.
    ///
    /// Loops until every byte is handed to the kernel; an iteration that
    /// makes no progress is an error, so the loop cannot spin without
    /// transferring data. After [`broadcast_receive_from`] this targets the
    /// captured sender, which is how a discovery probe is answered.
    ///
    /// [`broadcast_receive_from`]: Self::broadcast_receive_from
    pub fn send_to_peer(&self, payload: &[u8]) -> Result<usize> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::Io(invalid_handle()));
        };
        let target = SockAddr::from(self.peer);
        let mut sent = 0usize;

        while sent < payload.len() {
            match socket.send_to_with_flags(&payload[sent..], &target, platform::SEND_FLAGS) {
                Ok(0) => {
                    let e =
                        io::Error::new(io::ErrorKind::WriteZero, "datagram send made no progress");
                    tracing::error!(target: "telecast_net::socket", "Connection::sendto: {e}");
                    return Err(TransportError::Io(e));
                }
                Ok(count) => sent += count,
                Err(e) => {
                    platform::log_os_error("Connection::sendto", &e);
                    return Err(TransportError::Io(e));
                }
            }
        }
        Ok(sent)
    }

    /// Switch the handle between blocking and non-blocking mode.
    pub fn set_non_blocking(&mut self, enabled: bool) -> Result<()> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::SocketOption(invalid_handle()));
        };
        platform::set_non_blocking(socket, enabled).map_err(|e| {
            platform::log_os_error("Connection::set_non_blocking", &e);
            TransportError::SocketOption(e)
        })
    }

    /// Allow sending to the broadcast address.
    pub fn set_broadcast(&mut self, enabled: bool) -> Result<()> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::SocketOption(invalid_handle()));
        };
        socket.set_broadcast(enabled).map_err(|e| {
            platform::log_os_error("Connection::set_broadcast", &e);
            TransportError::SocketOption(e)
        })
    }

    /// Allow rebinding a recently used local address.
    pub fn set_reuse_address(&mut self, enabled: bool) -> Result<()> {
        let Some(socket) = self.handle.open() else {
            return Err(TransportError::SocketOption(invalid_handle()));
        };
        socket.set_reuse_address(enabled).map_err(|e| {
            platform::log_os_error("Connection::set_reuse_address", &e);
            TransportError::SocketOption(e)
        })
    }

    /// Whether a read would complete without blocking, waiting up to one
    /// second for data to arrive. Request layers use this to test for a
    /// pending reply without committing to a read.
    pub fn read_ready(&self) -> bool {
        match self.handle.open() {
            Some(socket) => platform::poll_read(socket, READ_READY_WAIT),
            None => false,
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("peer", &self.peer)
            .field("local", &self.local_addr())
            .finish()
    }
}

/// Resolve a symbolic hostname to its first IPv4 record.
fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    let records = (host, 0u16).to_socket_addrs().map_err(|e| {
        tracing::error!(
            target: "telecast_net::socket",
            "Connection::set_hostname: {host:?}: {e}"
        );
        TransportError::HostResolution {
            host: host.to_owned(),
            source: e,
        }
    })?;

    for record in records {
        if let SocketAddr::V4(v4) = record {
            return Ok(*v4.ip());
        }
    }

    tracing::error!(
        target: "telecast_net::socket",
        "Connection::set_hostname: no IPv4 record for {host:?}"
    );
    Err(TransportError::HostResolution {
        host: host.to_owned(),
        source: io::Error::new(io::ErrorKind::NotFound, "no IPv4 address record"),
    })
}
