//! Tests for connection lifecycle and blocking transfer.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use telecast_net::{
    Connection, ConnectionState, SocketConfig, SocketKind, SocketProtocol, TransportError,
};

#[test]
fn test_socket_config_defaults() {
    let config = SocketConfig::new();

    assert_eq!(config.kind, SocketKind::Stream);
    assert_eq!(config.protocol, SocketProtocol::Tcp);
}

#[test]
fn test_socket_config_builder() {
    let config = SocketConfig::new()
        .kind(SocketKind::Datagram)
        .protocol(SocketProtocol::Udp);

    assert_eq!(config, SocketConfig::udp());
    assert_eq!(config.kind, SocketKind::Datagram);
    assert_eq!(config.protocol, SocketProtocol::Udp);
}

#[test]
fn test_connection_initial_state() {
    let conn = Connection::default();

    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(!conn.is_valid());
    assert_eq!(conn.peer_addr().ip(), &Ipv4Addr::UNSPECIFIED);
    assert_eq!(conn.peer_addr().port(), 0);
    assert!(conn.local_addr().is_none());
    assert!(conn.raw_handle().is_none());
}

#[test]
fn test_connection_state_display() {
    assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    assert_eq!(ConnectionState::Active.to_string(), "Active");
    assert_eq!(ConnectionState::Poisoned.to_string(), "Poisoned");
}

#[test]
fn test_error_display_names_port() {
    let mut conn = Connection::default();
    let err = conn.bind(8866).unwrap_err();

    assert!(matches!(err, TransportError::Bind { port: 8866, .. }));
    assert!(err.to_string().contains("8866"));
}

#[test]
fn test_operations_require_valid_handle() {
    let mut conn = Connection::default();
    let mut buf = [0u8; 4];

    assert!(matches!(conn.bind(0), Err(TransportError::Bind { .. })));
    assert!(matches!(conn.listen(), Err(TransportError::Listen(_))));
    assert!(matches!(conn.accept(), Err(TransportError::Accept(_))));
    assert!(matches!(
        conn.connect("127.0.0.1", 1),
        Err(TransportError::Connect { .. })
    ));
    assert!(matches!(conn.send(b"x"), Err(TransportError::Io(_))));
    assert!(matches!(conn.receive(&mut buf, 0), Err(TransportError::Io(_))));
    assert!(matches!(
        conn.set_non_blocking(true),
        Err(TransportError::SocketOption(_))
    ));
    assert!(!conn.read_ready());
}

#[test]
fn test_close_is_idempotent() {
    let mut conn = Connection::default();
    conn.create().unwrap();

    conn.close();
    assert_eq!(conn.state(), ConnectionState::Closed);
    conn.close();
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[test]
fn test_set_hostname_numeric_matches_symbolic() {
    let mut symbolic = Connection::default();
    let mut numeric = Connection::default();

    symbolic.set_hostname("localhost").unwrap();
    numeric.set_hostname("127.0.0.1").unwrap();

    assert_eq!(symbolic.peer_addr().ip(), numeric.peer_addr().ip());
}

#[test]
fn test_set_hostname_failure_keeps_prior_address() {
    let mut conn = Connection::default();
    conn.set_hostname("127.0.0.1").unwrap();

    let err = conn.set_hostname("does-not-resolve.invalid").unwrap_err();
    assert!(matches!(err, TransportError::HostResolution { .. }));
    assert_eq!(conn.peer_addr().ip(), &Ipv4Addr::new(127, 0, 0, 1));
}

#[test]
fn test_set_hostname_malformed_numeric_is_unspecified() {
    // The numeric branch performs no validation; garbage parses to the
    // unspecified address instead of failing.
    let mut conn = Connection::default();
    conn.set_hostname("999.999.999.999").unwrap();

    assert_eq!(conn.peer_addr().ip(), &Ipv4Addr::UNSPECIFIED);
}

#[test]
fn test_send_receive_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => stream.write_all(&buf[..n]).unwrap(),
            }
        }
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();
    assert_eq!(conn.state(), ConnectionState::Active);
    assert_eq!(conn.peer_addr().port(), port);

    let payload = b"telecast round trip payload";
    assert_eq!(conn.send(payload).unwrap(), payload.len());

    let echoed = conn.receive_exact(payload.len()).unwrap();
    assert_eq!(echoed, payload);

    conn.close();
    server.join().unwrap();
}

#[test]
fn test_receive_without_minimum_returns_available() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"abc").unwrap();
        // Hold the connection open until the client is done.
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();

    let mut buf = [0u8; 16];
    let received = conn.receive(&mut buf, 0).unwrap();
    assert_eq!(&buf[..received], b"abc");
    assert!(received < buf.len(), "must not wait for capacity");

    conn.close();
    server.join().unwrap();
}

#[test]
fn test_receive_minimum_capped_by_capacity() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"eightbyt").unwrap();
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();

    // Minimum exceeds the buffer; capacity is the hard backstop.
    let mut buf = [0u8; 4];
    let received = conn.receive(&mut buf, 8).unwrap();
    assert_eq!(received, 4);
    assert_eq!(&buf, b"eigh");

    conn.close();
    server.join().unwrap();
}

#[test]
fn test_receive_retries_transient_conditions() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        // Let the client hit the would-block path before data arrives.
        thread::sleep(Duration::from_millis(150));
        stream.write_all(b"hello").unwrap();
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();
    conn.set_non_blocking(true).unwrap();

    let mut buf = [0u8; 5];
    let received = conn.receive(&mut buf, 5).unwrap();
    assert_eq!(&buf[..received], b"hello");

    conn.close();
    server.join().unwrap();
}

#[test]
fn test_reconnect_on_valid_handle_is_noop() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let mut streams = Vec::new();
        for _ in 0..2 {
            let (stream, _) = listener.accept().unwrap();
            streams.push(stream);
        }
        streams
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();

    let handle = conn.raw_handle().unwrap();
    conn.reconnect().unwrap();
    assert_eq!(conn.raw_handle().unwrap(), handle, "handle must be reused");
    assert_eq!(conn.state(), ConnectionState::Active);

    // From the closed state, reconnect rebuilds the handle and reuses the
    // stored peer address.
    conn.close();
    assert!(!conn.is_valid());
    conn.reconnect().unwrap();
    assert!(conn.is_valid());

    conn.close();
    server.join().unwrap();
}

#[test]
fn test_send_failure_poisons_until_recovery() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let server = thread::spawn(move || {
        // First connection is dropped immediately so client writes draw a
        // reset; the second backs the recovery.
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
        let (stream, _) = listener.accept().unwrap();
        let _ = done_rx.recv();
        drop(stream);
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();

    let mut poisoned = false;
    for _ in 0..50 {
        if conn.send(&[0u8; 1024]).is_err() {
            poisoned = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(poisoned, "send against a reset peer must eventually fail");
    assert_eq!(conn.state(), ConnectionState::Poisoned);
    assert!(!conn.is_valid());
    assert!(conn.raw_handle().is_some(), "resources are not yet released");

    // Poisoned handles refuse further I/O without touching the OS.
    assert!(matches!(conn.send(b"x"), Err(TransportError::Io(_))));

    conn.reconnect().unwrap();
    assert_eq!(conn.state(), ConnectionState::Active);

    done_tx.send(()).unwrap();
    conn.close();
    server.join().unwrap();
}

#[test]
fn test_accept_populates_new_connection() {
    let mut server = Connection::new(SocketConfig::new());
    server.create().unwrap();
    server.set_reuse_address(true).unwrap();
    server.bind(0).unwrap();
    server.listen().unwrap();
    let port = server.local_addr().unwrap().port();

    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        stream.write_all(b"hi from client").unwrap();
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
        stream.local_addr().unwrap()
    });

    let accepted = server.accept().unwrap();
    assert!(accepted.is_valid());
    assert_ne!(accepted.raw_handle(), server.raw_handle());

    let data = accepted.receive_exact(14).unwrap();
    assert_eq!(data, b"hi from client");

    drop(accepted);
    let client_addr = client.join().unwrap();
    assert_eq!(client_addr.ip().to_string(), "127.0.0.1");
}

#[test]
fn test_accept_records_peer_address() {
    let mut server = Connection::new(SocketConfig::new());
    server.create().unwrap();
    server.bind(0).unwrap();
    server.listen().unwrap();
    let port = server.local_addr().unwrap().port();

    let client = thread::spawn(move || {
        let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let local = stream.local_addr().unwrap();
        // Keep the socket open until the server has captured the address.
        thread::sleep(Duration::from_millis(100));
        local
    });

    let accepted = server.accept().unwrap();
    let client_addr = client.join().unwrap();
    assert_eq!(accepted.peer_addr().port(), client_addr.port());
}

#[test]
fn test_read_ready_reflects_pending_data() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let (write_tx, write_rx) = mpsc::channel::<()>();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        write_rx.recv().unwrap();
        stream.write_all(b"x").unwrap();
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    });

    let mut conn = Connection::new(SocketConfig::new());
    conn.create().unwrap();
    conn.connect("127.0.0.1", port).unwrap();

    assert!(!conn.read_ready(), "nothing has been written yet");

    write_tx.send(()).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(conn.read_ready());

    conn.close();
    server.join().unwrap();
}
