//! Tests for connectionless discovery traffic.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use telecast_net::{Connection, SocketConfig};

#[test]
fn test_receive_from_records_sender_address() {
    let mut listener = Connection::new(SocketConfig::udp());
    listener.create().unwrap();
    listener.bind(0).unwrap();
    let port = listener.local_addr().unwrap().port();

    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    sender
        .send_to(b"server-announce", ("127.0.0.1", port))
        .unwrap();
    let sender_addr = SocketAddrV4::new(
        Ipv4Addr::LOCALHOST,
        sender.local_addr().unwrap().port(),
    );

    let mut buf = [0u8; 64];
    let (len, from) = listener.broadcast_receive_from(&mut buf).unwrap();

    assert_eq!(&buf[..len], b"server-announce");
    assert_eq!(from, SocketAddr::V4(sender_addr));
    assert_eq!(listener.peer_addr(), sender_addr);
}

#[test]
fn test_reply_goes_to_captured_sender() {
    let mut listener = Connection::new(SocketConfig::udp());
    listener.create().unwrap();
    listener.bind(0).unwrap();
    let port = listener.local_addr().unwrap().port();

    let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
    probe.send_to(b"discover", ("127.0.0.1", port)).unwrap();

    let mut buf = [0u8; 16];
    let (len, _) = listener.broadcast_receive_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"discover");

    // The captured sender address is now the peer; answer the probe.
    assert_eq!(listener.send_to_peer(b"here").unwrap(), 4);

    let mut reply = [0u8; 16];
    let (len, from) = probe.recv_from(&mut reply).unwrap();
    assert_eq!(&reply[..len], b"here");
    assert_eq!(from.port(), port);
}

#[test]
fn test_broadcast_send_targets_limited_broadcast() {
    let mut probe = Connection::new(SocketConfig::udp());
    probe.create().unwrap();
    probe.set_broadcast(true).unwrap();

    // Delivery needs a routable broadcast interface, which test machines
    // may lack; only the addressing contract is asserted.
    let _ = probe.broadcast_send_to(8866, b"discover");

    assert_eq!(
        probe.peer_addr(),
        SocketAddrV4::new(Ipv4Addr::BROADCAST, 8866)
    );
}

#[test]
fn test_datagram_round_trip_between_connections() {
    let mut receiver = Connection::new(SocketConfig::udp());
    receiver.create().unwrap();
    receiver.bind(0).unwrap();
    let port = receiver.local_addr().unwrap().port();

    let mut sender = Connection::new(SocketConfig::udp());
    sender.create().unwrap();
    sender.connect("127.0.0.1", port).unwrap();
    assert_eq!(sender.send(b"ping").unwrap(), 4);

    let mut buf = [0u8; 16];
    let received = receiver.receive(&mut buf, 0).unwrap();
    assert_eq!(&buf[..received], b"ping");
}
