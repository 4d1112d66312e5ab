use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use realm::{
    Channel, ConnectionManager, Frame, FrameFlags, GameSettings, MemoryDb, NetworkEndpoint,
    PeerChannel, ServerPacketId, Socket, TransportError, World,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn endpoints() -> (NetworkEndpoint, NetworkEndpoint, SocketAddr, SocketAddr) {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();
    (
        NetworkEndpoint::bind(server_addr).unwrap(),
        NetworkEndpoint::bind(client_addr).unwrap(),
        server_addr,
        client_addr,
    )
}

fn wait_for_frames(endpoint: &mut NetworkEndpoint, timeout_ms: u64) -> Option<Vec<(Frame, SocketAddr)>> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        let received = endpoint.receive().unwrap();
        if !received.is_empty() {
            return Some(received);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn test_connect_accept_handshake() {
    let (mut server, mut client, server_addr, client_addr) = endpoints();
    let mut connections = ConnectionManager::new(8);

    client
        .send_frame(&Frame::control(FrameFlags::CONNECT), server_addr)
        .unwrap();

    let received = wait_for_frames(&mut server, 200).expect("no connect received");
    let (frame, from) = &received[0];
    assert!(frame.header.flags.contains(FrameFlags::CONNECT));
    assert_eq!(*from, client_addr);

    let client_id = connections.accept(*from, Instant::now()).unwrap().client_id;
    let mut accept = Frame::control(FrameFlags::ACCEPT);
    accept.payload = client_id.to_be_bytes().to_vec();
    server.send_frame(&accept, *from).unwrap();

    let received = wait_for_frames(&mut client, 200).expect("no accept received");
    let (frame, _) = &received[0];
    assert!(frame.header.flags.contains(FrameFlags::ACCEPT));
    assert_eq!(frame.payload, client_id.to_be_bytes().to_vec());
    assert_eq!(connections.total_count(), 1);

    // A repeated connect maps to the same client.
    let again = connections.accept(client_addr, Instant::now()).unwrap().client_id;
    assert_eq!(again, client_id);
}

#[test]
fn test_reliable_payloads_arrive_in_order_and_are_acked() {
    let (mut server, mut client, server_addr, client_addr) = endpoints();
    let now = Instant::now();
    let mut server_side = PeerChannel::new(Duration::from_millis(200));
    let mut client_side = PeerChannel::new(Duration::from_millis(200));

    for n in 0..5u8 {
        let bytes = server_side.reliable(vec![n, n], now).unwrap();
        server.send_to(&bytes, client_addr).unwrap();
    }
    assert_eq!(server_side.unacked_count(), 5);

    let mut delivered = Vec::new();
    let start = Instant::now();
    while delivered.len() < 5 && start.elapsed() < Duration::from_millis(500) {
        for (frame, _) in client.receive().unwrap() {
            delivered.extend(client_side.receive(frame, Instant::now()));
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(
        delivered,
        (0..5u8).map(|n| vec![n, n]).collect::<Vec<_>>()
    );

    let ack = client_side.ack_frame(Instant::now()).expect("ack owed");
    client.send_to(&ack, server_addr).unwrap();
    let received = wait_for_frames(&mut server, 200).expect("no ack received");
    for (frame, _) in received {
        assert!(server_side.receive(frame, Instant::now()).is_empty());
    }
    assert_eq!(server_side.unacked_count(), 0);
}

#[test]
fn test_lost_reliable_frame_is_resent() {
    let (mut server, mut client, _server_addr, client_addr) = endpoints();
    let now = Instant::now();
    let mut server_side = PeerChannel::new(Duration::ZERO);
    let mut client_side = PeerChannel::new(Duration::ZERO);

    // The first frame never leaves the server.
    let _lost = server_side.reliable(vec![1], now).unwrap();
    let second = server_side.reliable(vec![2], now).unwrap();
    server.send_to(&second, client_addr).unwrap();

    let received = wait_for_frames(&mut client, 200).expect("second frame missing");
    for (frame, _) in received {
        assert!(client_side.receive(frame, Instant::now()).is_empty());
    }

    for bytes in server_side.resend_due(Instant::now()) {
        server.send_to(&bytes, client_addr).unwrap();
    }

    let mut delivered = Vec::new();
    let start = Instant::now();
    while delivered.len() < 2 && start.elapsed() < Duration::from_millis(500) {
        for (frame, _) in client.receive().unwrap() {
            delivered.extend(client_side.receive(frame, Instant::now()));
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(delivered, vec![vec![1], vec![2]]);
}

#[test]
fn test_unreliable_frames_are_not_tracked() {
    let (mut server, mut client, _server_addr, client_addr) = endpoints();
    let mut server_side = PeerChannel::new(Duration::from_millis(200));
    let mut client_side = PeerChannel::new(Duration::from_millis(200));

    let bytes = server_side.unreliable(&[9, 9, 9], Instant::now()).unwrap();
    server.send_to(&bytes, client_addr).unwrap();
    assert_eq!(server_side.unacked_count(), 0);

    let received = wait_for_frames(&mut client, 200).expect("no frame received");
    let (frame, _) = received.into_iter().next().unwrap();
    assert_eq!(client_side.receive(frame, Instant::now()), vec![vec![9, 9, 9]]);
}

#[test]
fn test_garbage_datagrams_are_rejected() {
    let (mut server, _client, server_addr, _client_addr) = endpoints();
    let raw = UdpSocket::bind("127.0.0.1:0").unwrap();
    raw.send_to(b"not a frame", server_addr).unwrap();

    let start = Instant::now();
    while server.stats().frames_rejected == 0 && start.elapsed() < Duration::from_millis(200) {
        assert!(server.receive().unwrap().is_empty());
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(server.stats().frames_rejected, 1);
    assert_eq!(server.stats().frames_received, 0);
}

#[test]
fn test_server_full_and_timeouts() {
    let first: SocketAddr = "127.0.0.1:50001".parse().unwrap();
    let second: SocketAddr = "127.0.0.1:50002".parse().unwrap();
    let start = Instant::now();
    let mut connections =
        ConnectionManager::with_timeouts(1, Duration::from_millis(50), Duration::from_millis(10));

    connections.accept(first, start).unwrap();
    assert!(matches!(
        connections.accept(second, start),
        Err(TransportError::ServerFull)
    ));

    let dropped = connections.cleanup_timed_out(start + Duration::from_millis(100));
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].addr, first);
    assert!(connections.accept(second, start).is_ok());
}

#[test]
fn test_login_reply_travels_over_udp() {
    let (mut server, mut client, _server_addr, client_addr) = endpoints();
    let mut connections = ConnectionManager::new(4);
    let mut world = World::new(GameSettings::default(), Arc::new(MemoryDb::demo()));
    let mut client_side = PeerChannel::new(Duration::from_millis(200));

    let conn = connections.accept(client_addr, Instant::now()).unwrap();
    let socket: Arc<dyn Socket> = conn.socket.clone();
    world.login("Alice", socket).unwrap();

    let now = Instant::now();
    for packet in conn.socket.take_outbound() {
        assert_eq!(packet.channel, Channel::Reliable);
        let bytes = conn.channel.reliable(packet.data, now).unwrap();
        server.send_to(&bytes, client_addr).unwrap();
    }

    let mut delivered = Vec::new();
    let start = Instant::now();
    while delivered.is_empty() && start.elapsed() < Duration::from_millis(500) {
        for (frame, _) in client.receive().unwrap() {
            delivered.extend(client_side.receive(frame, Instant::now()));
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(delivered[0][0], ServerPacketId::LoginSuccessful as u8);
}
