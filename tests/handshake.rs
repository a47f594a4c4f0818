#![cfg(feature = "async_std")]
//! Drives a listener over loopback UDP with a hand rolled client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_std::future::timeout;
use async_std::net::UdpSocket;
use binary_util::interfaces::{Reader, Writer};

use bedrock_rak::{
    connection::queue::{RecvQueue, SendQueue},
    protocol::{
        ack::{Ack, ACK, NACK},
        frame::{is_datagram, FramePacket},
        mcpe::Motd,
        packet::offline::{
            OfflinePacket, OpenConnectRequest, SessionInfoRequest, UnconnectedPing,
        },
        packet::online::{
            ConnectionAccept, ConnectionRequest, NewConnection, OnlinePacket, DISCONNECT,
        },
        Magic, MAGIC,
    },
    server::event::ServerEvent,
    Connection, Listener,
};

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(300);

struct Client {
    socket: UdpSocket,
    server: SocketAddr,
    send: SendQueue,
    recv: RecvQueue,
}

impl Client {
    async fn new(server: SocketAddr) -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            server,
            send: SendQueue::new(1400, 1400),
            recv: RecvQueue::new(),
        }
    }

    fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    async fn send_raw(&self, buf: &[u8]) {
        self.socket.send_to(buf, self.server).await.unwrap();
    }

    async fn send_offline(&self, packet: OfflinePacket) {
        self.send_raw(packet.write_to_bytes().unwrap().as_slice())
            .await;
    }

    /// Frames `payload` the way a real client does and sends every datagram.
    async fn send_payload(&mut self, payload: &[u8]) {
        for datagram in self.send.encode(payload).unwrap() {
            self.send_raw(&datagram).await;
        }
    }

    async fn recv_raw(&self, wait: Duration) -> Option<Vec<u8>> {
        let mut buf = [0u8; 2048];
        match timeout(wait, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
            _ => None,
        }
    }

    async fn recv_offline(&self) -> OfflinePacket {
        let buf = self.recv_raw(WAIT).await.expect("no offline reply");
        OfflinePacket::read_from_slice(&buf).unwrap()
    }

    /// Waits for the next decapsulated payload, skipping acks.
    async fn recv_payload(&mut self, wait: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + wait;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let buf = self.recv_raw(left).await?;
            if !is_datagram(buf[0]) {
                continue;
            }
            let packet = FramePacket::read_from_slice(&buf).unwrap();
            let mut payloads = self.recv.insert(packet, Instant::now()).unwrap();
            if !payloads.is_empty() {
                return Some(payloads.remove(0));
            }
        }
    }

    async fn open(&mut self, protocol: u8) -> OfflinePacket {
        self.send_offline(OfflinePacket::OpenConnectRequest(OpenConnectRequest {
            protocol,
            mtu_size: 1400,
        }))
        .await;
        self.recv_offline().await
    }

    async fn session(&mut self, client_id: u64) -> OfflinePacket {
        self.send_offline(OfflinePacket::SessionInfoRequest(SessionInfoRequest {
            magic: Magic::new(),
            address: self.server,
            mtu_size: 1400,
            client_id,
        }))
        .await;
        self.recv_offline().await
    }

    /// Runs the handshake up to `ConnectionAccept`, without confirming it.
    async fn request(&mut self, client_id: u64) -> ConnectionAccept {
        self.open(8).await;
        self.session(client_id).await;

        let request = OnlinePacket::ConnectionRequest(ConnectionRequest {
            client_id,
            time: 99,
            security: false,
        });
        self.send_payload(request.write_to_bytes().unwrap().as_slice())
            .await;

        let payload = self.recv_payload(WAIT).await.expect("no connection accept");
        match OnlinePacket::read_from_slice(&payload).unwrap() {
            OnlinePacket::ConnectionAccept(accept) => accept,
            other => panic!("expected ConnectionAccept, got {:?}", other),
        }
    }

    /// Runs the whole handshake, returning the `ConnectionAccept` reply.
    async fn connect(&mut self, client_id: u64) -> ConnectionAccept {
        let accept = self.request(client_id).await;

        let new_connection = OnlinePacket::NewConnection(NewConnection {
            server_address: self.server,
            system_address: accept.internal_ids.clone(),
            request_time: accept.timestamp,
            timestamp: 100,
        });
        self.send_payload(new_connection.write_to_bytes().unwrap().as_slice())
            .await;

        accept
    }
}

async fn listener() -> (Listener, SocketAddr) {
    let mut server = Listener::bind("127.0.0.1:0").await.unwrap();
    server.start().await.unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

async fn next_event(server: &mut Listener) -> ServerEvent {
    timeout(WAIT, server.recv_event())
        .await
        .expect("timed out waiting for an event")
        .unwrap()
}

async fn expect_connect(server: &mut Listener) -> Arc<Connection> {
    match next_event(server).await {
        ServerEvent::Connect(conn) => conn,
        other => panic!("expected Connect, got {:?}", other),
    }
}

#[async_std::test]
async fn ping_echoes_timestamp_and_discovery_payload() {
    let (server, addr) = listener().await;
    let motd = Motd::new(server.id, "Test Server");
    server.set_motd(&motd).await;

    let client = Client::new(addr).await;
    client
        .send_offline(OfflinePacket::UnconnectedPing(UnconnectedPing {
            timestamp: 1234,
            magic: Magic::new(),
            client_id: Some(7),
        }))
        .await;

    match client.recv_offline().await {
        OfflinePacket::UnconnectedPong(pong) => {
            assert_eq!(pong.timestamp, 1234);
            assert_eq!(pong.server_id, server.id);
            assert_eq!(pong.payload, motd.to_bytes());
        }
        other => panic!("expected pong, got {:?}", other),
    }

    // the legacy id is answered the same way
    server.set_discovery_payload(b"custom".to_vec()).await;
    client
        .send_offline(OfflinePacket::UnconnectedPingOpenConnections(
            UnconnectedPing {
                timestamp: 5,
                magic: Magic::new(),
                client_id: None,
            },
        ))
        .await;

    match client.recv_offline().await {
        OfflinePacket::UnconnectedPong(pong) => {
            assert_eq!(pong.timestamp, 5);
            assert_eq!(pong.payload, b"custom".to_vec());
        }
        other => panic!("expected pong, got {:?}", other),
    }
}

#[async_std::test]
async fn bad_magic_gets_no_reply() {
    let (_server, addr) = listener().await;
    let client = Client::new(addr).await;

    let mut ping = vec![0x01];
    ping.extend_from_slice(&1234u64.to_be_bytes());
    ping.extend_from_slice(&[0u8; 16]);
    client.send_raw(&ping).await;

    let mut open = vec![0x05];
    open.extend_from_slice(&[0xffu8; 16]);
    open.push(8);
    open.resize(500, 0);
    client.send_raw(&open).await;

    assert_eq!(client.recv_raw(QUIET).await, None);
}

#[async_std::test]
async fn open_connect_request_reports_measured_mtu() {
    let (server, addr) = listener().await;
    let mut client = Client::new(addr).await;

    match client.open(7).await {
        OfflinePacket::OpenConnectReply(reply) => {
            assert_eq!(reply.server_id, server.id);
            assert_eq!(reply.mtu_size, 1400);
            assert!(!reply.security);
        }
        other => panic!("expected OpenConnectReply, got {:?}", other),
    }
    assert_eq!(server.connection_count().await, 0);
}

#[async_std::test]
async fn unsupported_protocol_is_refused() {
    let (server, addr) = listener().await;
    let mut client = Client::new(addr).await;

    match client.open(99).await {
        OfflinePacket::IncompatibleProtocolVersion(reply) => {
            assert_eq!(reply.protocol, 7);
            assert_eq!(reply.server_id, server.id);
        }
        other => panic!("expected IncompatibleProtocolVersion, got {:?}", other),
    }
    assert_eq!(server.connection_count().await, 0);
}

#[async_std::test]
async fn short_session_request_is_dropped() {
    let (server, addr) = listener().await;
    let client = Client::new(addr).await;

    let mut request = vec![0x07];
    request.extend_from_slice(&MAGIC);
    request.extend_from_slice(&[4, 127, 0, 0]);
    client.send_raw(&request).await;

    assert_eq!(client.recv_raw(QUIET).await, None);
    assert_eq!(server.connection_count().await, 0);
}

#[async_std::test]
async fn session_request_creates_a_session() {
    let (server, addr) = listener().await;
    let mut client = Client::new(addr).await;

    match client.session(42).await {
        OfflinePacket::SessionInfoReply(reply) => {
            assert_eq!(reply.server_id, server.id);
            assert_eq!(reply.client_address, client.addr());
            assert_eq!(reply.mtu_size, 1400);
        }
        other => panic!("expected SessionInfoReply, got {:?}", other),
    }

    let conn = server.get_connection(&client.addr()).await.unwrap();
    assert_eq!(conn.mtu(), 1400);
    assert_eq!(conn.client_id(), 42);
    assert!(!conn.is_connected().await);
}

#[async_std::test]
async fn full_handshake_connects_once_and_delivers_payloads() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;

    let accept = client.connect(42).await;
    assert_eq!(accept.request_time, 99);
    assert_eq!(accept.client_address, client.addr());
    assert_eq!(accept.internal_ids.len(), 10);

    // a retransmitted NewConnection must not connect twice
    let again = OnlinePacket::NewConnection(NewConnection {
        server_address: addr,
        system_address: Vec::new(),
        request_time: 0,
        timestamp: 0,
    });
    client
        .send_payload(again.write_to_bytes().unwrap().as_slice())
        .await;
    client.send_payload(&[0xfe, 1, 2, 3]).await;

    let conn = expect_connect(&mut server).await;
    assert_eq!(conn.address, client.addr());
    assert!(conn.is_connected().await);

    match next_event(&mut server).await {
        ServerEvent::Packet(from, payload) => {
            assert!(Arc::ptr_eq(&from, &conn));
            assert_eq!(payload, vec![0xfe, 1, 2, 3]);
        }
        other => panic!("expected Packet, got {:?}", other),
    }
}

#[async_std::test]
async fn split_payloads_travel_both_ways() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    let conn = expect_connect(&mut server).await;

    let mut big = vec![0xfe];
    big.extend((0..6000u32).map(|i| (i % 253) as u8));

    client.send_payload(&big).await;
    match next_event(&mut server).await {
        ServerEvent::Packet(_, payload) => assert_eq!(payload, big),
        other => panic!("expected Packet, got {:?}", other),
    }

    conn.send(&big).await.unwrap();
    assert_eq!(client.recv_payload(WAIT).await, Some(big));
}

#[async_std::test]
async fn datagrams_are_acknowledged() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    expect_connect(&mut server).await;

    let seq = client.send.next_seq();
    client.send_payload(&[0xfe, 9]).await;

    let deadline = Instant::now() + WAIT;
    loop {
        let buf = client
            .recv_raw(deadline.saturating_duration_since(Instant::now()))
            .await
            .expect("no ack for the payload");
        if buf[0] != ACK {
            continue;
        }
        if Ack::read_from_slice(&buf).unwrap().sequences().contains(&seq) {
            break;
        }
    }
}

#[async_std::test]
async fn nack_does_not_cause_a_resend() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    let conn = expect_connect(&mut server).await;

    conn.send(&[0xfe, 1]).await.unwrap();
    assert_eq!(client.recv_payload(WAIT).await, Some(vec![0xfe, 1]));

    // drain any trailing acks
    while client.recv_raw(QUIET).await.is_some() {}

    let nack = Ack::from_records(vec![0, 1, 2], true);
    assert_eq!(nack.id, NACK);
    client
        .send_raw(nack.write_to_bytes().unwrap().as_slice())
        .await;

    assert_eq!(client.recv_raw(QUIET).await, None);
    assert!(conn.is_connected().await);
}

#[async_std::test]
async fn closing_removes_the_session_for_good() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    let conn = expect_connect(&mut server).await;

    conn.close().await;
    assert!(conn.is_closed().await);
    assert!(conn.send(&[0xfe]).await.is_err());

    assert_eq!(client.recv_payload(WAIT).await, Some(vec![DISCONNECT]));

    match next_event(&mut server).await {
        ServerEvent::Disconnect(gone) => assert!(Arc::ptr_eq(&gone, &conn)),
        other => panic!("expected Disconnect, got {:?}", other),
    }
    assert_eq!(server.connection_count().await, 0);

    // late traffic is dropped and never recreates the session
    client.send_payload(&[0xfe, 7]).await;
    assert!(timeout(QUIET, server.recv_event()).await.is_err());
    assert_eq!(server.connection_count().await, 0);

    // closing twice is a no-op
    conn.close().await;
    assert!(timeout(QUIET, server.recv_event()).await.is_err());
}

#[async_std::test]
async fn peer_disconnect_removes_the_session() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    let conn = expect_connect(&mut server).await;

    client.send_payload(&[DISCONNECT]).await;

    match next_event(&mut server).await {
        ServerEvent::Disconnect(gone) => assert!(Arc::ptr_eq(&gone, &conn)),
        other => panic!("expected Disconnect, got {:?}", other),
    }
    assert!(conn.is_closed().await);
    assert!(server.get_connection(&client.addr()).await.is_none());
}

#[async_std::test]
async fn stop_disconnects_everyone() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    let conn = expect_connect(&mut server).await;

    server.stop().await.unwrap();
    assert_eq!(server.connection_count().await, 0);
    assert!(conn.is_closed().await);

    match server.recv_event().await {
        Ok(ServerEvent::Disconnect(gone)) => assert!(Arc::ptr_eq(&gone, &conn)),
        other => panic!("expected Disconnect, got {:?}", other),
    }
    assert!(server.recv_event().await.is_err());
    assert!(server.start().await.is_err());
}

#[async_std::test]
async fn request_without_new_connection_never_connects() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;

    let accept = client.request(3).await;
    assert_eq!(accept.request_time, 99);

    assert!(timeout(QUIET, server.recv_event()).await.is_err());
    let conn = server.get_connection(&client.addr()).await.unwrap();
    assert!(!conn.is_connected().await);
    assert!(!conn.is_closed().await);
}

#[async_std::test]
async fn payloads_before_new_connection_are_not_delivered() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;

    // accepted, but the handshake is not confirmed yet
    let accept = client.request(9).await;
    client.send_payload(&[0xfe, 0xaa]).await;
    assert!(timeout(QUIET, server.recv_event()).await.is_err());

    let new_connection = OnlinePacket::NewConnection(NewConnection {
        server_address: addr,
        system_address: accept.internal_ids.clone(),
        request_time: accept.timestamp,
        timestamp: 100,
    });
    client
        .send_payload(new_connection.write_to_bytes().unwrap().as_slice())
        .await;
    client.send_payload(&[0xfe, 0xbb]).await;

    let conn = expect_connect(&mut server).await;
    match next_event(&mut server).await {
        ServerEvent::Packet(from, payload) => {
            assert!(Arc::ptr_eq(&from, &conn));
            assert_eq!(payload, vec![0xfe, 0xbb]);
        }
        other => panic!("expected Packet, got {:?}", other),
    }
}

#[async_std::test]
async fn close_does_not_wait_on_a_full_event_queue() {
    let (mut server, addr) = listener().await;
    let mut client = Client::new(addr).await;
    client.connect(1).await;
    let conn = expect_connect(&mut server).await;

    // more payloads than the event queue holds, none of them drained
    for i in 0..1100u32 {
        client.send_payload(&[0xfe, (i % 256) as u8]).await;
    }
    async_std::task::sleep(Duration::from_millis(500)).await;

    assert!(
        timeout(Duration::from_secs(3), conn.close()).await.is_ok(),
        "close blocked on the event queue"
    );
    assert!(conn.is_closed().await);

    // the disconnect still arrives, after every queued packet
    loop {
        match next_event(&mut server).await {
            ServerEvent::Packet(..) => continue,
            ServerEvent::Disconnect(gone) => {
                assert!(Arc::ptr_eq(&gone, &conn));
                break;
            }
            other => panic!("expected Packet or Disconnect, got {:?}", other),
        }
    }
    assert_eq!(server.connection_count().await, 0);
}
