//! This module contains the logic to handle a connection or "peer" to the server.
//!
//! A [`Connection`] is created by the [`Listener`] when a peer finishes the
//! offline handshake. The listener's read loop hands it every datagram from
//! that peer, and the owner receives [`ServerEvent`]s for it.
//!
//! This module also contains the following submodules:
//! - [`controller`]: duplicate detection for incoming datagrams.
//! - [`queue`]: the receiving and sending halves of the reliability layer.
//! - [`state`]: The state submodule, which is used to handle the connection state.
//!
//! # Example
//! ```ignore
//! use bedrock_rak::server::event::ServerEvent;
//!
//! async fn handle(event: ServerEvent) {
//!     if let ServerEvent::Packet(conn, payload) = event {
//!         // echo it back
//!         conn.send(&payload).await.ok();
//!     }
//! }
//! ```
//!
//! [`Listener`]: crate::server::Listener
//! [`ServerEvent`]: crate::server::event::ServerEvent
//! [`controller`]: crate::connection::controller
//! [`queue`]: crate::connection::queue
//! [`state`]: crate::connection::state
pub mod controller;
/// Necessary queues for the connection.
pub mod queue;
pub mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use binary_util::interfaces::{Reader, Writer};

#[cfg(feature = "async_std")]
use async_std::{
    channel::{Sender, TrySendError},
    net::UdpSocket,
    sync::{Mutex, RwLock},
    task,
};
#[cfg(feature = "async_tokio")]
use tokio::{
    net::UdpSocket,
    sync::{
        mpsc::{error::TrySendError, Sender},
        Mutex, RwLock,
    },
    task,
};

use crate::error::connection::ConnectionError;
use crate::protocol::ack::{Ack, ACK, NACK};
use crate::protocol::frame::{is_datagram, FramePacket};
use crate::protocol::packet::online::{
    ConnectedPong, ConnectionAccept, ConnectionRequest, OnlinePacket, CONNECTED_PING,
    CONNECTED_PONG, CONNECTION_REQUEST, DISCONNECT, NEW_CONNECTION,
};
use crate::protocol::{MAX_FRAGS, MAX_SINGLE_PAYLOAD};
use crate::rakrs_debug;
use crate::server::event::ServerEvent;
use crate::util::{current_epoch, current_millis, to_address_token};

use self::queue::{
    FragmentQueue, RecvQueue, SendQueue, MAX_CONCURRENT_SPLITS, SPLIT_TIMEOUT,
};
use self::state::ConnectionState;

/// Every live connection, keyed by the peer's address.
pub(crate) type Sessions = RwLock<HashMap<SocketAddr, Arc<Connection>>>;

/// Per connection limits, applied to connections created after the
/// listener starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// The largest frame body sent without splitting.
    pub max_payload_size: usize,
    /// The most fragments accepted for one split message.
    pub max_split_parts: u32,
    /// The most split messages reassembled at once.
    pub max_concurrent_splits: usize,
    /// How long an incomplete split message is kept after its last fragment.
    pub split_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_SINGLE_PAYLOAD,
            max_split_parts: MAX_FRAGS,
            max_concurrent_splits: MAX_CONCURRENT_SPLITS,
            split_timeout: SPLIT_TIMEOUT,
        }
    }
}

/// The connection struct contains the logic for a connection to the server.
/// The following methods are the most important:
/// - [`Connection::send()`]: This is used to send packets to the client.
/// - [`Connection::close()`]: This is used to disconnect the client.
///
/// Payloads from the client arrive as [`ServerEvent::Packet`] on the listener.
pub struct Connection {
    /// The address of the connection
    pub address: SocketAddr,
    mtu_size: u16,
    client_id: u64,
    state: Mutex<ConnectionState>,
    /// Sequence numbers, message indexes and split ids for outgoing datagrams.
    send_queue: Mutex<SendQueue>,
    /// Acks, duplicate detection and split reassembly for incoming datagrams.
    recv_queue: Mutex<RecvQueue>,
    /// The last time a packet was recieved, in seconds.
    recv_time: AtomicU64,
    socket: Arc<UdpSocket>,
    sessions: Weak<Sessions>,
    events: Sender<ServerEvent>,
}

impl Connection {
    pub(crate) fn new(
        address: SocketAddr,
        mtu_size: u16,
        client_id: u64,
        config: &ConnectionConfig,
        socket: Arc<UdpSocket>,
        sessions: &Arc<Sessions>,
        events: Sender<ServerEvent>,
    ) -> Self {
        let fragments = FragmentQueue::with_limits(
            config.max_split_parts,
            config.max_concurrent_splits,
            config.split_timeout,
        );

        Self {
            address,
            mtu_size,
            client_id,
            state: Mutex::new(ConnectionState::Unidentified),
            send_queue: Mutex::new(SendQueue::new(mtu_size, config.max_payload_size)),
            recv_queue: Mutex::new(RecvQueue::with_fragments(fragments)),
            recv_time: AtomicU64::new(current_epoch()),
            socket,
            sessions: Arc::downgrade(sessions),
            events,
        }
    }

    /// The mtu negotiated during the handshake.
    pub fn mtu(&self) -> u16 {
        self.mtu_size
    }

    /// The guid the client sent in `SessionInfoRequest`.
    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// The unix time, in seconds, of the last datagram from this peer.
    pub fn last_activity(&self) -> u64 {
        self.recv_time.load(Ordering::Relaxed)
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Whether the peer completed the handshake and is still connected.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    pub async fn is_closed(&self) -> bool {
        !self.state.lock().await.is_available()
    }

    /// This method is used to send payloads to the connection. The payload is
    /// framed reliably, split when it does not fit one datagram, and written
    /// to the socket immediately. Nothing waits for the peer to acknowledge it.
    ///
    /// # Example
    /// ```ignore
    /// async fn send_payload(conn: Arc<Connection>) {
    ///     conn.send(&[0xfe, 0x01, 0x02]).await.unwrap();
    /// }
    /// ```
    pub async fn send(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        if self.is_closed().await {
            return Err(ConnectionError::Closed);
        }
        self.write_payload(payload).await
    }

    /// Disconnects the client. A disconnect notification is sent on a best
    /// effort basis, the connection is removed from the listener and a
    /// [`ServerEvent::Disconnect`] is dispatched.
    ///
    /// Calling this on a closed connection does nothing.
    pub async fn close(self: &Arc<Self>) {
        self.teardown(true).await;
    }

    /// Handles a raw datagram from this connection's peer.
    pub(crate) async fn handle(self: &Arc<Self>, buf: &[u8]) {
        let Some(&id) = buf.first() else {
            return;
        };

        if self.is_closed().await {
            rakrs_debug!(
                "[{}] Dropping packet for a closed connection",
                to_address_token(self.address)
            );
            return;
        }

        self.recv_time.store(current_epoch(), Ordering::Relaxed);

        match id {
            id if is_datagram(id) => self.handle_datagram(buf).await,
            id if id & 0xf0 == ACK => match Ack::read_from_slice(buf) {
                Ok(ack) => rakrs_debug!(
                    true,
                    "[{}] Peer acknowledged {} records",
                    to_address_token(self.address),
                    ack.records.len()
                ),
                Err(e) => rakrs_debug!(
                    true,
                    "[{}] Malformed ack: {}",
                    to_address_token(self.address),
                    e
                ),
            },
            id if id & 0xf0 == NACK => {
                // nothing is kept for retransmission
                rakrs_debug!(
                    "[{}] Peer reported {} bytes of missing datagrams, not resending",
                    to_address_token(self.address),
                    buf.len()
                );
            }
            CONNECTION_REQUEST | NEW_CONNECTION | DISCONNECT => {
                self.handle_payload(buf.to_vec()).await;
            }
            _ => {
                rakrs_debug!(
                    "[{}] Unknown RakNet packet {:#04x} recieved",
                    to_address_token(self.address),
                    id
                );
            }
        }
    }

    async fn handle_datagram(self: &Arc<Self>, buf: &[u8]) {
        let packet = match FramePacket::read_from_slice(buf) {
            Ok(packet) => packet,
            Err(e) => {
                rakrs_debug!(
                    true,
                    "[{}] Failed to parse frame packet: {}",
                    to_address_token(self.address),
                    e
                );
                return;
            }
        };

        let (ready, acks) = {
            let mut recv_q = self.recv_queue.lock().await;
            let ready = recv_q.insert(packet, Instant::now());
            (ready, recv_q.ack_flush())
        };

        self.send_ack(acks).await;

        match ready {
            Ok(payloads) => {
                for payload in payloads {
                    self.handle_payload(payload).await;
                }
            }
            Err(e) => {
                rakrs_debug!(true, "[{}] {}", to_address_token(self.address), e);
            }
        }
    }

    async fn send_ack(&self, sequences: Vec<u32>) {
        if sequences.is_empty() {
            return;
        }

        match Ack::from_records(sequences, false).write_to_bytes() {
            Ok(buf) => {
                if let Err(e) = self.socket.send_to(buf.as_slice(), self.address).await {
                    rakrs_debug!(
                        "[{}] Failed to send ack: {}",
                        to_address_token(self.address),
                        e
                    );
                }
            }
            Err(e) => {
                rakrs_debug!(
                    "[{}] Failed to encode ack: {}",
                    to_address_token(self.address),
                    e
                );
            }
        }
    }

    /// Handles one complete payload, either internal to RakNet or forwarded
    /// to the owner.
    async fn handle_payload(self: &Arc<Self>, payload: Vec<u8>) {
        let Some(&id) = payload.first() else {
            return;
        };

        if self.is_closed().await {
            return;
        }

        match id {
            CONNECTION_REQUEST => match OnlinePacket::read_from_slice(&payload) {
                Ok(OnlinePacket::ConnectionRequest(request)) => self.accept(request).await,
                _ => rakrs_debug!(
                    "[{}] Malformed ConnectionRequest",
                    to_address_token(self.address)
                ),
            },
            NEW_CONNECTION => self.on_connected().await,
            DISCONNECT => {
                rakrs_debug!(
                    "[{}] Peer sent a disconnect notification",
                    to_address_token(self.address)
                );
                self.teardown(false).await;
            }
            CONNECTED_PING => {
                if let Ok(OnlinePacket::ConnectedPing(ping)) =
                    OnlinePacket::read_from_slice(&payload)
                {
                    let pong = OnlinePacket::ConnectedPong(ConnectedPong {
                        ping_time: ping.time,
                        pong_time: current_millis() as i64,
                    });
                    self.write_packet(pong).await;
                }
            }
            CONNECTED_PONG => {}
            _ if !self.is_connected().await => {
                rakrs_debug!(
                    "[{}] Dropping {:#04x} payload sent before the handshake completed",
                    to_address_token(self.address),
                    id
                );
            }
            _ => {
                rakrs_debug!(
                    true,
                    "[{}] Forwarding {} byte payload",
                    to_address_token(self.address),
                    payload.len()
                );
                if self
                    .events
                    .send(ServerEvent::Packet(self.clone(), payload))
                    .await
                    .is_err()
                {
                    rakrs_debug!(
                        "[{}] Event channel closed, payload dropped",
                        to_address_token(self.address)
                    );
                }
            }
        }
    }

    async fn accept(&self, request: ConnectionRequest) {
        rakrs_debug!(
            "[{}] ConnectionRequest from client {}",
            to_address_token(self.address),
            request.client_id
        );

        let accept = OnlinePacket::ConnectionAccept(ConnectionAccept::new(
            self.address,
            request.time,
            current_millis() as i64,
        ));
        self.write_packet(accept).await;

        let mut state = self.state.lock().await;
        if *state == ConnectionState::Unidentified {
            *state = ConnectionState::Connecting;
        }
    }

    async fn on_connected(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().await;
            if state.is_connected() || !state.is_available() {
                return;
            }
            *state = ConnectionState::Connected;
        }

        tracing::info!("[{}] Connection established", to_address_token(self.address));

        if self
            .events
            .send(ServerEvent::Connect(self.clone()))
            .await
            .is_err()
        {
            rakrs_debug!(
                "[{}] Event channel closed, connect dropped",
                to_address_token(self.address)
            );
        }
    }

    async fn write_packet(&self, packet: OnlinePacket) {
        let result = match packet.write_to_bytes() {
            Ok(buf) => self.write_payload(buf.as_slice()).await,
            Err(_) => Err(ConnectionError::Encode),
        };

        if let Err(e) = result {
            rakrs_debug!(
                "[{}] Failed to send packet: {}",
                to_address_token(self.address),
                e
            );
        }
    }

    async fn write_payload(&self, payload: &[u8]) -> Result<(), ConnectionError> {
        let datagrams = self.send_queue.lock().await.encode(payload)?;
        for datagram in datagrams {
            self.socket.send_to(&datagram, self.address).await?;
        }
        Ok(())
    }

    /// Moves the connection to `Disconnected`.
    /// Returns `false` if it already was.
    async fn mark_closed(&self) -> bool {
        let mut state = self.state.lock().await;
        if *state == ConnectionState::Disconnected {
            return false;
        }
        *state = ConnectionState::Disconnected;
        true
    }

    async fn notify_peer(&self) {
        if let Err(e) = self.write_payload(&[DISCONNECT]).await {
            rakrs_debug!(
                true,
                "[{}] Failed to send disconnect packet when closing: {}",
                to_address_token(self.address),
                e
            );
        }
    }

    /// Closes the connection, removes it from the listener if it is still the
    /// connection registered for its address, then dispatches the disconnect.
    pub(crate) async fn teardown(self: &Arc<Self>, notify_peer: bool) {
        if !self.mark_closed().await {
            return;
        }

        if notify_peer {
            self.notify_peer().await;
        }

        if let Some(sessions) = self.sessions.upgrade() {
            let mut sessions = sessions.write().await;
            let registered = sessions
                .get(&self.address)
                .map_or(false, |conn| Arc::ptr_eq(conn, self));
            if registered {
                sessions.remove(&self.address);
            }
        }

        tracing::info!("[{}] Connection removed", to_address_token(self.address));

        self.dispatch_disconnect();
    }

    /// Used by the listener when it stops. The connection must already be
    /// out of the session table.
    pub(crate) async fn shutdown(self: &Arc<Self>) {
        if !self.mark_closed().await {
            return;
        }

        self.notify_peer().await;
        self.dispatch_disconnect();
    }

    /// Queues the disconnect event without waiting on the owner, who may be
    /// the caller of [`Connection::close`]. When the queue is full the event
    /// is handed to a background task, still behind every queued `Packet`.
    fn dispatch_disconnect(self: &Arc<Self>) {
        match self.events.try_send(ServerEvent::Disconnect(self.clone())) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                rakrs_debug!(
                    "[{}] Event queue full, disconnect deferred",
                    to_address_token(self.address)
                );
                let events = self.events.clone();
                let address = self.address;
                task::spawn(async move {
                    if events.send(event).await.is_err() {
                        rakrs_debug!(
                            "[{}] Event channel closed, disconnect dropped",
                            to_address_token(address)
                        );
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                rakrs_debug!(
                    "[{}] Event channel closed, disconnect dropped",
                    to_address_token(self.address)
                );
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("mtu_size", &self.mtu_size)
            .field("client_id", &self.client_id)
            .finish()
    }
}
