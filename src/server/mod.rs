//! This is the server implementation of RakNet, allowing you to create a RakNet server.
//!
//! This module provides a [`Listener`] struct, which owns the socket, answers the offline
//! handshake, and dispatches every connection's traffic as a [`ServerEvent`].
//!
//! [`Listener`]: struct.Listener.html
//! [`ServerEvent`]: event::ServerEvent
/// Server events module. The events the listener hands to its owner.
pub mod event;

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::{net::SocketAddr, sync::Arc};

#[cfg(feature = "async_std")]
use async_std::{
    channel::{bounded, Receiver, Sender},
    net::UdpSocket,
    sync::RwLock,
    task::{self},
};
#[cfg(feature = "async_std")]
use futures::{select, FutureExt};

use binary_util::interfaces::{Reader, Writer};

#[cfg(feature = "async_tokio")]
use tokio::{
    net::UdpSocket,
    select,
    sync::mpsc::channel as bounded,
    sync::mpsc::{Receiver, Sender},
    sync::RwLock,
    task::{self},
};

use crate::connection::{Connection, ConnectionConfig, Sessions};
use crate::error::server::ServerError;
use crate::notify::Notify;
use crate::protocol::mcpe::motd::Motd;
use crate::protocol::packet::offline::{
    is_offline_request, IncompatibleProtocolVersion, OfflinePacket, OpenConnectReply,
    OpenConnectRequest, SessionInfoReply, SessionInfoRequest, UnconnectedPing, UnconnectedPong,
    UNCONNECTED_PING, UNCONNECTED_PING_OPEN_CONNECTIONS,
};
use crate::protocol::{Magic, DEFAULT_PROTOCOLS, MAX_DATAGRAM_SIZE};
use crate::rakrs_debug;
use crate::util::to_address_token;

use self::event::ServerEvent;

/// The number of events buffered before the read loop waits on the owner.
pub const EVENT_CAPACITY: usize = 1024;

/// This is a helper enum that allows you to pass in a `SocketAddr` or a `&str` to the `Listener::bind` function.
/// This is useful for when you want to bind to a specific address, but you don't want to parse it yourself.
///
/// This Trait will successfully parse the following:
/// - `SocketAddr::new("127.0.0.1:19132")`
/// - `"127.0.0.1:19132"`
/// - `String::from("localhost:19132")`
pub enum PossiblySocketAddr<'a> {
    SocketAddr(SocketAddr),
    Str(&'a str),
    String(String),
    ActuallyNot,
}

impl PossiblySocketAddr<'_> {
    pub fn to_socket_addr(self) -> Option<SocketAddr> {
        match self {
            PossiblySocketAddr::SocketAddr(addr) => Some(addr),
            PossiblySocketAddr::Str(addr) => resolve(addr),
            PossiblySocketAddr::String(addr) => resolve(&addr),
            PossiblySocketAddr::ActuallyNot => None,
        }
    }
}

/// Parses `addr` as a socket address, falling back to a host name lookup.
fn resolve(addr: &str) -> Option<SocketAddr> {
    if let Ok(addr) = addr.parse::<SocketAddr>() {
        return Some(addr);
    }
    addr.to_socket_addrs().ok()?.next()
}

impl<'a> From<&'a str> for PossiblySocketAddr<'a> {
    fn from(s: &'a str) -> Self {
        PossiblySocketAddr::Str(s)
    }
}

impl From<String> for PossiblySocketAddr<'_> {
    fn from(s: String) -> Self {
        PossiblySocketAddr::String(s)
    }
}

impl From<SocketAddr> for PossiblySocketAddr<'_> {
    fn from(s: SocketAddr) -> Self {
        PossiblySocketAddr::SocketAddr(s)
    }
}

impl std::fmt::Display for PossiblySocketAddr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PossiblySocketAddr::SocketAddr(addr) => write!(f, "{}", addr),
            PossiblySocketAddr::Str(addr) => write!(f, "{}", addr),
            PossiblySocketAddr::String(addr) => write!(f, "{}", addr),
            PossiblySocketAddr::ActuallyNot => write!(f, "Not a valid address!"),
        }
    }
}

/// The main server struct, this is responsible for listening to connections, and dispatching them to a handler.
///
/// The listener never retransmits. Payloads are framed reliably and acknowledged by the
/// peer, but a NACK is only logged.
///
/// ## A generic example
/// ```rust ignore
/// use bedrock_rak::server::{event::ServerEvent, Listener};
///
/// #[async_std::main]
/// async fn main() {
///     // Bind the server to the specified address, but do not start it.
///     let mut server = Listener::bind("0.0.0.0:19132").await.unwrap();
///
///     // Begins listening to connections
///     server.start().await.unwrap();
///
///     while let Ok(event) = server.recv_event().await {
///         match event {
///             ServerEvent::Connect(conn) => println!("{} connected", conn.address),
///             ServerEvent::Packet(conn, payload) => {
///                 conn.send(&payload).await.ok();
///             }
///             ServerEvent::Disconnect(conn) => println!("{} left", conn.address),
///         }
///     }
/// }
/// ```
///
/// ## Accepting other protocols
/// The listener accepts RakNet protocols 7 and 8 by default. The first entry is the one
/// advertised to clients using an unsupported protocol.
///
/// ```rust ignore
/// let mut server = Listener::bind("0.0.0.0:19132").await.unwrap();
/// server.versions = &[10, 11];
/// server.start().await.unwrap();
/// ```
pub struct Listener {
    /// A server Id, passed in unconnected pong and the handshake replies.
    pub id: u64,
    /// Supported versions
    pub versions: &'static [u8],
    /// Limits for connections created after `start`.
    pub config: ConnectionConfig,
    /// Whether or not the server is being served.
    serving: bool,
    /// The current socket.
    sock: Option<Arc<UdpSocket>>,
    /// Every live connection by remote address.
    connections: Arc<Sessions>,
    /// The payload sent in every unconnected pong.
    discovery: Arc<RwLock<Vec<u8>>>,
    send_evnt: Sender<ServerEvent>,
    recv_evnt: Receiver<ServerEvent>,
    /// Signals the read loop to exit.
    closed: Arc<Notify>,
}

impl Listener {
    /// Binds a new listener to the specified address provided, this will error if the address is invalid or already in use.
    /// This will not start the listener, you must call [`Listener::start`] to start listening to connections.
    ///
    /// ## Example
    /// ```ignore
    /// use bedrock_rak::server::Listener;
    ///
    /// async fn start() {
    ///     let mut server = Listener::bind("0.0.0.0:19132").await.unwrap();
    /// }
    /// ```
    ///
    /// [`PossiblySocketAddr`]: enum.PossiblySocketAddr.html
    /// [`Listener::start`]: struct.Listener.html#method.start
    pub async fn bind<'a, I: Into<PossiblySocketAddr<'a>>>(
        address: I,
    ) -> Result<Self, ServerError> {
        let a: PossiblySocketAddr = address.into();
        let Some(address) = a.to_socket_addr() else {
            rakrs_debug!("Invalid binding value");
            return Err(ServerError::AddrBindErr);
        };

        let sock = match UdpSocket::bind(address).await {
            Ok(s) => s,
            Err(e) => {
                rakrs_debug!("Failed to bind {}: {}", address, e);
                return Err(ServerError::AddrBindErr);
            }
        };

        let port = sock.local_addr().map(|a| a.port()).unwrap_or(address.port());
        rakrs_debug!(true, "listener: Bound to {}", address);

        let server_id: u64 = rand::random();
        let mut motd = Motd::new(server_id, "Bedrock Server");
        motd.ports = Some((port, port));

        let (send_evnt, recv_evnt) = bounded::<ServerEvent>(EVENT_CAPACITY);

        Ok(Self {
            id: server_id,
            versions: DEFAULT_PROTOCOLS,
            config: ConnectionConfig::default(),
            serving: false,
            sock: Some(Arc::new(sock)),
            connections: Arc::new(RwLock::new(HashMap::new())),
            discovery: Arc::new(RwLock::new(motd.to_bytes())),
            send_evnt,
            recv_evnt,
            closed: Arc::new(Notify::new()),
        })
    }

    /// This method is required to be called before the server can begin listening to connections.
    /// However, you must call [`Listener::bind`] before you can call this method, as that method
    /// is responsible for creating the socket and initializing the server.
    ///
    /// A stopped listener can not be started again.
    ///
    /// [`Listener::bind`]: struct.Listener.html#method.bind
    pub async fn start(&mut self) -> Result<(), ServerError> {
        let Some(socket) = self.sock.clone() else {
            return Err(ServerError::Reset);
        };

        if self.serving {
            return Err(ServerError::AlreadyOnline);
        }

        let dispatcher = Dispatcher {
            socket: socket.clone(),
            server_id: self.id,
            versions: self.versions,
            config: self.config,
            sessions: self.connections.clone(),
            discovery: self.discovery.clone(),
            events: self.send_evnt.clone(),
            closed: self.closed.clone(),
        };
        let closer = self.closed.clone();

        self.serving = true;

        match socket.local_addr() {
            Ok(addr) => tracing::info!("Listener started on {}", addr),
            Err(_) => tracing::info!("Listener started"),
        }

        task::spawn(async move {
            // We allocate here to prevent constant allocation of this array
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            loop {
                #[cfg(feature = "async_std")]
                let recv = select! {
                    _ = closer.wait().fuse() => {
                        rakrs_debug!(true, "[SERVER] [NETWORK] Server has recieved the shutdown notification!");
                        break;
                    }
                    recv = socket.recv_from(&mut buf).fuse() => recv,
                };

                #[cfg(feature = "async_tokio")]
                let recv = select! {
                    _ = closer.wait() => {
                        rakrs_debug!(true, "[SERVER] [NETWORK] Server has recieved the shutdown notification!");
                        break;
                    }
                    recv = socket.recv_from(&mut buf) => recv,
                };

                let (length, origin) = match recv {
                    Ok(r) => r,
                    Err(e) => match e.kind() {
                        // windows reports icmp port unreachable on the next read
                        std::io::ErrorKind::ConnectionReset => continue,
                        _ => {
                            tracing::error!("[SERVER-SOCKET] Failed to recieve packet! {}", e);
                            continue;
                        }
                    },
                };

                dispatcher.handle(&buf[..length], origin).await;
            }
        });

        Ok(())
    }

    /// Waits for the next [`ServerEvent`].
    ///
    /// Returns [`ServerError::NotListening`] before [`Listener::start`] is called.
    /// Once the listener is stopped the remaining events are still returned, then
    /// [`ServerError::Killed`].
    pub async fn recv_event(&mut self) -> Result<ServerEvent, ServerError> {
        if self.sock.is_none() {
            return self.recv_evnt.try_recv().map_err(|_| ServerError::Killed);
        }

        if !self.serving {
            return Err(ServerError::NotListening);
        }

        #[cfg(feature = "async_std")]
        return self.recv_evnt.recv().await.map_err(|_| ServerError::Killed);

        #[cfg(feature = "async_tokio")]
        return self.recv_evnt.recv().await.ok_or(ServerError::Killed);
    }

    /// Replaces the payload returned in every unconnected pong.
    /// The listener never changes it on its own.
    pub async fn set_discovery_payload(&self, payload: impl Into<Vec<u8>>) {
        *self.discovery.write().await = payload.into();
    }

    /// Replaces the discovery payload with `motd`.
    pub async fn set_motd(&self, motd: &Motd) {
        self.set_discovery_payload(motd.to_bytes()).await;
    }

    pub async fn discovery_payload(&self) -> Vec<u8> {
        self.discovery.read().await.clone()
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.sock
            .as_ref()
            .ok_or(ServerError::Reset)?
            .local_addr()
            .map_err(|_| ServerError::AddrBindErr)
    }

    /// The live connection for `address`, if any.
    pub async fn get_connection(&self, address: &SocketAddr) -> Option<Arc<Connection>> {
        self.connections.read().await.get(address).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Stops the Listener, effectively closing the socket and stopping the server.
    /// Every connection is notified on a best effort basis and removed, dispatching
    /// a [`ServerEvent::Disconnect`] for each.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        self.closed.notify();

        let drained: Vec<Arc<Connection>> = self
            .connections
            .write()
            .await
            .drain()
            .map(|(_, conn)| conn)
            .collect();

        for conn in drained.iter() {
            conn.shutdown().await;
        }

        if self.serving {
            tracing::info!("Listener stopped, {} connections closed", drained.len());
        }

        self.sock = None;
        self.serving = false;

        Ok(())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.closed.notify();
    }
}

/// The state the read loop needs, moved into its task.
struct Dispatcher {
    socket: Arc<UdpSocket>,
    server_id: u64,
    versions: &'static [u8],
    config: ConnectionConfig,
    sessions: Arc<Sessions>,
    discovery: Arc<RwLock<Vec<u8>>>,
    events: Sender<ServerEvent>,
    closed: Arc<Notify>,
}

impl Dispatcher {
    async fn handle(&self, buf: &[u8], origin: SocketAddr) {
        let Some(&id) = buf.first() else {
            return;
        };

        if self.closed.is_notified() {
            return;
        }

        if !is_offline_request(id) {
            let conn = self.sessions.read().await.get(&origin).cloned();
            match conn {
                Some(conn) => conn.handle(buf).await,
                None => tracing::warn!(
                    "[{}] Packet {:#04x} from an address without a session",
                    to_address_token(origin),
                    id
                ),
            }
            return;
        }

        let packet = match OfflinePacket::read_from_slice(buf) {
            Ok(packet) => packet,
            Err(e) => {
                if id == UNCONNECTED_PING || id == UNCONNECTED_PING_OPEN_CONNECTIONS {
                    rakrs_debug!(true, "[{}] Dropped malformed ping: {}", to_address_token(origin), e);
                } else {
                    tracing::warn!(
                        "[{}] Dropped handshake packet {:#04x} with bad magic or length: {}",
                        to_address_token(origin),
                        id,
                        e
                    );
                }
                return;
            }
        };

        match packet {
            OfflinePacket::UnconnectedPing(ping)
            | OfflinePacket::UnconnectedPingOpenConnections(ping) => {
                self.pong(ping, origin).await;
            }
            OfflinePacket::OpenConnectRequest(request) => {
                self.open_connect(request, origin).await;
            }
            OfflinePacket::SessionInfoRequest(request) => {
                if buf.len() < SessionInfoRequest::MIN_SIZE {
                    tracing::warn!(
                        "[{}] SessionInfoRequest too short ({} bytes)",
                        to_address_token(origin),
                        buf.len()
                    );
                    return;
                }
                self.create_session(request, origin).await;
            }
            _ => {
                rakrs_debug!("[{}] Received invalid packet!", to_address_token(origin));
            }
        }
    }

    async fn pong(&self, ping: UnconnectedPing, origin: SocketAddr) {
        let payload = self.discovery.read().await.clone();
        let pong = UnconnectedPong {
            timestamp: ping.timestamp,
            server_id: self.server_id,
            magic: Magic::new(),
            payload,
        };
        self.send_packet(pong.into(), origin).await;
    }

    async fn open_connect(&self, request: OpenConnectRequest, origin: SocketAddr) {
        if !self.versions.contains(&request.protocol) {
            tracing::warn!(
                "[{}] Sent ({}) which is invalid RakNet protocol. Version is incompatible with server.",
                to_address_token(origin),
                request.protocol
            );

            let resp = IncompatibleProtocolVersion {
                protocol: self.versions.first().copied().unwrap_or(0),
                magic: Magic::new(),
                server_id: self.server_id,
            };
            self.send_packet(resp.into(), origin).await;
            return;
        }

        rakrs_debug!(
            true,
            "[{}] Client requested Mtu Size: {}",
            to_address_token(origin),
            request.mtu_size
        );

        let resp = OpenConnectReply {
            magic: Magic::new(),
            server_id: self.server_id,
            security: false,
            mtu_size: request.mtu_size,
        };
        self.send_packet(resp.into(), origin).await;
    }

    async fn create_session(&self, request: SessionInfoRequest, origin: SocketAddr) {
        let conn = Arc::new(Connection::new(
            origin,
            request.mtu_size,
            request.client_id,
            &self.config,
            self.socket.clone(),
            &self.sessions,
            self.events.clone(),
        ));

        let replaced = self.sessions.write().await.insert(origin, conn);
        if let Some(old) = replaced {
            rakrs_debug!(
                "[{}] Replacing the existing session",
                to_address_token(origin)
            );
            old.teardown(false).await;
        }

        tracing::info!(
            "[{}] Session created (mtu {}, client {})",
            to_address_token(origin),
            request.mtu_size,
            request.client_id
        );

        let resp = SessionInfoReply {
            magic: Magic::new(),
            server_id: self.server_id,
            client_address: origin,
            mtu_size: request.mtu_size,
            security: false,
        };
        self.send_packet(resp.into(), origin).await;
    }

    async fn send_packet(&self, packet: OfflinePacket, origin: SocketAddr) {
        let buf = match packet.write_to_bytes() {
            Ok(buf) => buf,
            Err(e) => {
                rakrs_debug!(
                    "[{}] Failed to encode offline packet! {}",
                    to_address_token(origin),
                    e
                );
                return;
            }
        };

        if let Err(e) = self.socket.send_to(buf.as_slice(), origin).await {
            rakrs_debug!(
                "[{}] Failed sending payload to socket! {}",
                to_address_token(origin),
                e
            );
        }
    }
}
