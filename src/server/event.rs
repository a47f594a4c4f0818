use std::sync::Arc;

use crate::connection::Connection;

/// Events dispatched by the [`Listener`](crate::server::Listener).
///
/// Events for one connection are dispatched in the order they happened:
/// `Connect` first, then every `Packet`, then at most one `Disconnect`.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// The peer finished the handshake and can now send and receive payloads.
    Connect(Arc<Connection>),
    /// The connection was removed, by the peer, by [`Connection::close`], or
    /// because the listener stopped.
    Disconnect(Arc<Connection>),
    /// A complete payload, reassembled if it was split.
    Packet(Arc<Connection>, Vec<u8>),
}

impl ServerEvent {
    /// The connection this event belongs to.
    pub fn connection(&self) -> &Arc<Connection> {
        match self {
            ServerEvent::Connect(conn) => conn,
            ServerEvent::Disconnect(conn) => conn,
            ServerEvent::Packet(conn, _) => conn,
        }
    }
}
