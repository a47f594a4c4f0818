//! # bedrock-rak
//!
//! A RakNet transport for Minecraft: Bedrock Edition servers.
//!
//! The [`Listener`] owns the UDP socket. It answers discovery pings, walks clients through
//! the offline handshake, and hands every connection's traffic to its owner as a
//! [`ServerEvent`]. A [`Connection`] is what you reply through.
//!
//! Exactly one async runtime feature should be enabled: `async_std` (the default) or
//! `async_tokio`.
//!
//! ```rust ignore
//! use bedrock_rak::{Listener, ServerEvent};
//!
//! #[async_std::main]
//! async fn main() {
//!     let mut server = Listener::bind("0.0.0.0:19132").await.unwrap();
//!     server.start().await.unwrap();
//!
//!     loop {
//!         if let Ok(ServerEvent::Packet(conn, payload)) = server.recv_event().await {
//!             conn.send(&payload).await.ok();
//!         }
//!     }
//! }
//! ```
/// Sessions and their reliability layer.
pub mod connection;
pub mod error;
pub(crate) mod notify;
/// Home of the RakNet protocol.
/// This contains the wire codecs for every packet the transport speaks.
pub mod protocol;
pub mod server;
pub mod util;

pub use connection::Connection;
pub use server::event::ServerEvent;
pub use server::Listener;
