//! Online packets are packets that are sent when the client is connected to the server
//! and are used to keep the connection alive, and to complete the connection handshake.
//!
//! The following module provides the following packets:
//! - [`ConnectedPing`]
//! - [`ConnectedPong`]
//! - [`ConnectionRequest`]
//! - [`ConnectionAccept`]
//! - [`NewConnection`]
//! - [`Disconnect`]
use std::net::SocketAddr;

use crate::protocol::addr::{read_address, write_address, LOOPBACK_SYSTEM_ADDRESS};
use crate::register_packets;

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};
use binary_util::BinaryIo;

pub const CONNECTED_PING: u8 = 0x00;
pub const CONNECTED_PONG: u8 = 0x03;
pub const CONNECTION_REQUEST: u8 = 0x09;
pub const CONNECTION_ACCEPT: u8 = 0x10;
pub const NEW_CONNECTION: u8 = 0x13;
pub const DISCONNECT: u8 = 0x15;

/// The number of system address slots in [`ConnectionAccept`].
pub const SYSTEM_ADDRESS_COUNT: usize = 10;

/// An enum of all Online packets.
///
/// You can use this to read and write online packets,
/// with the `binary_util` traits `Reader` and `Writer`.
#[derive(BinaryIo, Clone, Debug)]
#[repr(u8)]
pub enum OnlinePacket {
    ConnectedPing(ConnectedPing) = 0x00,
    ConnectedPong(ConnectedPong) = 0x03,
    ConnectionRequest(ConnectionRequest) = 0x09,
    ConnectionAccept(ConnectionAccept) = 0x10,
    NewConnection(NewConnection) = 0x13,
    Disconnect(Disconnect) = 0x15,
}

register_packets! {
    OnlinePacket,
    ConnectedPing,
    ConnectedPong,
    ConnectionRequest,
    ConnectionAccept,
    NewConnection,
    Disconnect
}

/// Sent by either peer to keep the connection alive.
/// The other peer should respond with a [`ConnectedPong`] packet.
#[derive(Clone, Debug, BinaryIo)]
pub struct ConnectedPing {
    /// The time you sent the packet to the peer.
    pub time: i64,
}

/// Sent in response to a [`ConnectedPing`] packet.
#[derive(Clone, Debug, BinaryIo)]
pub struct ConnectedPong {
    /// The time that the peer sent the [`ConnectedPing`] packet.
    pub ping_time: i64,
    /// The time that you sent the [`ConnectedPong`] packet to the peer.
    pub pong_time: i64,
}

/// A connection request, this contains information about the client. Like it's
/// current time and the client id.
#[derive(Clone, Debug)]
pub struct ConnectionRequest {
    pub client_id: u64,
    pub time: i64,
    /// Missing on some clients, treated as `false`.
    pub security: bool,
}

impl Reader<ConnectionRequest> for ConnectionRequest {
    fn read(buf: &mut ByteReader) -> std::io::Result<Self> {
        let client_id = buf.read_u64()?;
        let time = buf.read_i64()?;
        let security = if buf.as_slice().is_empty() {
            false
        } else {
            buf.read_bool()?
        };

        Ok(Self {
            client_id,
            time,
            security,
        })
    }
}

impl Writer for ConnectionRequest {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        buf.write_u64(self.client_id)?;
        buf.write_i64(self.time)?;
        buf.write_bool(self.security)?;
        Ok(())
    }
}

/// A connection Accept packet, this is sent by the server to the client.
#[derive(Clone, Debug)]
pub struct ConnectionAccept {
    /// The address of the client as the server sees it.
    pub client_address: SocketAddr,
    /// The system index of the server.
    pub system_index: u16,
    /// Alternative addresses of the server, always [`SYSTEM_ADDRESS_COUNT`] long.
    pub internal_ids: Vec<SocketAddr>,
    /// The time of the timestamp the client sent with `ConnectionRequest`.
    pub request_time: i64,
    /// The time on the server.
    pub timestamp: i64,
}

impl ConnectionAccept {
    /// The reply to a [`ConnectionRequest`], every system address slot
    /// filled with the loopback address.
    pub fn new(client_address: SocketAddr, request_time: i64, timestamp: i64) -> Self {
        Self {
            client_address,
            system_index: 0,
            internal_ids: vec![LOOPBACK_SYSTEM_ADDRESS; SYSTEM_ADDRESS_COUNT],
            request_time,
            timestamp,
        }
    }
}

impl Reader<ConnectionAccept> for ConnectionAccept {
    fn read(buf: &mut ByteReader) -> std::io::Result<Self> {
        let client_address = read_address(buf)?;
        let system_index = buf.read_u16()?;
        let mut internal_ids = Vec::<SocketAddr>::new();

        for _ in 0..20 {
            // we only have the request time and timestamp left...
            if buf.as_slice().len() <= 16 {
                break;
            }
            internal_ids.push(read_address(buf)?);
        }

        let request_time = buf.read_i64()?;
        let timestamp = buf.read_i64()?;

        Ok(Self {
            client_address,
            system_index,
            internal_ids,
            request_time,
            timestamp,
        })
    }
}

impl Writer for ConnectionAccept {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        write_address(buf, &self.client_address)?;
        buf.write_u16(self.system_index)?;

        if self.internal_ids.len() > 20 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Too many internal id's",
            ));
        }

        for internal_id in &self.internal_ids {
            write_address(buf, internal_id)?;
        }

        buf.write_i64(self.request_time)?;
        buf.write_i64(self.timestamp)?;

        Ok(())
    }
}

/// Sent by the client once it has processed [`ConnectionAccept`].
#[derive(Clone, Debug)]
pub struct NewConnection {
    /// The external IP Address of the server.
    pub server_address: SocketAddr,
    /// The internal IP Address of the server.
    pub system_address: Vec<SocketAddr>,
    /// The time of the timestamp the client sent with `ConnectionRequest`.
    pub request_time: i64,
    /// The time on the server.
    pub timestamp: i64,
}

impl Reader<NewConnection> for NewConnection {
    fn read(buf: &mut ByteReader) -> std::io::Result<Self> {
        let server_address = read_address(buf)?;

        let mut system_address = Vec::<SocketAddr>::new();

        for _ in 0..20 {
            if buf.as_slice().len() <= 16 {
                break;
            }
            system_address.push(read_address(buf)?);
        }

        let request_time = buf.read_i64()?;
        let timestamp = buf.read_i64()?;

        Ok(Self {
            server_address,
            system_address,
            request_time,
            timestamp,
        })
    }
}

impl Writer for NewConnection {
    fn write(&self, buf: &mut ByteWriter) -> std::io::Result<()> {
        write_address(buf, &self.server_address)?;

        if self.system_address.len() > 20 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Too many internal id's",
            ));
        }

        for system_address in &self.system_address {
            write_address(buf, system_address)?;
        }

        buf.write_i64(self.request_time)?;
        buf.write_i64(self.timestamp)?;

        Ok(())
    }
}

/// A disconnect notification, sent by either peer.
#[derive(Clone, Debug, BinaryIo)]
pub struct Disconnect {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_accept_layout() {
        let client: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let accept = OnlinePacket::ConnectionAccept(ConnectionAccept::new(client, 77, 88));
        let bytes = accept.write_to_bytes().unwrap();
        let bytes = bytes.as_slice();

        // id, client address, system index, 10 addresses, two timestamps
        assert_eq!(bytes.len(), 1 + 7 + 2 + 10 * 7 + 8 + 8);
        assert_eq!(bytes[0], CONNECTION_ACCEPT);
        assert_eq!(&bytes[8..10], &[0, 0]);
        assert_eq!(&bytes[10..17], &[4, 0x80, 0xff, 0xff, 0xfe, 0x4a, 0xbc]);
        assert_eq!(&bytes[bytes.len() - 16..bytes.len() - 8], &77i64.to_be_bytes());

        match OnlinePacket::read_from_slice(bytes).unwrap() {
            OnlinePacket::ConnectionAccept(read) => {
                assert_eq!(read.client_address, client);
                assert_eq!(read.internal_ids.len(), SYSTEM_ADDRESS_COUNT);
                assert_eq!(read.timestamp, 88);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn connection_request_without_security_byte() {
        let mut bytes = vec![CONNECTION_REQUEST];
        bytes.extend_from_slice(&5u64.to_be_bytes());
        bytes.extend_from_slice(&9i64.to_be_bytes());

        match OnlinePacket::read_from_slice(&bytes).unwrap() {
            OnlinePacket::ConnectionRequest(req) => {
                assert_eq!(req.client_id, 5);
                assert_eq!(req.time, 9);
                assert!(!req.security);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }
}
