//! Offline packets are packets that are sent before a connection is established.
//! These packets consist of:
//! - [`UnconnectedPing`]
//! - [`UnconnectedPong`]
//! - [`OpenConnectRequest`]
//! - [`OpenConnectReply`]
//! - [`SessionInfoRequest`]
//! - [`SessionInfoReply`]
//! - [`IncompatibleProtocolVersion`]
//!
//! During this stage, the client and server are exchanging information about each other, such as
//! the server id, the client id, the mtu size, etc, to prepare for the connection handshake.
use std::net::SocketAddr;

use crate::protocol::addr::{read_address, write_address};
use crate::protocol::Magic;
use crate::protocol::RAKNET_HEADER_FRAME_OVERHEAD;
use crate::register_packets;

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};
use binary_util::BinaryIo;

pub const UNCONNECTED_PING: u8 = 0x01;
pub const UNCONNECTED_PING_OPEN_CONNECTIONS: u8 = 0x02;
pub const UNCONNECTED_PONG: u8 = 0x1c;
pub const OPEN_CONNECT_REQUEST: u8 = 0x05;
pub const OPEN_CONNECT_REPLY: u8 = 0x06;
pub const SESSION_INFO_REQUEST: u8 = 0x07;
pub const SESSION_INFO_REPLY: u8 = 0x08;
pub const INCOMPATIBLE_PROTOCOL_VERSION: u8 = 0x19;

/// Whether `id` is handled before any session exists.
pub fn is_offline_request(id: u8) -> bool {
    matches!(
        id,
        UNCONNECTED_PING
            | UNCONNECTED_PING_OPEN_CONNECTIONS
            | OPEN_CONNECT_REQUEST
            | SESSION_INFO_REQUEST
    )
}

/// This is an enum of all offline packets.
///
/// You can use this to read and write offline packets,
/// with the `binary_util` traits `Reader` and `Writer`.
#[derive(Clone, Debug, BinaryIo)]
#[repr(u8)]
pub enum OfflinePacket {
    UnconnectedPing(UnconnectedPing) = 0x01,
    /// Identical to [`UnconnectedPing`], but only answered by servers with open slots.
    UnconnectedPingOpenConnections(UnconnectedPing) = 0x02,
    UnconnectedPong(UnconnectedPong) = 0x1c,
    OpenConnectRequest(OpenConnectRequest) = 0x05,
    OpenConnectReply(OpenConnectReply) = 0x06,
    SessionInfoRequest(SessionInfoRequest) = 0x07,
    SessionInfoReply(SessionInfoReply) = 0x08,
    IncompatibleProtocolVersion(IncompatibleProtocolVersion) = 0x19,
}

register_packets! {
    OfflinePacket,
    UnconnectedPing,
    UnconnectedPong,
    OpenConnectRequest,
    OpenConnectReply,
    SessionInfoRequest,
    SessionInfoReply,
    IncompatibleProtocolVersion
}

/// Send to the other peer expecting a [`UnconnectedPong`] packet,
/// this is used to determine the latency between the client and the server,
/// and to determine if the server is online.
///
/// Bedrock clients append their guid, older clients do not.
#[derive(Debug, Clone)]
pub struct UnconnectedPing {
    pub timestamp: u64,
    pub magic: Magic,
    pub client_id: Option<u64>,
}

impl Reader<UnconnectedPing> for UnconnectedPing {
    fn read(buf: &mut ByteReader) -> Result<UnconnectedPing, std::io::Error> {
        let timestamp = buf.read_u64()?;
        let magic = buf.read_type::<Magic>()?;
        let client_id = if buf.as_slice().len() >= 8 {
            Some(buf.read_u64()?)
        } else {
            None
        };

        Ok(UnconnectedPing {
            timestamp,
            magic,
            client_id,
        })
    }
}

impl Writer for UnconnectedPing {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), std::io::Error> {
        buf.write_u64(self.timestamp)?;
        buf.write_type::<Magic>(&self.magic)?;
        if let Some(client_id) = self.client_id {
            buf.write_u64(client_id)?;
        }
        Ok(())
    }
}

/// Sent in response to a [`UnconnectedPing`] packet.
/// The payload is opaque here, Minecraft servers put a [`Motd`] string in it.
///
/// [`Motd`]: crate::protocol::mcpe::motd::Motd
#[derive(Debug, Clone)]
pub struct UnconnectedPong {
    pub timestamp: u64,
    pub server_id: u64,
    pub magic: Magic,
    pub payload: Vec<u8>,
}

impl Reader<UnconnectedPong> for UnconnectedPong {
    fn read(buf: &mut ByteReader) -> Result<UnconnectedPong, std::io::Error> {
        let timestamp = buf.read_u64()?;
        let server_id = buf.read_u64()?;
        let magic = buf.read_type::<Magic>()?;
        let mut payload = vec![0u8; buf.read_u16()? as usize];
        crate::protocol::addr::read_exact(buf, &mut payload)?;

        Ok(UnconnectedPong {
            timestamp,
            server_id,
            magic,
            payload,
        })
    }
}

impl Writer for UnconnectedPong {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), std::io::Error> {
        let len = u16::try_from(self.payload.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Pong payload too large")
        })?;

        buf.write_u64(self.timestamp)?;
        buf.write_u64(self.server_id)?;
        buf.write_type::<Magic>(&self.magic)?;
        buf.write_u16(len)?;
        buf.write(&self.payload)?;
        Ok(())
    }
}

/// This packet is the equivelant of the `OpenConnectRequest` packet in RakNet.
///
/// This packet is sent by the peer to a server to request a connection.
/// It is padded with zeros, the size of the whole datagram is how the
/// peer probes for its mtu.
#[derive(Debug, Clone)]
pub struct OpenConnectRequest {
    pub protocol: u8,
    /// The length of the datagram plus [`RAKNET_HEADER_FRAME_OVERHEAD`].
    pub mtu_size: u16,
}

impl Reader<OpenConnectRequest> for OpenConnectRequest {
    fn read(buf: &mut ByteReader) -> Result<OpenConnectRequest, std::io::Error> {
        // the packet id was already consumed
        let len = buf.as_slice().len() + 1;
        buf.read_type::<Magic>()?;
        let protocol = buf.read_u8()?;
        Ok(OpenConnectRequest {
            protocol,
            mtu_size: (len + RAKNET_HEADER_FRAME_OVERHEAD as usize).min(u16::MAX as usize)
                as u16,
        })
    }
}

impl Writer for OpenConnectRequest {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), std::io::Error> {
        buf.write_type::<Magic>(&Magic::new())?;
        buf.write_u8(self.protocol)?;
        // id, magic and protocol are 18 bytes
        let padding = (self.mtu_size as usize).saturating_sub(RAKNET_HEADER_FRAME_OVERHEAD as usize + 18);
        buf.write(&vec![0u8; padding])?;
        Ok(())
    }
}

/// This packet is sent in response to a [`OpenConnectRequest`] packet, and confirms
/// the information sent by the peer in the [`OpenConnectRequest`] packet.
#[derive(Debug, Clone, BinaryIo)]
pub struct OpenConnectReply {
    pub magic: Magic,
    pub server_id: u64,
    pub security: bool,
    pub mtu_size: u16,
}

/// This packet is sent after receiving a [`OpenConnectReply`] packet, and confirms
/// that the peer wishes to proceed with the connection.
#[derive(Debug, Clone)]
pub struct SessionInfoRequest {
    pub magic: Magic,
    /// The server address as seen by the peer.
    pub address: SocketAddr,
    /// The mtu size the peer settled on.
    pub mtu_size: u16,
    pub client_id: u64,
}

impl SessionInfoRequest {
    /// The smallest valid request, including the packet id and an IPv4 address.
    pub const MIN_SIZE: usize = 34;
}

impl Reader<SessionInfoRequest> for SessionInfoRequest {
    fn read(buf: &mut ByteReader) -> Result<SessionInfoRequest, std::io::Error> {
        Ok(SessionInfoRequest {
            magic: buf.read_type::<Magic>()?,
            address: read_address(buf)?,
            mtu_size: buf.read_u16()?,
            client_id: buf.read_u64()?,
        })
    }
}

impl Writer for SessionInfoRequest {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), std::io::Error> {
        buf.write_type::<Magic>(&self.magic)?;
        write_address(buf, &self.address)?;
        buf.write_u16(self.mtu_size)?;
        buf.write_u64(self.client_id)?;
        Ok(())
    }
}

/// This packet is sent in response to a [`SessionInfoRequest`] packet, and confirms
/// all the information sent by the peer in the [`SessionInfoRequest`] packet. This packet
/// also specifies the external address of the peer.
#[derive(Debug, Clone)]
pub struct SessionInfoReply {
    pub magic: Magic,
    pub server_id: u64,
    pub client_address: SocketAddr,
    pub mtu_size: u16,
    pub security: bool,
}

impl Reader<SessionInfoReply> for SessionInfoReply {
    fn read(buf: &mut ByteReader) -> Result<SessionInfoReply, std::io::Error> {
        Ok(SessionInfoReply {
            magic: buf.read_type::<Magic>()?,
            server_id: buf.read_u64()?,
            client_address: read_address(buf)?,
            mtu_size: buf.read_u16()?,
            security: buf.read_bool()?,
        })
    }
}

impl Writer for SessionInfoReply {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), std::io::Error> {
        buf.write_type::<Magic>(&self.magic)?;
        buf.write_u64(self.server_id)?;
        write_address(buf, &self.client_address)?;
        buf.write_u16(self.mtu_size)?;
        buf.write_bool(self.security)?;
        Ok(())
    }
}

/// This packet is sent by the server to indicate that the server does not support the
/// protocol version of the client.
#[derive(Debug, Clone, BinaryIo)]
pub struct IncompatibleProtocolVersion {
    pub protocol: u8,
    pub magic: Magic,
    pub server_id: u64,
}
