//! The RakNet system address encoding.
//!
//! IPv4 addresses are a version byte (`4`), the four octets bitwise inverted
//! and a big endian port. IPv6 addresses are a version byte (`6`) followed by a
//! serialized `sockaddr_in6`: little endian family, big endian port, flow info,
//! the sixteen octets and the scope id.
use std::io::{Error, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use binary_util::io::{ByteReader, ByteWriter};

/// `AF_INET6` as written by the reference RakNet implementation.
const AF_INET6: u16 = 23;

/// The filler address written into `ConnectionAccept` system address slots.
pub const LOOPBACK_SYSTEM_ADDRESS: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 19132));

/// Reads a RakNet encoded address.
pub fn read_address(buf: &mut ByteReader) -> Result<SocketAddr, Error> {
    match buf.read_u8()? {
        4 => {
            let mut octets = [0u8; 4];
            read_exact(buf, &mut octets)?;
            let port = buf.read_u16()?;
            let octets = octets.map(|b| !b);
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        6 => {
            let _family = buf.read_u16_le()?;
            let port = buf.read_u16()?;
            let flow_info = buf.read_u32()?;
            let mut octets = [0u8; 16];
            read_exact(buf, &mut octets)?;
            let scope_id = buf.read_u32()?;
            Ok(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(octets),
                port,
                flow_info,
                scope_id,
            )))
        }
        version => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Unknown address version {}", version),
        )),
    }
}

/// Writes a RakNet encoded address.
pub fn write_address(buf: &mut ByteWriter, address: &SocketAddr) -> Result<(), Error> {
    match address {
        SocketAddr::V4(v4) => {
            buf.write_u8(4)?;
            buf.write(&v4.ip().octets().map(|b| !b))?;
            buf.write_u16(v4.port())?;
        }
        SocketAddr::V6(v6) => {
            buf.write_u8(6)?;
            buf.write_u16_le(AF_INET6)?;
            buf.write_u16(v6.port())?;
            buf.write_u32(v6.flowinfo())?;
            buf.write(&v6.ip().octets())?;
            buf.write_u32(v6.scope_id())?;
        }
    }
    Ok(())
}

/// Fills `out` completely or fails with `UnexpectedEof`.
pub(crate) fn read_exact(buf: &mut ByteReader, out: &mut [u8]) -> Result<(), Error> {
    if buf.as_slice().len() < out.len() {
        return Err(Error::new(ErrorKind::UnexpectedEof, "Not enough data"));
    }
    buf.read(out)?;
    Ok(())
}
