//! Home of the RakNet wire format.
//!
//! Everything in here is a pure codec: the types know how to read and write
//! themselves through `binary_util`'s [`Reader`] and [`Writer`] traits and hold
//! no session state.
//!
//! [`Reader`]: binary_util::interfaces::Reader
//! [`Writer`]: binary_util::interfaces::Writer
pub mod ack;
pub mod addr;
pub mod frame;
pub(crate) mod magic;
pub mod mcpe;
pub mod packet;
pub mod reliability;

pub use magic::*;

/// The amount of bytes the IP and UDP headers add to every datagram.
/// The client pads `OpenConnectRequest` up to its MTU minus this value.
pub const RAKNET_HEADER_FRAME_OVERHEAD: u16 = 28;

/// The largest amount of fragments a single split id may declare.
pub const MAX_FRAGS: u32 = 1024;

/// The largest datagram the listener will read off the socket.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// The payload size above which an outgoing message is fragmented.
pub const MAX_SINGLE_PAYLOAD: usize = 1400;

/// The RakNet protocol versions accepted by default.
pub const DEFAULT_PROTOCOLS: &[u8] = &[7, 8];
