//! This module contains all the packets that are used by the RakNet protocol.
//! This module is split into two submodules:
//! - [`offline`]: Any packet that is not sent within a [`Frame`].
//! - [`online`]: Any packet considered to be online, which is sent within a [`Frame`].
//!
//! [`offline`]: crate::protocol::packet::offline
//! [`online`]: crate::protocol::packet::online
//! [`Frame`]: crate::protocol::frame::Frame
pub mod offline;
pub mod online;

/// A utility macro that adds `From<Pk>` for the packet enum `Kind`, for every
/// listed packet `Pk` that is carried by the variant of the same name.
///
/// ```rust ignore
/// register_packets! {
///     OnlinePacket,
///     ConnectedPing,
///     // etc...
/// }
/// ```
#[macro_export]
macro_rules! register_packets {
    ($kind: ident, $($packet: ident),*) => {
        $(
            impl From<$packet> for $kind {
                fn from(packet: $packet) -> Self {
                    $kind::$packet(packet)
                }
            }
        )*
    };
}
