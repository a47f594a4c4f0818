/// Minecraft has specific protocol for the `UnconnectedPong` packet.
/// This data is attached to the Unconnected Pong packet and is used to
/// display information about the server.
pub mod motd;

pub use self::motd::{Gamemode, Motd};
