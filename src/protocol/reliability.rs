/// The reliability of a [`Frame`], stored in the top three bits of its flags.
///
/// Only [`Reliability::Reliable`] is produced by this crate, every other
/// variant is decoded so its header fields are consumed correctly.
///
/// [`Frame`]: crate::protocol::frame::Frame
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reliability {
    /// Unreliable (with no ack)
    Unreliable = 0,
    /// Unreliable with a sequence
    UnreliableSeq,
    /// Reliable
    Reliable,
    ReliableOrd,
    /// Reliably sequenced **AND** ordered
    ReliableSeq,
    /// never used over the wire
    UnreliableAck,
    /// never used over the wire
    ReliableAck,
    /// never used over the wire
    ReliableOrdAck,
}

impl Reliability {
    pub fn from_flags(flags: u8) -> Self {
        match (flags & 0xe0) >> 5 {
            0 => Reliability::Unreliable,
            1 => Reliability::UnreliableSeq,
            2 => Reliability::Reliable,
            3 => Reliability::ReliableOrd,
            4 => Reliability::ReliableSeq,
            5 => Reliability::UnreliableAck,
            6 => Reliability::ReliableAck,
            _ => Reliability::ReliableOrdAck,
        }
    }

    pub fn to_flags(&self) -> u8 {
        (*self as u8) << 5
    }

    /// Whether a reliable message index follows the frame header.
    pub fn is_reliable(&self) -> bool {
        matches!(
            self,
            Self::Reliable
                | Self::ReliableOrd
                | Self::ReliableSeq
                | Self::ReliableAck
                | Self::ReliableOrdAck
        )
    }

    /// Whether a sequence index follows the frame header.
    pub fn is_sequenced(&self) -> bool {
        matches!(self, Self::UnreliableSeq | Self::ReliableSeq)
    }

    /// Whether an order index and order channel follow the frame header.
    pub fn is_sequenced_or_ordered(&self) -> bool {
        matches!(
            self,
            Self::UnreliableSeq | Self::ReliableSeq | Self::ReliableOrd | Self::ReliableOrdAck
        )
    }
}
