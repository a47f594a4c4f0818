use binary_util::interfaces::Writer;

use crate::protocol::frame::{FragmentMeta, Frame, FramePacket};
use crate::protocol::reliability::Reliability;
use crate::protocol::{MAX_FRAGS, MAX_SINGLE_PAYLOAD, RAKNET_HEADER_FRAME_OVERHEAD};
use crate::rakrs_debug;
use crate::util::TriadCounter;

/// Datagram header (id and sequence) plus a reliable frame header with the
/// split fields, the most a single outgoing frame adds on top of its body.
const FRAME_OVERHEAD: usize = 4 + 6 + 10;

/// The smallest fragment we are willing to produce for a tiny mtu.
const MIN_FRAGMENT_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendQueueError {
    /// The payload needs more fragments than a peer will accept.
    PacketTooLarge,
    /// A frame could not be encoded.
    Encode,
}

impl std::fmt::Display for SendQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SendQueueError::PacketTooLarge => "Packet too large",
                SendQueueError::Encode => "Failed to encode frame",
            }
        )
    }
}

impl std::error::Error for SendQueueError {}

/// The sending half of a connection's reliability layer.
///
/// Every payload is framed as [`Reliability::Reliable`]. Each outgoing
/// datagram carries exactly one frame and consumes its own datagram sequence
/// number and reliable message index. Nothing is kept for retransmission.
#[derive(Debug, Clone)]
pub struct SendQueue {
    /// The mtu negotiated during the handshake, including IP and UDP headers.
    mtu_size: u16,

    /// The configured upper bound for a single frame body.
    max_payload: usize,

    /// The current datagram sequence number.
    send_seq: TriadCounter,

    /// The current reliable index number.
    reliable_seq: TriadCounter,

    /// The split id given to the next fragmented payload.
    fragment_id: u16,
}

impl SendQueue {
    pub fn new(mtu_size: u16, max_payload: usize) -> Self {
        Self {
            mtu_size,
            max_payload,
            send_seq: TriadCounter::new(),
            reliable_seq: TriadCounter::new(),
            fragment_id: 0,
        }
    }

    /// The largest body a single frame carries before the payload is split.
    ///
    /// This is the configured maximum, lowered when the negotiated mtu could
    /// not carry it.
    pub fn fragment_size(&self) -> usize {
        let usable = (self.mtu_size as usize)
            .saturating_sub(RAKNET_HEADER_FRAME_OVERHEAD as usize + FRAME_OVERHEAD);
        // the frame length is written in bits
        self.max_payload
            .min(usable)
            .min(u16::MAX as usize / 8)
            .max(MIN_FRAGMENT_SIZE)
    }

    /// Frames `payload` into datagrams, splitting it when it is larger than
    /// [`SendQueue::fragment_size`].
    pub fn packets(&mut self, payload: &[u8]) -> Result<Vec<FramePacket>, SendQueueError> {
        let size = self.fragment_size();

        if payload.len() <= size {
            let frame = Frame::new(Reliability::Reliable, Some(payload))
                .with_reliable_index(self.reliable_seq.next());
            return Ok(vec![self.datagram(frame)]);
        }

        let count = payload.len().div_ceil(size);
        if count > MAX_FRAGS as usize {
            return Err(SendQueueError::PacketTooLarge);
        }

        let id = self.fragment_id;
        self.fragment_id = self.fragment_id.wrapping_add(1);

        rakrs_debug!(
            "Splitting {} bytes into {} fragments with split id {}",
            payload.len(),
            count,
            id
        );

        let mut packets = Vec::with_capacity(count);
        for (index, chunk) in payload.chunks(size).enumerate() {
            let frame = Frame::new(Reliability::Reliable, Some(chunk))
                .with_reliable_index(self.reliable_seq.next())
                .with_meta(FragmentMeta::new(count as u32, id, index as u32));
            packets.push(self.datagram(frame));
        }

        Ok(packets)
    }

    /// Frames `payload` and encodes every datagram, ready for the socket.
    pub fn encode(&mut self, payload: &[u8]) -> Result<Vec<Vec<u8>>, SendQueueError> {
        self.packets(payload)?
            .iter()
            .map(|packet| {
                packet
                    .write_to_bytes()
                    .map(|buf| buf.as_slice().to_vec())
                    .map_err(|_| SendQueueError::Encode)
            })
            .collect()
    }

    /// The sequence number the next datagram will use.
    pub fn next_seq(&self) -> u32 {
        self.send_seq.peek()
    }

    fn datagram(&mut self, frame: Frame) -> FramePacket {
        let mut packet = FramePacket::new(self.send_seq.next());
        packet.frames.push(frame);
        packet
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new(1492, MAX_SINGLE_PAYLOAD)
    }
}
