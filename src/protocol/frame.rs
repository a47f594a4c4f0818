//! Frames (encapsulated packets) and the datagrams that carry them.
//!
//! A [`FramePacket`] is one "custom data" datagram: a packet id in
//! `0x80..=0x8f`, a little endian 24 bit sequence number, then one or more
//! [`Frame`]s back to back until the datagram ends.
use std::io::{Error, ErrorKind};

use binary_util::interfaces::{Reader, Writer};
use binary_util::io::{ByteReader, ByteWriter};

use super::addr::read_exact;
use super::reliability::Reliability;
use crate::rakrs_debug;

/// The packet id written on every outgoing datagram.
/// `0x80` marks a valid datagram, `0x04` asks the peer to track arrival rate.
pub const DATAGRAM_ID: u8 = 0x84;

/// Set in a frame's flags when the frame is a fragment of a larger message.
pub const SPLIT_FLAG: u8 = 0x10;

/// Whether `id` is within the "custom data" range used by datagrams.
pub fn is_datagram(id: u8) -> bool {
    (0x80..=0x8f).contains(&id)
}

/// The information for the given fragment.
/// This is used to determine how to reassemble the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentMeta {
    /// The total number of fragments in this frame.
    pub size: u32,
    /// The split id shared by every fragment of one message.
    pub id: u16,
    /// The index of the fragment.
    pub index: u32,
}

impl FragmentMeta {
    pub fn new(size: u32, id: u16, index: u32) -> Self {
        Self { size, id, index }
    }
}

/// An individual encapsulated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub reliability: Reliability,
    /// The reliable message index, present when the reliability is reliable.
    pub reliable_index: Option<u32>,
    /// The sequence index, present when the reliability is sequenced.
    pub sequence_index: Option<u32>,
    /// The order index, present when the reliability is ordered or sequenced.
    pub order_index: Option<u32>,
    /// The order channel, present alongside `order_index`.
    pub order_channel: Option<u8>,
    /// Present when this frame is one fragment of a split message.
    pub fragment_meta: Option<FragmentMeta>,
    pub body: Vec<u8>,
}

impl Frame {
    /// Creates a frame with the given reliability and body.
    /// Every index implied by `reliability` is initialized to zero.
    pub fn new(reliability: Reliability, body: Option<&[u8]>) -> Self {
        Self {
            reliability,
            reliable_index: reliability.is_reliable().then_some(0),
            sequence_index: reliability.is_sequenced().then_some(0),
            order_index: reliability.is_sequenced_or_ordered().then_some(0),
            order_channel: reliability.is_sequenced_or_ordered().then_some(0),
            fragment_meta: None,
            body: body.map(|b| b.to_vec()).unwrap_or_default(),
        }
    }

    pub fn with_meta(mut self, meta: FragmentMeta) -> Self {
        self.fragment_meta = Some(meta);
        self
    }

    pub fn with_reliable_index(mut self, index: u32) -> Self {
        self.reliable_index = Some(index);
        self
    }

    /// Whether or not the frame is fragmented.
    pub fn is_fragmented(&self) -> bool {
        self.fragment_meta.is_some()
    }

    fn flags(&self) -> u8 {
        let mut flags = self.reliability.to_flags();
        if self.is_fragmented() {
            flags |= SPLIT_FLAG;
        }
        flags
    }
}

impl Reader<Frame> for Frame {
    fn read(buf: &mut ByteReader) -> Result<Frame, Error> {
        let flags = buf.read_u8()?;
        let reliability = Reliability::from_flags(flags);

        // the length is sent in bits
        let size = (buf.read_u16()? as usize + 7) / 8;

        let reliable_index = if reliability.is_reliable() {
            Some(buf.read_u24_le()?)
        } else {
            None
        };

        let sequence_index = if reliability.is_sequenced() {
            Some(buf.read_u24_le()?)
        } else {
            None
        };

        let (order_index, order_channel) = if reliability.is_sequenced_or_ordered() {
            (Some(buf.read_u24_le()?), Some(buf.read_u8()?))
        } else {
            (None, None)
        };

        let fragment_meta = if flags & SPLIT_FLAG != 0 {
            Some(FragmentMeta {
                size: buf.read_u32()?,
                id: buf.read_u16()?,
                index: buf.read_u32()?,
            })
        } else {
            None
        };

        let mut body = vec![0u8; size];
        read_exact(buf, &mut body)?;

        Ok(Frame {
            reliability,
            reliable_index,
            sequence_index,
            order_index,
            order_channel,
            fragment_meta,
            body,
        })
    }
}

impl Writer for Frame {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), Error> {
        let bits = self
            .body
            .len()
            .checked_mul(8)
            .and_then(|bits| u16::try_from(bits).ok())
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Frame body too large"))?;

        buf.write_u8(self.flags())?;
        buf.write_u16(bits)?;

        if self.reliability.is_reliable() {
            buf.write_u24_le(self.reliable_index.unwrap_or(0))?;
        }

        if self.reliability.is_sequenced() {
            buf.write_u24_le(self.sequence_index.unwrap_or(0))?;
        }

        if self.reliability.is_sequenced_or_ordered() {
            buf.write_u24_le(self.order_index.unwrap_or(0))?;
            buf.write_u8(self.order_channel.unwrap_or(0))?;
        }

        if let Some(meta) = self.fragment_meta.as_ref() {
            buf.write_u32(meta.size)?;
            buf.write_u16(meta.id)?;
            buf.write_u32(meta.index)?;
        }

        buf.write(&self.body)?;
        Ok(())
    }
}

/// A "custom data" datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePacket {
    /// The datagram sequence number, acknowledged by the peer.
    /// This is sized check to 24 bits.
    pub sequence: u32,
    pub frames: Vec<Frame>,
}

impl FramePacket {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            frames: Vec::new(),
        }
    }
}

impl Reader<FramePacket> for FramePacket {
    /// Frames are read until the datagram is exhausted. A frame that fails to
    /// decode ends the datagram; the frames before it are kept.
    fn read(buf: &mut ByteReader) -> Result<FramePacket, Error> {
        let id = buf.read_u8()?;
        if !is_datagram(id) {
            return Err(Error::new(ErrorKind::InvalidData, "Not a datagram"));
        }

        let sequence = buf.read_u24_le()?;
        let mut frames = Vec::new();

        while !buf.as_slice().is_empty() {
            match Frame::read(buf) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    rakrs_debug!(
                        true,
                        "Datagram {} truncated after {} frames: {}",
                        sequence,
                        frames.len(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(FramePacket { sequence, frames })
    }
}

impl Writer for FramePacket {
    fn write(&self, buf: &mut ByteWriter) -> Result<(), Error> {
        buf.write_u8(DATAGRAM_ID)?;
        buf.write_u24_le(self.sequence)?;
        for frame in self.frames.iter() {
            frame.write(buf)?;
        }
        Ok(())
    }
}
