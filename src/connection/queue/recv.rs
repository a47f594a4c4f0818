use std::collections::HashSet;
use std::time::Instant;

use crate::connection::controller::window::ReliableWindow;
use crate::protocol::frame::{Frame, FramePacket};
use crate::rakrs_debug;

use super::FragmentQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvQueueError {
    /// The datagram sequence was already received. It is still acknowledged.
    OldSeq,
}

impl std::fmt::Display for RecvQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvQueueError::OldSeq => write!(f, "Duplicate datagram sequence"),
        }
    }
}

impl std::error::Error for RecvQueueError {}

/// The receiving half of a connection's reliability layer.
///
/// Every datagram is queued for acknowledgement, duplicates are filtered by
/// sequence number and by reliable message index, and fragments are
/// reassembled before the payload is handed back.
#[derive(Debug, Clone)]
pub struct RecvQueue {
    frag_queue: FragmentQueue,
    pub(crate) window: ReliableWindow,
    pub(crate) reliable_window: ReliableWindow,
    /// Set of sequences that we've acknowledged.
    ack: HashSet<u32>,
}

impl RecvQueue {
    pub fn new() -> Self {
        Self::with_fragments(FragmentQueue::new())
    }

    pub fn with_fragments(frag_queue: FragmentQueue) -> Self {
        Self {
            frag_queue,
            window: ReliableWindow::new(),
            reliable_window: ReliableWindow::new(),
            ack: HashSet::new(),
        }
    }

    /// Inserts a datagram, returning every payload it completes in frame order.
    pub fn insert(
        &mut self,
        packet: FramePacket,
        now: Instant,
    ) -> Result<Vec<Vec<u8>>, RecvQueueError> {
        self.ack.insert(packet.sequence);

        if !self.window.insert(packet.sequence) {
            return Err(RecvQueueError::OldSeq);
        }

        for id in self.frag_queue.prune(now) {
            rakrs_debug!("Dropped incomplete split message {}", id);
        }

        let mut ready = Vec::new();
        for frame in packet.frames.iter() {
            if let Some(payload) = self.handle_frame(frame, now) {
                ready.push(payload);
            }
        }

        Ok(ready)
    }

    /// Drains the sequences waiting to be acknowledged.
    pub fn ack_flush(&mut self) -> Vec<u32> {
        self.ack.drain().collect()
    }

    fn handle_frame(&mut self, frame: &Frame, now: Instant) -> Option<Vec<u8>> {
        if let Some(reliable_index) = frame.reliable_index {
            if !self.reliable_window.insert(reliable_index) {
                rakrs_debug!(true, "Dropping duplicate reliable frame {}", reliable_index);
                return None;
            }
        }

        if let Some(meta) = frame.fragment_meta {
            return match self.frag_queue.insert(meta, &frame.body, now) {
                Ok(Some(payload)) if !payload.is_empty() => Some(payload),
                Ok(_) => None,
                Err(e) => {
                    rakrs_debug!("Rejected fragment {:?}: {}", meta, e);
                    None
                }
            };
        }

        if frame.body.is_empty() {
            return None;
        }

        Some(frame.body.clone())
    }
}

impl Default for RecvQueue {
    fn default() -> Self {
        Self::new()
    }
}
