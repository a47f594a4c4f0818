pub(crate) mod recv;
pub(crate) mod send;

pub use self::recv::*;
pub use self::send::*;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::protocol::frame::FragmentMeta;
use crate::protocol::MAX_FRAGS;
use crate::rakrs_debug;

/// The default number of split messages a connection reassembles at once.
pub const MAX_CONCURRENT_SPLITS: usize = 64;

/// The default time a partially received split message is kept.
pub const SPLIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct FragmentEntry {
    parts: Vec<Option<Vec<u8>>>,
    received: usize,
    last_update: Instant,
}

/// A specialized structure for reassembling fragments received over the wire.
///
/// Fragments may arrive in any order. Nothing is emitted until every index of
/// a split id is present, then the bodies are concatenated in index order.
#[derive(Debug, Clone)]
pub struct FragmentQueue {
    /// Hashmap is by Fragment id
    fragments: HashMap<u16, FragmentEntry>,
    max_parts: u32,
    max_concurrent: usize,
    timeout: Duration,
}

impl FragmentQueue {
    pub fn new() -> Self {
        Self::with_limits(MAX_FRAGS, MAX_CONCURRENT_SPLITS, SPLIT_TIMEOUT)
    }

    pub fn with_limits(max_parts: u32, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            fragments: HashMap::new(),
            max_parts,
            max_concurrent,
            timeout,
        }
    }

    /// Inserts the fragment `body` described by `meta`.
    ///
    /// Returns the reassembled message once the last missing fragment arrives.
    /// A duplicate index is ignored, the first copy is kept.
    pub fn insert(
        &mut self,
        meta: FragmentMeta,
        body: &[u8],
        now: Instant,
    ) -> Result<Option<Vec<u8>>, FragmentQueueError> {
        if meta.size == 0 {
            return Err(FragmentQueueError::FragmentInvalid);
        }

        if meta.size > self.max_parts {
            return Err(FragmentQueueError::TooManyFragments);
        }

        if meta.index >= meta.size {
            return Err(FragmentQueueError::FrameIndexOutOfBounds);
        }

        if self.fragments.len() >= self.max_concurrent && !self.fragments.contains_key(&meta.id) {
            return Err(FragmentQueueError::QueueFull);
        }

        let entry = self
            .fragments
            .entry(meta.id)
            .or_insert_with(|| FragmentEntry {
                parts: vec![None; meta.size as usize],
                received: 0,
                last_update: now,
            });

        if entry.parts.len() != meta.size as usize {
            return Err(FragmentQueueError::SizeMismatch);
        }

        let slot = &mut entry.parts[meta.index as usize];
        if slot.is_some() {
            rakrs_debug!(
                true,
                "Duplicate fragment {} of split {}, keeping the first copy",
                meta.index,
                meta.id
            );
            return Ok(None);
        }

        *slot = Some(body.to_vec());
        entry.received += 1;
        entry.last_update = now;

        if entry.received != entry.parts.len() {
            return Ok(None);
        }

        let Some(entry) = self.fragments.remove(&meta.id) else {
            return Ok(None);
        };

        let mut buffer = Vec::<u8>::new();
        for part in entry.parts.into_iter().flatten() {
            buffer.extend_from_slice(&part);
        }
        Ok(Some(buffer))
    }

    /// Drops split messages that have not seen a fragment within the timeout.
    /// Returns the ids that were dropped.
    pub fn prune(&mut self, now: Instant) -> Vec<u16> {
        let mut dropped = Vec::new();
        let timeout = self.timeout;
        self.fragments.retain(|id, entry| {
            if now.saturating_duration_since(entry.last_update) >= timeout {
                dropped.push(*id);
                false
            } else {
                true
            }
        });
        dropped
    }

    /// The number of split messages currently being reassembled.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// This will hard clear the fragment queue.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }
}

impl Default for FragmentQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentQueueError {
    /// The fragment claims zero parts.
    FragmentInvalid,
    /// The fragment index is not below the fragment count.
    FrameIndexOutOfBounds,
    /// The fragment count is above the configured maximum.
    TooManyFragments,
    /// Too many split messages are being reassembled at once.
    QueueFull,
    /// The fragment count disagrees with earlier fragments of the same id.
    SizeMismatch,
}

impl std::fmt::Display for FragmentQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FragmentQueueError::FragmentInvalid => "Fragment count is zero",
                FragmentQueueError::FrameIndexOutOfBounds => "Fragment index out of bounds",
                FragmentQueueError::TooManyFragments => "Too many fragments",
                FragmentQueueError::QueueFull => "Too many split messages in flight",
                FragmentQueueError::SizeMismatch => "Fragment count mismatch",
            }
        )
    }
}

impl std::error::Error for FragmentQueueError {}
