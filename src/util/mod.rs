pub(crate) mod debug;

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// The largest value a RakNet "triad" (24 bit integer) can hold.
pub const U24_MAX: u32 = 0x00ff_ffff;

/// A counter over the 24 bit space RakNet uses for datagram sequence numbers
/// and reliable message indexes.
///
/// ```rust
/// use bedrock_rak::util::TriadCounter;
///
/// let mut counter = TriadCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.peek(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TriadCounter(u32);

impl TriadCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Returns the current value and advances the counter,
    /// wrapping back to 0 after [`U24_MAX`].
    pub fn next(&mut self) -> u32 {
        let current = self.0;
        self.0 = (self.0 + 1) & U24_MAX;
        current
    }

    /// The value the next call to [`TriadCounter::next`] will return.
    pub fn peek(&self) -> u32 {
        self.0
    }
}

/// Returns `true` when `a` comes after `b` in 24 bit serial number arithmetic.
pub fn triad_after(a: u32, b: u32) -> bool {
    let distance = a.wrapping_sub(b) & U24_MAX;
    distance != 0 && distance < (U24_MAX + 1) / 2
}

/// Current unix time in seconds.
pub(crate) fn current_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Current unix time in milliseconds, used for ping timestamps.
pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Formats an address for log lines.
pub(crate) fn to_address_token(remote: SocketAddr) -> String {
    format!("{}:{}", remote.ip(), remote.port())
}
