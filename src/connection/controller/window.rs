use std::collections::HashSet;

use crate::util::{triad_after, U24_MAX};

/// The number of sequence numbers tracked ahead of the window start.
pub const RECEIVE_WINDOW_SIZE: u32 = 2048;

/// Tracks which datagram sequence numbers have been seen so duplicates can
/// be acknowledged without being delivered twice.
///
/// Everything before `start` has been received (or given up on). Sequence
/// numbers between `start` and `start + size` that arrived early are kept in
/// `received` until the gap before them closes.
#[derive(Debug, Clone)]
pub struct ReliableWindow {
    start: u32,
    size: u32,
    received: HashSet<u32>,
}

impl ReliableWindow {
    pub fn new() -> Self {
        Self::with_size(RECEIVE_WINDOW_SIZE)
    }

    pub fn with_size(size: u32) -> Self {
        Self {
            start: 0,
            size: size.max(1),
            received: HashSet::new(),
        }
    }

    /// Records `index`, returning `false` if it was already seen.
    pub fn insert(&mut self, index: u32) -> bool {
        let index = index & U24_MAX;

        if triad_after(self.start, index) || self.received.contains(&index) {
            return false;
        }

        // a jump past the end of the window gives up on the oldest gap
        let distance = index.wrapping_sub(self.start) & U24_MAX;
        if distance >= self.size {
            let new_start = index.wrapping_sub(self.size - 1) & U24_MAX;
            self.received.retain(|seq| !triad_after(new_start, *seq));
            self.start = new_start;
        }

        self.received.insert(index);
        self.adjust();
        true
    }

    /// Slides the window start over every contiguous received index.
    fn adjust(&mut self) {
        while self.received.remove(&self.start) {
            self.start = (self.start + 1) & U24_MAX;
        }
    }

    /// The lowest index that has not been received yet.
    pub fn start(&self) -> u32 {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_rejected() {
        let mut window = ReliableWindow::new();
        assert!(window.insert(0));
        assert!(window.insert(1));
        assert!(!window.insert(0));
        assert!(!window.insert(1));
        assert_eq!(window.start(), 2);
    }

    #[test]
    fn out_of_order_arrivals_close_the_gap() {
        let mut window = ReliableWindow::new();
        assert!(window.insert(2));
        assert!(window.insert(0));
        assert_eq!(window.start(), 1);
        assert!(!window.insert(2));
        assert!(window.insert(1));
        assert_eq!(window.start(), 3);
    }

    #[test]
    fn large_jumps_slide_the_window() {
        let mut window = ReliableWindow::with_size(4);
        assert!(window.insert(10));
        assert_eq!(window.start(), 7);
        assert!(!window.insert(3));
        assert!(window.insert(7));
    }

    #[test]
    fn wraps_at_24_bits() {
        let mut window = ReliableWindow {
            start: U24_MAX - 2,
            size: 8,
            received: HashSet::new(),
        };
        assert!(window.insert(U24_MAX));
        assert!(window.insert(U24_MAX - 2));
        assert!(window.insert(U24_MAX - 1));
        assert_eq!(window.start(), 0);
        assert!(window.insert(0));
        assert!(!window.insert(U24_MAX));
    }
}
