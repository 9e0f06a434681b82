//! Bounded receive buffer
//!
//! Bytes written by the peer land here until the application reads them.
//! When full, the oldest bytes are overwritten. Loss is silent: the reader
//! only ever sees the most recent `capacity` bytes.

use alloc::boxed::Box;
use alloc::vec;

/// Fixed-capacity byte FIFO with overwrite-oldest semantics.
pub struct RingBuffer {
    storage: Box<[u8]>,
    /// Index of the oldest byte
    head: usize,
    len: usize,
    /// Bytes ever pushed, wrapping. Changes even when the buffer is saturated.
    arrivals: u32,
}

impl RingBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
            arrivals: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of bytes ready to be popped.
    pub fn available(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Wrapping count of all bytes ever pushed, including discarded ones.
    pub fn arrivals(&self) -> u32 {
        self.arrivals
    }

    /// Append `data`, evicting the oldest bytes if it does not fit.
    ///
    /// Never fails. Returns the number of bytes lost (evicted from the
    /// buffer or skipped from `data` itself).
    pub fn push(&mut self, data: &[u8]) -> usize {
        self.arrivals = self.arrivals.wrapping_add(data.len() as u32);

        let cap = self.capacity();
        if cap == 0 {
            return data.len();
        }

        // Only the newest `cap` bytes of the input can survive
        let skipped = data.len().saturating_sub(cap);
        let data = &data[skipped..];

        let evicted = (self.len + data.len()).saturating_sub(cap);
        self.head = (self.head + evicted) % cap;
        self.len -= evicted;

        let tail = (self.head + self.len) % cap;
        let first = (cap - tail).min(data.len());
        self.storage[tail..tail + first].copy_from_slice(&data[..first]);
        self.storage[..data.len() - first].copy_from_slice(&data[first..]);
        self.len += data.len();

        skipped + evicted
    }

    /// Move up to `buf.len()` of the oldest bytes into `buf`.
    ///
    /// Non-blocking; returns the number of bytes copied, possibly zero.
    pub fn pop_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.len);
        if n == 0 {
            return 0;
        }

        let cap = self.capacity();
        let first = (cap - self.head).min(n);
        buf[..first].copy_from_slice(&self.storage[self.head..self.head + first]);
        buf[first..n].copy_from_slice(&self.storage[..n - first]);

        self.head = (self.head + n) % cap;
        self.len -= n;
        n
    }

    /// Oldest byte, without consuming it.
    pub fn peek(&self) -> Option<u8> {
        if self.len == 0 {
            None
        } else {
            Some(self.storage[self.head])
        }
    }

    /// Offset of the first occurrence of `byte`, counted from the oldest byte.
    pub fn find(&self, byte: u8) -> Option<usize> {
        let cap = self.capacity();
        (0..self.len).find(|&i| self.storage[(self.head + i) % cap] == byte)
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(ring: &mut RingBuffer) -> std::vec::Vec<u8> {
        let mut out = vec![0u8; ring.available()];
        let n = ring.pop_into(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn test_push_pop_in_order() {
        let mut ring = RingBuffer::new(8);

        assert_eq!(ring.push(&[0x01, 0x02, 0x03]), 0);
        assert_eq!(ring.push(&[0x04]), 0);
        assert_eq!(ring.available(), 4);

        assert_eq!(drain(&mut ring), vec![0x01, 0x02, 0x03, 0x04]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_exact_capacity_no_loss() {
        let mut ring = RingBuffer::new(4);

        assert_eq!(ring.push(&[1, 2]), 0);
        assert_eq!(ring.push(&[3, 4]), 0);
        assert!(ring.is_full());
        assert_eq!(drain(&mut ring), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_overflow_keeps_newest() {
        let mut ring = RingBuffer::new(4);

        ring.push(&[1, 2, 3]);
        assert_eq!(ring.push(&[4, 5, 6]), 2);

        assert_eq!(ring.available(), 4);
        assert_eq!(drain(&mut ring), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_single_push_larger_than_capacity() {
        let mut ring = RingBuffer::new(3);

        ring.push(&[9]);
        assert_eq!(ring.push(&[1, 2, 3, 4, 5]), 3);

        assert_eq!(drain(&mut ring), vec![3, 4, 5]);
    }

    #[test]
    fn test_wraparound_partial_pops() {
        let mut ring = RingBuffer::new(5);

        ring.push(&[1, 2, 3, 4]);
        let mut buf = [0u8; 3];
        assert_eq!(ring.pop_into(&mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);

        // Tail wraps past the end of storage
        ring.push(&[5, 6, 7]);
        assert_eq!(ring.available(), 4);

        let mut buf = [0u8; 2];
        assert_eq!(ring.pop_into(&mut buf), 2);
        assert_eq!(buf, [4, 5]);
        assert_eq!(drain(&mut ring), vec![6, 7]);
    }

    #[test]
    fn test_pop_more_than_available() {
        let mut ring = RingBuffer::new(8);
        ring.push(&[0xAA]);

        let mut buf = [0u8; 4];
        assert_eq!(ring.pop_into(&mut buf), 1);
        assert_eq!(buf[0], 0xAA);
        assert_eq!(ring.pop_into(&mut buf), 0);
    }

    #[test]
    fn test_zero_capacity_discards() {
        let mut ring = RingBuffer::new(0);

        assert_eq!(ring.push(&[1, 2, 3]), 3);
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.arrivals(), 3);

        let mut buf = [0u8; 2];
        assert_eq!(ring.pop_into(&mut buf), 0);
        assert_eq!(ring.peek(), None);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = RingBuffer::new(4);
        assert_eq!(ring.peek(), None);

        ring.push(&[7, 8]);
        assert_eq!(ring.peek(), Some(7));
        assert_eq!(ring.available(), 2);
    }

    #[test]
    fn test_find_across_wrap() {
        let mut ring = RingBuffer::new(4);
        ring.push(&[1, 2, 3]);
        let mut buf = [0u8; 2];
        ring.pop_into(&mut buf);
        ring.push(&[b'\n', 5]);

        // Buffered: 3, '\n', 5
        assert_eq!(ring.find(b'\n'), Some(1));
        assert_eq!(ring.find(9), None);
    }

    #[test]
    fn test_arrivals_advance_when_saturated() {
        let mut ring = RingBuffer::new(2);
        ring.push(&[1, 2]);
        let before = ring.arrivals();

        ring.push(&[3]);
        assert_eq!(ring.available(), 2);
        assert_eq!(ring.arrivals(), before + 1);
    }

    #[test]
    fn test_clear() {
        let mut ring = RingBuffer::new(4);
        ring.push(&[1, 2, 3]);
        ring.clear();

        assert!(ring.is_empty());
        ring.push(&[4]);
        assert_eq!(drain(&mut ring), vec![4]);
    }
}
