//! Bounded receive buffer.
//!
//! Holds unconsumed inbound bytes.  On overflow the contents are dropped
//! rather than grown: losing a partial frame is recoverable, a corrupted
//! stream is not.

use heapless::Vec;

use crate::config::RX_BUFFER_CAPACITY;

pub struct RxBuffer<const N: usize = RX_BUFFER_CAPACITY> {
    buf: Vec<u8, N>,
}

impl<const N: usize> RxBuffer<N> {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append `data`.  Returns `true` if the buffer had to be cleared
    /// first.  Chunks larger than the whole buffer keep only their tail.
    pub fn append(&mut self, data: &[u8]) -> bool {
        let overflow = self.buf.len() + data.len() > N;
        if overflow {
            self.buf.clear();
        }
        let data = &data[data.len().saturating_sub(N)..];
        // Room was made above.
        let _ = self.buf.extend_from_slice(data);
        overflow
    }

    /// Drop `n` bytes from the front.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        let len = self.buf.len();
        self.buf.copy_within(n..len, 0);
        self.buf.truncate(len - n);
    }

    /// Offset of the first `marker` pair, if any.
    pub fn find(&self, marker: [u8; 2]) -> Option<usize> {
        self.buf.windows(2).position(|w| w == marker)
    }
}

impl<const N: usize> Default for RxBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_consume() {
        let mut rx: RxBuffer<8> = RxBuffer::new();
        assert!(!rx.append(&[1, 2, 3]));
        assert!(!rx.append(&[4, 5]));
        assert_eq!(rx.as_slice(), &[1, 2, 3, 4, 5]);
        rx.consume(2);
        assert_eq!(rx.as_slice(), &[3, 4, 5]);
        rx.consume(10);
        assert!(rx.is_empty());
    }

    #[test]
    fn overflow_clears_before_append() {
        let mut rx: RxBuffer<8> = RxBuffer::new();
        rx.append(&[1, 2, 3, 4, 5, 6]);
        assert!(rx.append(&[7, 8, 9]));
        assert_eq!(rx.as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn oversize_chunk_keeps_tail() {
        let mut rx: RxBuffer<4> = RxBuffer::new();
        assert!(rx.append(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(rx.as_slice(), &[3, 4, 5, 6]);
        assert_eq!(rx.len(), rx.capacity());
    }

    #[test]
    fn consume_keeps_order_after_partial_drop() {
        let mut rx: RxBuffer<6> = RxBuffer::new();
        rx.append(&[9, 9, 1, 2]);
        rx.consume(2);
        assert!(!rx.append(&[3, 4, 5]));
        assert_eq!(rx.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn find_marker() {
        let mut rx: RxBuffer<8> = RxBuffer::new();
        rx.append(&[0x00, 0x55, 0x01, 0x55, 0x55]);
        assert_eq!(rx.find([0x55, 0x55]), Some(3));
        rx.clear();
        rx.append(&[0x55]);
        assert_eq!(rx.find([0x55, 0x55]), None);
    }
}
