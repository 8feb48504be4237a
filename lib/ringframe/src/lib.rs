//! A fixed-capacity byte arena holding header-framed records, supporting
//! FIFO drain, selective extraction with in-place tombstoning, wraparound
//! reads, and lazy reclamation.
//!
//! Frame layout (bit-exact, big-endian):
//!
//! ```text
//! byte 0-1: msg_id  (u16, 1..=65535; 0 is a tombstone)
//! byte 2-3: len     (u16, 0..=65535)
//! byte 4..4+len: payload
//! ```
//!
//! The buffer is self-contained: no clock, no allocator-free requirement
//! beyond the arena itself, no dependency on the scheduler in this
//! workspace.

#![no_std]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use byteorder::{BigEndian, ByteOrder};
use core::fmt;

/// Size in bytes of a record header (`msg_id` + `len`).
pub const HEADER_LEN: usize = 4;

/// Largest payload a single record may carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Faults that can arise constructing a [`RingBuffer`] or calling [`RingBuffer::put`].
///
/// `get`/`peek`/`pull` never return this type — an empty or absent result
/// there is a sentinel, not a fault (see their docs).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RingError {
    /// `size` passed to [`RingBuffer::new`] was smaller than 8.
    InvalidSize,
    /// `msg_id` passed to [`RingBuffer::put`] was 0 (reserved for tombstones).
    InvalidMsgId,
    /// payload passed to [`RingBuffer::put`] exceeded [`MAX_PAYLOAD_LEN`].
    PayloadTooLarge,
    /// not enough free space in the arena for the whole record.
    CapacityExhausted,
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RingError::InvalidSize => "ring size must be at least 8 bytes",
            RingError::InvalidMsgId => "msg_id must be in 1..=65535",
            RingError::PayloadTooLarge => "payload exceeds 65535 bytes",
            RingError::CapacityExhausted => "not enough space in buffer",
        };
        f.write_str(msg)
    }
}

/// A fixed-capacity framed byte ring buffer.
///
/// `head` is the next write position, `tail` the next read position, both
/// modulo `size`; `count` is the number of occupied bytes. Between `tail`
/// and `head`, following `count` bytes in order, there is always a
/// well-formed sequence of whole records (no partial trailing frame).
pub struct RingBuffer {
    buffer: Vec<u8>,
    size: usize,
    head: usize,
    tail: usize,
    count: usize,
}

impl RingBuffer {
    /// Creates an empty buffer with the given byte capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::InvalidSize`] if `size < 8`.
    pub fn new(size: usize) -> Result<Self, RingError> {
        if size < 8 {
            return Err(RingError::InvalidSize);
        }
        Ok(Self {
            buffer: vec![0u8; size],
            size,
            head: 0,
            tail: 0,
            count: 0,
        })
    }

    fn advance(&self, ptr: usize, n: usize) -> usize {
        (ptr + n) % self.size
    }

    fn space_left(&self) -> usize {
        self.size - self.count
    }

    /// Total capacity in bytes, as given to [`RingBuffer::new`].
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Number of bytes currently occupied (live records and tombstones).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.size
    }

    /// Reads the 4-byte header starting at `ptr` (which may straddle the
    /// wrap boundary) and returns `(msg_id, header_len + payload_len)`.
    fn read_header(&self, ptr: usize) -> (u16, usize) {
        let mut hdr = [0u8; HEADER_LEN];
        for (i, slot) in hdr.iter_mut().enumerate() {
            *slot = self.buffer[self.advance(ptr, i)];
        }
        let msg_id = BigEndian::read_u16(&hdr[0..2]);
        let payload_len = BigEndian::read_u16(&hdr[2..4]) as usize;
        (msg_id, HEADER_LEN + payload_len)
    }

    /// Copies `total` bytes starting at `from` (wrapping as needed) into a
    /// fresh buffer.
    fn copy_out(&self, from: usize, total: usize) -> Vec<u8> {
        let mut out = vec![0u8; total];
        let mut ptr = from;
        for slot in out.iter_mut() {
            *slot = self.buffer[ptr];
            ptr = self.advance(ptr, 1);
        }
        out
    }

    /// Appends a new record. Fails without mutating the buffer if `msg_id`
    /// is 0, the payload is oversize, or there isn't enough free space.
    pub fn put(&mut self, msg_id: u16, payload: &[u8]) -> Result<(), RingError> {
        if msg_id == 0 {
            return Err(RingError::InvalidMsgId);
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(RingError::PayloadTooLarge);
        }
        let total = HEADER_LEN + payload.len();
        if self.space_left() < total {
            return Err(RingError::CapacityExhausted);
        }

        let mut hdr = [0u8; HEADER_LEN];
        BigEndian::write_u16(&mut hdr[0..2], msg_id);
        BigEndian::write_u16(&mut hdr[2..4], payload.len() as u16);

        for &b in hdr.iter().chain(payload.iter()) {
            self.buffer[self.head] = b;
            self.head = self.advance(self.head, 1);
        }
        self.count += total;
        Ok(())
    }

    /// Consumes and returns the oldest live record, skipping and reclaiming
    /// any leading tombstones along the way.
    ///
    /// Returns `(0, empty)` if the buffer holds no live record (including
    /// the degenerate case of a malformed trailing partial frame, which is
    /// treated as empty rather than faulted).
    pub fn get(&mut self) -> (u16, Vec<u8>) {
        while self.count >= HEADER_LEN {
            let (msg_id, total) = self.read_header(self.tail);
            if self.count < total {
                return (0, Vec::new());
            }
            if msg_id != 0 {
                let mut record = self.copy_out(self.tail, total);
                self.tail = self.advance(self.tail, total);
                self.count -= total;
                return (msg_id, record.split_off(HEADER_LEN));
            }
            self.tail = self.advance(self.tail, total);
            self.count -= total;
        }
        (0, Vec::new())
    }

    /// Returns a copy of the first live record without mutating cursors,
    /// or `None` if there isn't one.
    pub fn peek(&self) -> Option<(u16, Vec<u8>)> {
        let mut scan_ptr = self.tail;
        let mut scanned = 0usize;
        while scanned < self.count {
            if self.count - scanned < HEADER_LEN {
                return None;
            }
            let (msg_id, total) = self.read_header(scan_ptr);
            if self.count - scanned < total {
                return None;
            }
            if msg_id != 0 {
                let mut record = self.copy_out(scan_ptr, total);
                return Some((msg_id, record.split_off(HEADER_LEN)));
            }
            scan_ptr = self.advance(scan_ptr, total);
            scanned += total;
        }
        None
    }

    /// Reclaims any leading tombstones at `tail`, stopping at the first
    /// live record.
    pub fn clean_up(&mut self) {
        while self.count >= HEADER_LEN {
            let (msg_id, total) = self.read_header(self.tail);
            if msg_id != 0 {
                return;
            }
            self.tail = self.advance(self.tail, total);
            self.count -= total;
        }
    }

    /// Extracts a copy of the oldest record whose id equals `wanted_id`,
    /// tombstoning it in place (overwriting its id bytes with 0) rather
    /// than shifting bytes. If the match sits at `tail`, the cursor
    /// advances past it immediately; otherwise [`RingBuffer::clean_up`]
    /// is invoked to reclaim any tombstones that are now leading.
    ///
    /// Returns `(0, empty)` if `wanted_id` is 0 or no match is found.
    pub fn pull(&mut self, wanted_id: u16) -> (u16, Vec<u8>) {
        if wanted_id == 0 {
            return (0, Vec::new());
        }
        let mut scan_ptr = self.tail;
        let mut scanned = 0usize;
        while scanned < self.count {
            if self.count - scanned < HEADER_LEN {
                break;
            }
            let id_pos = scan_ptr;
            let (msg_id, total) = self.read_header(scan_ptr);
            if self.count - scanned < total {
                break;
            }
            if msg_id == wanted_id {
                self.buffer[id_pos] = 0;
                let second_id_byte = self.advance(id_pos, 1);
                self.buffer[second_id_byte] = 0;

                let mut record = self.copy_out(scan_ptr, total);
                let payload = record.split_off(HEADER_LEN);

                if scan_ptr == self.tail {
                    self.tail = self.advance(self.tail, total);
                    self.count -= total;
                } else {
                    self.clean_up();
                }
                return (msg_id, payload);
            }
            scan_ptr = self.advance(scan_ptr, total);
            scanned += total;
        }
        (0, Vec::new())
    }

    /// Returns the ids of every live record, oldest to newest. Pure scan,
    /// no mutation.
    pub fn list(&self) -> Vec<u16> {
        let mut ids = Vec::new();
        let mut scan_ptr = self.tail;
        let mut scanned = 0usize;
        while scanned < self.count {
            if self.count - scanned < HEADER_LEN {
                break;
            }
            let (msg_id, total) = self.read_header(scan_ptr);
            if self.count - scanned < total {
                break;
            }
            if msg_id != 0 {
                ids.push(msg_id);
            }
            scan_ptr = self.advance(scan_ptr, total);
            scanned += total;
        }
        ids
    }

    /// Resets the buffer to empty. Does not zero the backing memory.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_tiny_size() {
        assert_eq!(RingBuffer::new(7).unwrap_err(), RingError::InvalidSize);
        assert!(RingBuffer::new(8).is_ok());
    }

    #[test]
    fn fifo_basic() {
        let mut r = RingBuffer::new(256).unwrap();
        r.put(1, b"Hello").unwrap();
        r.put(2, b"World").unwrap();
        assert_eq!(r.get(), (1, b"Hello".to_vec()));
        assert_eq!(r.get(), (2, b"World".to_vec()));
        assert!(r.is_empty());
    }

    #[test]
    fn put_then_get_restores_count() {
        let mut r = RingBuffer::new(64).unwrap();
        let before = r.len();
        r.put(7, b"abc").unwrap();
        assert_eq!(r.get(), (7, b"abc".to_vec()));
        assert_eq!(r.len(), before);
    }

    #[test]
    fn scenario_size32_sequence() {
        let mut r = RingBuffer::new(32).unwrap();
        r.put(1, b"12345").unwrap();
        r.put(2, b"67890").unwrap();
        assert_eq!(r.get(), (1, b"12345".to_vec()));
        r.put(3, b"ABCDE").unwrap();
        assert_eq!(r.get(), (2, b"67890".to_vec()));
        assert_eq!(r.get(), (3, b"ABCDE".to_vec()));
        assert!(r.is_empty());
    }

    #[test]
    fn wraparound_matches_nonwrapping_bytes() {
        // Force head/tail past the end of backing memory, then compare
        // against a fresh buffer that never wraps.
        let mut wrapped = RingBuffer::new(16).unwrap();
        wrapped.put(1, b"ABCDEFGH").unwrap();
        assert_eq!(wrapped.get(), (1, b"ABCDEFGH".to_vec()));
        // head/tail both sit at 12 now; this put spans the size-1 -> 0
        // boundary (12..16, then 0..8).
        wrapped.put(2, b"IJKLMNOP").unwrap();

        let mut plain = RingBuffer::new(16).unwrap();
        plain.put(2, b"IJKLMNOP").unwrap();

        assert_eq!(wrapped.get(), plain.get());
    }

    #[test]
    fn pull_extracts_oldest_match_only() {
        let mut r = RingBuffer::new(256).unwrap();
        r.put(1, b"a").unwrap();
        r.put(2, b"b").unwrap();
        r.put(3, b"c").unwrap();
        assert_eq!(r.pull(2), (2, b"b".to_vec()));
        assert_eq!(r.list(), vec![1, 3]);
    }

    #[test]
    fn pull_tombstones_and_reclaims_on_next_get() {
        let mut r = RingBuffer::new(256).unwrap();
        r.put(1, b"a").unwrap();
        r.put(2, b"b").unwrap();
        r.put(2, b"c").unwrap();
        // Extracts the *first* match; the second id=2 record survives.
        assert_eq!(r.pull(2), (2, b"b".to_vec()));
        assert_eq!(r.list(), vec![1, 2]);
        assert_eq!(r.get(), (1, b"a".to_vec()));
        assert_eq!(r.get(), (2, b"c".to_vec()));
    }

    #[test]
    fn pull_at_tail_advances_tail_directly() {
        let mut r = RingBuffer::new(256).unwrap();
        r.put(1, b"a").unwrap();
        r.put(2, b"b").unwrap();
        let before = r.len();
        assert_eq!(r.pull(1), (1, b"a".to_vec()));
        assert_eq!(r.len(), before - 5);
        assert_eq!(r.list(), vec![2]);
    }

    #[test]
    fn pull_missing_or_zero_id_is_sentinel() {
        let mut r = RingBuffer::new(64).unwrap();
        r.put(1, b"a").unwrap();
        assert_eq!(r.pull(0), (0, Vec::new()));
        assert_eq!(r.pull(99), (0, Vec::new()));
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut r = RingBuffer::new(64).unwrap();
        r.put(5, b"xyz").unwrap();
        let before = r.len();
        assert_eq!(r.peek(), Some((5, b"xyz".to_vec())));
        assert_eq!(r.peek(), Some((5, b"xyz".to_vec())));
        assert_eq!(r.len(), before);
    }

    #[test]
    fn put_rejects_reserved_id_and_oversize_payload() {
        let mut r = RingBuffer::new(64).unwrap();
        assert_eq!(r.put(0, b"x").unwrap_err(), RingError::InvalidMsgId);
        let huge = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(r.put(1, &huge).unwrap_err(), RingError::PayloadTooLarge);
    }

    #[test]
    fn put_rejects_insufficient_space() {
        let mut r = RingBuffer::new(8).unwrap();
        assert_eq!(r.put(1, b"abcd").unwrap_err(), RingError::CapacityExhausted);
        assert!(r.is_empty());
    }

    #[test]
    fn is_full_and_is_empty_track_count() {
        let mut r = RingBuffer::new(8).unwrap();
        assert!(r.is_empty());
        r.put(1, b"1234").unwrap();
        assert!(r.is_full());
        assert!(!r.is_empty());
        r.get();
        assert!(r.is_empty());
    }

    #[test]
    fn clear_resets_cursors() {
        let mut r = RingBuffer::new(32).unwrap();
        r.put(1, b"abc").unwrap();
        r.clear();
        assert!(r.is_empty());
        assert_eq!(r.list(), Vec::<u16>::new());
        // Buffer is fully usable again after clear.
        r.put(2, b"xyz").unwrap();
        assert_eq!(r.get(), (2, b"xyz".to_vec()));
    }

    #[test]
    fn get_on_empty_is_sentinel() {
        let mut r = RingBuffer::new(16).unwrap();
        assert_eq!(r.get(), (0, Vec::new()));
    }
}
