//! Byte offsets of the three regions of a table file.
//!
//! ```text
//! [0 .. H)                          header
//! [H .. H + S)                      slot 0, reserved, never holds data
//! [H + S .. H + S * (N + 1))        slots 1..=N: next | key | value
//! [H + S * (N + 1) .. file_size)    B bucket heads
//! ```
//!
//! Every offset is derived from the header alone, so creating a table and
//! reopening it always agree on where things live.

use std::ops::Range;

use crate::header::{HEADER_SIZE, Header};

/// Width of the `next` link at the start of each slot.
pub const LINK_SIZE: usize = 8;

/// Width of one bucket head.
pub const BUCKET_ENTRY_SIZE: usize = 8;

/// Offsets and widths derived from a [`Header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub node_capacity: u64,
    pub bucket_count: u64,
    pub key_size: usize,
    pub value_size: usize,
    pub slot_size: usize,
    pub arena_offset: usize,
    pub bucket_offset: usize,
    pub file_size: usize,
}

impl Geometry {
    /// Computes the layout for `header`, `None` if any offset overflows.
    pub fn from_header(header: &Header) -> Option<Self> {
        let key_size = usize::try_from(header.key_size).ok()?;
        let value_size = usize::try_from(header.value_size).ok()?;
        let capacity = usize::try_from(header.node_capacity).ok()?;
        let buckets = usize::try_from(header.bucket_count).ok()?;

        let slot_size = LINK_SIZE.checked_add(key_size)?.checked_add(value_size)?;
        let arena_offset = HEADER_SIZE;
        let arena_len = slot_size.checked_mul(capacity.checked_add(1)?)?;
        let bucket_offset = arena_offset.checked_add(arena_len)?;
        let file_size = bucket_offset.checked_add(BUCKET_ENTRY_SIZE.checked_mul(buckets)?)?;

        // offsets must also fit the u64 file length
        u64::try_from(file_size).ok()?;

        Some(Self {
            node_capacity: header.node_capacity,
            bucket_count: header.bucket_count,
            key_size,
            value_size,
            slot_size,
            arena_offset,
            bucket_offset,
            file_size,
        })
    }

    /// Byte range of slot `index`. Callers keep `index <= node_capacity`.
    #[inline]
    pub fn slot_range(&self, index: u64) -> Range<usize> {
        let start = self.arena_offset + index as usize * self.slot_size;
        start..start + self.slot_size
    }

    /// Byte range of the head of bucket `bucket`. Callers keep `bucket < bucket_count`.
    #[inline]
    pub fn bucket_range(&self, bucket: u64) -> Range<usize> {
        let start = self.bucket_offset + bucket as usize * BUCKET_ENTRY_SIZE;
        start..start + BUCKET_ENTRY_SIZE
    }

    /// Range of the key inside a slot's bytes.
    #[inline]
    pub fn key_range(&self) -> Range<usize> {
        LINK_SIZE..LINK_SIZE + self.key_size
    }

    /// Range of the value inside a slot's bytes.
    #[inline]
    pub fn value_range(&self) -> Range<usize> {
        let start = LINK_SIZE + self.key_size;
        start..start + self.value_size
    }
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8], range: Range<usize>) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[range]);
    u64::from_ne_bytes(buf)
}

#[inline]
pub(crate) fn write_u64(bytes: &mut [u8], range: Range<usize>, value: u64) {
    bytes[range].copy_from_slice(&value.to_ne_bytes());
}
