use std::mem::offset_of;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};

/// Size in bytes of the header record at file offset 0.
pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();

const _: () = assert!(HEADER_SIZE == 5 * 8);

/// Bytes of `free_head` inside the mapped header, the only field that
/// changes after creation.
pub const FREE_HEAD_RANGE: Range<usize> =
    offset_of!(Header, free_head)..offset_of!(Header, free_head) + 8;

/// Metadata record stored in the first bytes of every table file.
///
/// A handle keeps a working copy of the layout fields. `free_head` is read
/// from and written to the mapped bytes on every use, because any handle on
/// the same file moves it. All fields are native-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct Header {
    /// Usable slots, addressed 1..=node_capacity.
    pub node_capacity: u64,
    pub bucket_count: u64,
    /// Key width, already rounded up to a multiple of 8.
    pub key_size: u64,
    /// Value width, already rounded up to a multiple of 8.
    pub value_size: u64,
    /// First free slot, 0 when the free list is empty.
    pub free_head: u64,
}

/// Rounds `n` up to the next multiple of 8, `None` on overflow.
pub fn round_up_8(n: u64) -> Option<u64> {
    n.checked_add(7).map(|v| v & !7)
}

impl Header {
    /// Header of a freshly created table: sizes rounded up, every slot free.
    pub fn new(node_capacity: u64, bucket_count: u64, key_size: u64, value_size: u64) -> Result<Self> {
        if node_capacity == 0 {
            return Err(Error::invalid_argument("node capacity must be non-zero"));
        }
        if bucket_count == 0 {
            return Err(Error::invalid_argument("bucket count must be non-zero"));
        }
        if key_size == 0 {
            return Err(Error::invalid_argument("key size must be non-zero"));
        }
        if value_size == 0 {
            return Err(Error::invalid_argument("value size must be non-zero"));
        }
        let key_size = round_up_8(key_size)
            .ok_or_else(|| Error::invalid_argument(format!("key size {key_size} overflows")))?;
        let value_size = round_up_8(value_size)
            .ok_or_else(|| Error::invalid_argument(format!("value size {value_size} overflows")))?;

        Ok(Self {
            node_capacity,
            bucket_count,
            key_size,
            value_size,
            free_head: 1,
        })
    }

    /// Copies the header out of the first [`HEADER_SIZE`] bytes of `region`.
    pub fn read(region: &[u8]) -> Result<Self> {
        let bytes = region.get(..HEADER_SIZE).ok_or_else(|| {
            Error::corrupted(format!(
                "file holds {} bytes, header needs {HEADER_SIZE}",
                region.len()
            ))
        })?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Copies the header into the first [`HEADER_SIZE`] bytes of `region`.
    pub fn write(&self, region: &mut [u8]) {
        region[..HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(self));
    }

    /// True when both headers describe the same layout; `free_head` is ignored.
    pub fn same_shape(&self, other: &Header) -> bool {
        self.node_capacity == other.node_capacity
            && self.bucket_count == other.bucket_count
            && self.key_size == other.key_size
            && self.value_size == other.value_size
    }

    /// Describes the first field that breaks the header invariants, if any.
    pub fn defect(&self) -> Option<String> {
        if self.node_capacity == 0 {
            return Some("node capacity is zero".into());
        }
        if self.bucket_count == 0 {
            return Some("bucket count is zero".into());
        }
        if self.key_size == 0 || self.key_size % 8 != 0 {
            return Some(format!("key size {} is not a positive multiple of 8", self.key_size));
        }
        if self.value_size == 0 || self.value_size % 8 != 0 {
            return Some(format!(
                "value size {} is not a positive multiple of 8",
                self.value_size
            ));
        }
        if self.free_head > self.node_capacity {
            return Some(format!(
                "free head {} is past node capacity {}",
                self.free_head, self.node_capacity
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_rounded_to_words() {
        let header = Header::new(4, 4, 5, 64).unwrap();
        assert_eq!(header.key_size, 8);
        assert_eq!(header.value_size, 64);
        assert_eq!(header.free_head, 1);

        assert_eq!(round_up_8(1), Some(8));
        assert_eq!(round_up_8(8), Some(8));
        assert_eq!(round_up_8(9), Some(16));
        assert_eq!(round_up_8(u64::MAX), None);
    }

    #[test]
    fn zero_parameters_are_rejected() {
        for (n, b, k, v) in [(0, 1, 1, 1), (1, 0, 1, 1), (1, 1, 0, 1), (1, 1, 1, 0)] {
            let err = Header::new(n, b, k, v).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{n} {b} {k} {v}");
        }
    }

    #[test]
    fn oversized_key_is_rejected() {
        let err = Header::new(1, 1, u64::MAX - 2, 8).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn write_then_read_through_region() {
        let header = Header::new(10, 3, 16, 24).unwrap();
        let mut region = vec![0u8; 64];
        header.write(&mut region);

        assert_eq!(Header::read(&region).unwrap(), header);
        assert_eq!(&region[..8], &10u64.to_ne_bytes());
        assert_eq!(&region[32..40], &1u64.to_ne_bytes());
        assert!(region[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn free_head_sits_last() {
        assert_eq!(FREE_HEAD_RANGE, 32..40);
        let a = Header::new(4, 4, 8, 8).unwrap();
        assert!(a.same_shape(&Header { free_head: 3, ..a }));
        assert!(!a.same_shape(&Header { bucket_count: 5, ..a }));
    }

    #[test]
    fn short_region_is_corrupt() {
        let err = Header::read(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));
    }

    #[test]
    fn defects_are_reported() {
        let good = Header::new(4, 4, 64, 64).unwrap();
        assert_eq!(good.defect(), None);

        assert!(Header { bucket_count: 0, ..good }.defect().is_some());
        assert!(Header { key_size: 12, ..good }.defect().is_some());
        assert!(Header { free_head: 5, ..good }.defect().is_some());
        assert_eq!(Header { free_head: 0, ..good }.defect(), None);
    }
}
