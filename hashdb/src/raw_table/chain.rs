//! Bucket heads and the singly linked chains hanging off them.
//!
//! New slots always go in at the head, so a chain lists its entries from
//! most to least recently inserted.

use tracing::debug;

use super::{EntryRef, NIL, RawTable, SlotIndex};
use crate::byte_store::ByteStore;
use crate::error::{Error, Result};
use crate::layout::{read_u64, write_u64};

impl<S: ByteStore> RawTable<S> {
    /// Bucket a key with hash `hash` belongs to.
    #[inline]
    pub fn bucket_for(&self, hash: u64) -> u64 {
        hash % self.header.bucket_count
    }

    /// First slot on the chain of `bucket`, or [`NIL`].
    pub fn bucket_head(&self, bucket: u64) -> SlotIndex {
        read_u64(self.store.as_ref(), self.geometry.bucket_range(bucket))
    }

    fn set_bucket_head(&mut self, bucket: u64, index: SlotIndex) {
        let range = self.geometry.bucket_range(bucket);
        write_u64(self.store.as_mut(), range, index);
    }

    /// Walks the chain of `bucket` and returns the first slot whose key
    /// `eq(key, stored_key)` accepts.
    pub fn find(
        &self,
        bucket: u64,
        key: &[u8],
        mut eq: impl FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<Option<SlotIndex>> {
        self.check_bucket(bucket)?;
        for link in self.links(self.bucket_head(bucket)) {
            let index = link?;
            if eq(key, self.entry(index).key()) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Makes `index` the new head of `bucket`'s chain.
    pub fn insert_at_head(&mut self, bucket: u64, index: SlotIndex) -> Result<()> {
        self.check_bucket(bucket)?;
        self.check_index(index)?;
        let head = self.bucket_head(bucket);
        self.set_link(index, head);
        self.set_bucket_head(bucket, index);
        debug!(bucket, slot = index, next = head, "slot linked");
        Ok(())
    }

    /// Splices `index` out of `bucket`'s chain.
    ///
    /// Fails with [`Error::NotFound`] if the chain does not hold `index`.
    pub fn unlink(&mut self, bucket: u64, index: SlotIndex) -> Result<()> {
        self.check_bucket(bucket)?;
        let mut prev = NIL;
        let mut found = false;
        for link in self.links(self.bucket_head(bucket)) {
            let curr = link?;
            if curr == index {
                found = true;
                break;
            }
            prev = curr;
        }
        if !found {
            return Err(Error::NotFound);
        }

        let next = self.link(index);
        if prev == NIL {
            self.set_bucket_head(bucket, next);
        } else {
            self.set_link(prev, next);
        }
        debug!(bucket, slot = index, prev, next, "slot unlinked");
        Ok(())
    }

    /// Entries on `bucket`'s chain, head first.
    ///
    /// Stops early at a malformed link; use
    /// [`check_partition`](RawTable::check_partition) to tell that apart from
    /// the real end of the chain.
    pub fn chain(&self, bucket: u64) -> Chain<'_, S> {
        let start = if bucket < self.header.bucket_count {
            self.bucket_head(bucket)
        } else {
            NIL
        };
        Chain {
            table: self,
            curr: start,
            remaining: self.header.node_capacity,
        }
    }

    /// Length of every chain, indexed by bucket.
    pub fn chain_lengths(&self) -> Result<Vec<u64>> {
        (0..self.header.bucket_count)
            .map(|bucket| {
                let mut len = 0;
                for link in self.links(self.bucket_head(bucket)) {
                    link?;
                    len += 1;
                }
                Ok(len)
            })
            .collect()
    }
}

/// Iterator over the entries of one bucket chain.
pub struct Chain<'a, S: ByteStore> {
    table: &'a RawTable<S>,
    curr: SlotIndex,
    remaining: u64,
}

impl<'a, S: ByteStore> Iterator for Chain<'a, S> {
    type Item = EntryRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.curr == NIL || self.remaining == 0 || self.curr > self.table.header.node_capacity {
            return None;
        }
        self.remaining -= 1;
        let entry = self.table.entry(self.curr);
        self.curr = entry.next();
        Some(entry)
    }
}
