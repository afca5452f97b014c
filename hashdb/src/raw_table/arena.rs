//! Fixed pool of slots and the free list threaded through their `next` links.

use tracing::debug;

use super::{NIL, RawTable, SlotIndex};
use crate::byte_store::ByteStore;
use crate::error::{Error, Result};

impl<S: ByteStore> RawTable<S> {
    /// Pops the head of the free list.
    ///
    /// The popped slot keeps its stale `next` link; the caller splices it
    /// onto a chain, which overwrites it.
    pub fn allocate(&mut self) -> Result<SlotIndex> {
        let index = self.free_head();
        if index == NIL {
            return Err(Error::OutOfSpace);
        }
        self.check_index(index)?;
        let next = self.link(index);
        if next != NIL {
            self.check_index(next)?;
        }

        self.set_free_head(next);
        debug!(slot = index, free_head = next, "slot allocated");
        Ok(index)
    }

    /// Pushes `index` onto the free list.
    ///
    /// `index` must already be off every chain. Membership is not checked:
    /// releasing a slot that is still linked corrupts the table.
    pub fn release(&mut self, index: SlotIndex) -> Result<()> {
        self.check_index(index)?;
        let head = self.free_head();
        self.set_link(index, head);
        self.set_free_head(index);
        debug!(slot = index, next = head, "slot released");
        Ok(())
    }

    /// Length of the free list, found by walking it to the sentinel.
    pub fn free_list_len(&self) -> Result<u64> {
        let mut len = 0;
        for link in self.links(self.free_head()) {
            link?;
            len += 1;
        }
        Ok(len)
    }

    /// Indices on the free list, head first.
    pub fn free_slots(&self) -> Result<Vec<SlotIndex>> {
        self.links(self.free_head()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn table(capacity: u64) -> RawTable<Vec<u8>> {
        RawTable::in_memory(Header::new(capacity, 1, 8, 8).unwrap()).unwrap()
    }

    #[test]
    fn allocate_pops_in_slot_order() {
        let mut t = table(3);
        assert_eq!(t.allocate().unwrap(), 1);
        assert_eq!(t.allocate().unwrap(), 2);
        assert_eq!(t.header().free_head, 3);
        assert_eq!(t.free_list_len().unwrap(), 1);
    }

    #[test]
    fn exhausted_free_list_is_out_of_space() {
        let mut t = table(2);
        t.allocate().unwrap();
        t.allocate().unwrap();
        assert_eq!(t.header().free_head, NIL);
        assert!(matches!(t.allocate(), Err(Error::OutOfSpace)));
        assert_eq!(t.free_list_len().unwrap(), 0);
    }

    #[test]
    fn release_pushes_to_head() {
        let mut t = table(4);
        let a = t.allocate().unwrap();
        let b = t.allocate().unwrap();
        t.release(a).unwrap();
        assert_eq!(t.free_slots().unwrap(), vec![a, 3, 4]);
        t.release(b).unwrap();
        assert_eq!(t.free_slots().unwrap(), vec![b, a, 3, 4]);

        // last released is first reused
        assert_eq!(t.allocate().unwrap(), b);
    }

    #[test]
    fn free_head_is_persisted_on_every_change() {
        let mut t = table(3);
        t.allocate().unwrap();
        assert_eq!(Header::read(t.store()).unwrap().free_head, 2);
        t.release(1).unwrap();
        assert_eq!(Header::read(t.store()).unwrap().free_head, 1);
        t.validate().unwrap();
    }

    #[test]
    fn release_rejects_sentinel_and_out_of_range() {
        let mut t = table(3);
        assert!(matches!(t.release(NIL), Err(Error::Corrupted(_))));
        assert!(matches!(t.release(4), Err(Error::Corrupted(_))));
        assert_eq!(t.free_list_len().unwrap(), 3);
    }
}
