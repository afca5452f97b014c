use super::{RawTable, SlotIndex};
use crate::byte_store::ByteStore;
use crate::error::{Error, Result};

fn claim(owners: &mut [bool], index: SlotIndex, list: &str) -> Result<()> {
    let owned = &mut owners[index as usize];
    if *owned {
        return Err(Error::corrupted(format!("slot {index} is linked twice, again by {list}")));
    }
    *owned = true;
    Ok(())
}

impl<S: ByteStore> RawTable<S> {
    /// Verifies that the free list and the bucket chains partition
    /// `1..=node_capacity`: every slot reached exactly once, no cycles, no
    /// out-of-range links, and every chained key hashing to its own bucket.
    pub fn check_partition(&self, mut hash: impl FnMut(&[u8]) -> u64) -> Result<()> {
        let capacity = self.header.node_capacity;
        let mut owners = vec![false; capacity as usize + 1];

        let mut free = 0;
        for link in self.links(self.free_head()) {
            claim(&mut owners, link?, "the free list")?;
            free += 1;
        }

        let mut chained = 0;
        for bucket in 0..self.header.bucket_count {
            for link in self.links(self.bucket_head(bucket)) {
                let index = link?;
                claim(&mut owners, index, &format!("bucket {bucket}"))?;
                let home = self.bucket_for(hash(self.entry(index).key()));
                if home != bucket {
                    return Err(Error::corrupted(format!(
                        "slot {index} is chained in bucket {bucket} but hashes to {home}"
                    )));
                }
                chained += 1;
            }
        }

        if free + chained != capacity {
            return Err(Error::corrupted(format!(
                "{} of {capacity} slots are unreachable",
                capacity - free - chained
            )));
        }
        Ok(())
    }
}
